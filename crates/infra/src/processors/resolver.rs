//! Per-tenant handler cache with single-flight construction.
//!
//! A tenant's slot is either a finished handler or a construction in
//! progress. Callers arriving while a construction is in progress await the
//! same shared future instead of starting another one, so at most one build
//! runs per tenant at any time. The cache mutex is only held for map
//! operations, never across an `.await`.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tracing::{debug, warn};

use relay_core::TenantId;
use relay_events::{EventHandler, ProcessorError, ProcessorResult};

use super::config::{ProcessorConfig, ProcessorConfigStore};
use super::factory::HandlerFactory;

type BuildFuture = Shared<BoxFuture<'static, ProcessorResult<Arc<dyn EventHandler>>>>;

enum Slot {
    Ready(Arc<dyn EventHandler>),
    Pending { build_id: u64, build: BuildFuture },
}

type Cache = Mutex<HashMap<TenantId, Slot>>;

pub struct HandlerResolver {
    store: Arc<ProcessorConfigStore>,
    factory: Arc<HandlerFactory>,
    cache: Arc<Cache>,
    next_build_id: AtomicU64,
}

impl HandlerResolver {
    pub fn new(store: Arc<ProcessorConfigStore>, factory: Arc<HandlerFactory>) -> Self {
        Self {
            store,
            factory,
            cache: Arc::new(Mutex::new(HashMap::new())),
            next_build_id: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &Arc<ProcessorConfigStore> {
        &self.store
    }

    pub fn factory(&self) -> &Arc<HandlerFactory> {
        &self.factory
    }

    /// Return the tenant's handler, building it on first use.
    ///
    /// Concurrent callers for the same uncached tenant share one construction
    /// and all observe its outcome. Failed constructions are not cached.
    pub async fn resolve(&self, tenant: &TenantId) -> ProcessorResult<Arc<dyn EventHandler>> {
        let build = {
            let mut cache = lock(&self.cache);
            match cache.get(tenant) {
                Some(Slot::Ready(handler)) => return Ok(handler.clone()),
                Some(Slot::Pending { build, .. }) => {
                    debug!(tenant = %tenant, "joining in-flight handler construction");
                    build.clone()
                }
                None => {
                    let config = self.store.get(tenant)?;
                    let build_id = self.next_build_id.fetch_add(1, Ordering::Relaxed);
                    let build = self.start_build(tenant.clone(), build_id, config);
                    cache.insert(
                        tenant.clone(),
                        Slot::Pending {
                            build_id,
                            build: build.clone(),
                        },
                    );
                    build
                }
            }
        };

        build.await
    }

    fn start_build(
        &self,
        tenant: TenantId,
        build_id: u64,
        config: Arc<ProcessorConfig>,
    ) -> BuildFuture {
        let factory = self.factory.clone();
        let cache = self.cache.clone();

        async move {
            // A panic fails the build like any other error and leaves the slot empty.
            let result = match AssertUnwindSafe(factory.build(&config)).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => {
                    let reason = panic_message(panic.as_ref());
                    warn!(tenant = %tenant, panic = %reason, "handler construction panicked");
                    Err(ProcessorError::construction(
                        &tenant,
                        format!("handler construction panicked: {reason}"),
                    ))
                }
            };

            let mut cache = lock(&cache);
            let still_current = matches!(
                cache.get(&tenant),
                Some(Slot::Pending { build_id: current, .. }) if *current == build_id
            );
            if still_current {
                match &result {
                    Ok(handler) => {
                        cache.insert(tenant, Slot::Ready(handler.clone()));
                    }
                    Err(_) => {
                        cache.remove(&tenant);
                    }
                }
            } else {
                debug!(tenant = %tenant, "handler built for a superseded config; not caching");
            }

            result
        }
        .boxed()
        .shared()
    }

    /// Drop the tenant's cached handler; the next resolve rebuilds it.
    ///
    /// A construction still in flight completes for its waiters but is not
    /// cached.
    pub fn invalidate(&self, tenant: &TenantId) -> bool {
        let removed = lock(&self.cache).remove(tenant).is_some();
        if removed {
            debug!(tenant = %tenant, "handler cache invalidated");
        }
        removed
    }

    /// Number of tenants with a ready handler.
    pub fn cached_len(&self) -> usize {
        lock(&self.cache)
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    pub fn is_cached(&self, tenant: &TenantId) -> bool {
        matches!(lock(&self.cache).get(tenant), Some(Slot::Ready(_)))
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

fn lock(cache: &Cache) -> MutexGuard<'_, HashMap<TenantId, Slot>> {
    cache.lock().unwrap_or_else(PoisonError::into_inner)
}
