//! Dispatch entry point: stamps events, drives resolve+dispatch through the
//! retry executor, and turns terminal failures into logged outcomes.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::future::join_all;
use tracing::{debug, error, info, warn};

use relay_core::TenantId;
use relay_events::{Event, EventHandler, ProcessorError, ProcessorResult};

use super::config::{ProcessorConfig, ProcessorConfigStore, ProcessorRecord};
use super::factory::HandlerFactory;
use super::resolver::HandlerResolver;
use crate::retry::{RetryError, RetryPolicy, spawn_with_backoff};

const RETRY_LABEL: &str = "event-processor";

/// How a dispatch ended.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// A handler accepted the event; carries the handler's result.
    Delivered(Event),
    /// Every attempt failed. The stamped input event is handed back unchanged.
    Swallowed {
        event: Event,
        error: RetryError<ProcessorError>,
    },
}

impl DispatchOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DispatchOutcome::Delivered(_))
    }

    pub fn event(&self) -> &Event {
        match self {
            DispatchOutcome::Delivered(event) | DispatchOutcome::Swallowed { event, .. } => event,
        }
    }

    pub fn error(&self) -> Option<&RetryError<ProcessorError>> {
        match self {
            DispatchOutcome::Delivered(_) => None,
            DispatchOutcome::Swallowed { error, .. } => Some(error),
        }
    }

    pub fn into_event(self) -> Event {
        match self {
            DispatchOutcome::Delivered(event) | DispatchOutcome::Swallowed { event, .. } => event,
        }
    }
}

/// Routes events to their tenant's handler.
///
/// ## Failure contract
///
/// [`ProcessorRegistry::process`] never fails: when every attempt for an event
/// has failed, the failure is logged once at `error` (with `tenant` and
/// `event_id`) and the stamped input event is returned. Callers that need to
/// tell the two apart use [`ProcessorRegistry::dispatch`].
#[derive(Clone)]
pub struct ProcessorRegistry {
    resolver: Arc<HandlerResolver>,
    policy: RetryPolicy,
}

impl ProcessorRegistry {
    pub fn new(store: Arc<ProcessorConfigStore>, factory: Arc<HandlerFactory>, policy: RetryPolicy) -> Self {
        Self {
            resolver: Arc::new(HandlerResolver::new(store, factory)),
            policy,
        }
    }

    pub fn store(&self) -> &Arc<ProcessorConfigStore> {
        self.resolver.store()
    }

    pub fn resolver(&self) -> &HandlerResolver {
        &self.resolver
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Validate and install a tenant's processor, replacing its previous one.
    ///
    /// A malformed record fails with a validation error and changes nothing.
    pub fn register(&self, record: ProcessorRecord) -> ProcessorResult<Option<Arc<ProcessorConfig>>> {
        let config = ProcessorConfig::try_from(record)?;
        Ok(self.register_config(config))
    }

    /// Install an already validated config and drop the tenant's cached handler.
    pub fn register_config(&self, config: ProcessorConfig) -> Option<Arc<ProcessorConfig>> {
        let tenant = config.tenant().clone();
        let kind = config.kind();

        let previous = self.store().register(config);
        self.resolver.invalidate(&tenant);

        info!(
            tenant = %tenant,
            kind = %kind,
            replaced = previous.is_some(),
            "processor registered"
        );
        previous
    }

    pub async fn resolve(&self, tenant: &TenantId) -> ProcessorResult<Arc<dyn EventHandler>> {
        self.resolver.resolve(tenant).await
    }

    /// Build every configured tenant's handler now.
    ///
    /// Returns the tenants whose construction failed; they are retried lazily
    /// on first dispatch.
    pub async fn warm_up(&self) -> Vec<(TenantId, ProcessorError)> {
        let tenants = self.store().tenants();
        let total = tenants.len();

        let results = join_all(tenants.into_iter().map(|tenant| async move {
            let result = self.resolver.resolve(&tenant).await;
            (tenant, result)
        }))
        .await;

        let failures: Vec<(TenantId, ProcessorError)> = results
            .into_iter()
            .filter_map(|(tenant, result)| result.err().map(|err| (tenant, err)))
            .collect();

        for (tenant, err) in &failures {
            warn!(tenant = %tenant, error = %err, "eager handler construction failed");
        }
        info!(
            tenants = total,
            failed = failures.len(),
            "processor warm-up complete"
        );
        failures
    }

    /// Stamp `event` and deliver it, retrying with backoff.
    pub async fn dispatch(&self, mut event: Event) -> DispatchOutcome {
        event.mark_processed(Utc::now());

        let resolver = self.resolver.clone();
        let attempt_event = event.clone();
        let handle = spawn_with_backoff(RETRY_LABEL, self.policy.clone(), move |attempt| {
            let resolver = resolver.clone();
            let event = attempt_event.clone();
            async move {
                debug!(
                    tenant = %event.tenant(),
                    event_id = %event.id(),
                    attempt,
                    "dispatching event"
                );
                let handler = resolver.resolve(event.tenant()).await?;
                handler.dispatch(&event).await
            }
        });

        match handle.await {
            Ok(delivered) => DispatchOutcome::Delivered(delivered),
            Err(err) => {
                error!(
                    tenant = %event.tenant(),
                    event_id = %event.id(),
                    attempts = err.attempts(),
                    error = %err,
                    "event dispatch failed, continuing without it"
                );
                DispatchOutcome::Swallowed { event, error: err }
            }
        }
    }

    /// [`ProcessorRegistry::dispatch`], discarding the outcome.
    pub async fn process(&self, event: Event) -> Event {
        self.dispatch(event).await.into_event()
    }
}

#[async_trait]
impl EventHandler for ProcessorRegistry {
    async fn dispatch(&self, event: &Event) -> ProcessorResult<Event> {
        Ok(self.process(event.clone()).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::processors::config::{PARAM_BEAN_NAME, PARAM_TYPE_NAME, ProcessorKind};
    use crate::processors::custom::{HandlerClasses, InMemoryComponentRegistry};
    use relay_core::EventId;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Enrich;

    #[async_trait]
    impl EventHandler for Enrich {
        async fn dispatch(&self, event: &Event) -> ProcessorResult<Event> {
            Ok(event.clone().with_payload("enriched"))
        }
    }

    fn fast() -> RetryPolicy {
        RetryPolicy::new(2, Duration::from_millis(1), 2.0)
    }

    fn event(tenant: &str) -> Event {
        Event::new(
            TenantId::parse(tenant).unwrap(),
            EventId::parse("e1").unwrap(),
            Utc::now(),
        )
    }

    fn registry(records: Vec<ProcessorRecord>) -> ProcessorRegistry {
        let classes = HandlerClasses::new();
        classes.register_default::<Enrich>("acme.Enrich");
        let factory = HandlerFactory::default().with_classes(classes);
        ProcessorRegistry::new(
            Arc::new(ProcessorConfigStore::load(records).unwrap()),
            Arc::new(factory),
            fast(),
        )
    }

    fn class(tenant: &str, type_name: &str) -> ProcessorRecord {
        ProcessorRecord::new(tenant, ProcessorKind::CustomClass).with_parameter(PARAM_TYPE_NAME, type_name)
    }

    #[tokio::test]
    async fn delivered_events_carry_the_handler_result_and_a_stamp() {
        let registry = registry(vec![class("t", "acme.Enrich")]);
        let input = event("t");

        let outcome = registry.dispatch(input.clone()).await;
        assert!(outcome.is_delivered());
        let out = outcome.into_event();
        assert_eq!(out.payload(), Some("enriched"));
        assert!(out.processed_at().is_some());
        assert_eq!(out.id(), input.id());
    }

    #[tokio::test]
    async fn unknown_tenants_are_swallowed() {
        let registry = registry(vec![]);
        let input = event("nobody");

        let outcome = registry.dispatch(input.clone()).await;
        assert!(!outcome.is_delivered());
        let err = outcome.error().unwrap();
        assert_eq!(err.attempts(), 3);

        let out = outcome.into_event();
        assert_eq!(out.tenant(), input.tenant());
        assert_eq!(out.payload(), None);
        assert!(out.processed_at().is_some());
    }

    #[tokio::test]
    async fn register_validates_before_touching_the_store() {
        let registry = registry(vec![class("t", "acme.Enrich")]);
        let before = registry.store().configs();

        let bad = ProcessorRecord {
            tenant: "t".into(),
            kind: None,
            parameters: Default::default(),
        };
        assert!(matches!(registry.register(bad), Err(ProcessorError::Validation(_))));
        assert_eq!(registry.store().configs(), before);
    }

    #[tokio::test]
    async fn register_swaps_the_cached_handler() {
        let components = Arc::new(InMemoryComponentRegistry::new());
        let replacement: Arc<dyn EventHandler> = Arc::new(Enrich);
        components.insert_handler("replacement", replacement.clone());

        let classes = HandlerClasses::new();
        classes.register_default::<Enrich>("acme.Enrich");
        let factory = HandlerFactory::default()
            .with_classes(classes)
            .with_components(components);
        let registry = ProcessorRegistry::new(
            Arc::new(ProcessorConfigStore::load(vec![class("t", "acme.Enrich")]).unwrap()),
            Arc::new(factory),
            fast(),
        );

        let tenant = TenantId::parse("t").unwrap();
        let first = registry.resolve(&tenant).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &replacement));

        let previous = registry
            .register(
                ProcessorRecord::new("t", ProcessorKind::CustomBean)
                    .with_parameter(PARAM_BEAN_NAME, "replacement"),
            )
            .unwrap();
        assert_eq!(previous.unwrap().kind(), ProcessorKind::CustomClass);
        assert!(!registry.resolver().is_cached(&tenant));

        let second = registry.resolve(&tenant).await.unwrap();
        assert!(Arc::ptr_eq(&second, &replacement));
    }

    #[tokio::test]
    async fn warm_up_reports_failed_tenants() {
        let registry = registry(vec![class("good", "acme.Enrich"), class("bad", "acme.Missing")]);

        let failures = registry.warm_up().await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, TenantId::parse("bad").unwrap());
        assert!(registry.resolver().is_cached(&TenantId::parse("good").unwrap()));
    }

    #[tokio::test]
    async fn registry_nests_as_a_handler() {
        let registry = registry(vec![class("t", "acme.Enrich")]);
        let nested: Arc<dyn EventHandler> = Arc::new(registry);

        let out = nested.dispatch(&event("t")).await.unwrap();
        assert_eq!(out.payload(), Some("enriched"));
    }

    #[tokio::test]
    async fn constructor_panic_is_retried_by_the_next_attempt() {
        let calls = Arc::new(AtomicUsize::new(0));
        let classes = HandlerClasses::new();
        let counter = calls.clone();
        classes.register("acme.Flaky", move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("first construction panics");
            }
            Ok(Arc::new(Enrich) as Arc<dyn EventHandler>)
        });
        let registry = ProcessorRegistry::new(
            Arc::new(ProcessorConfigStore::load(vec![class("t", "acme.Flaky")]).unwrap()),
            Arc::new(HandlerFactory::default().with_classes(classes)),
            fast(),
        );

        let outcome = registry.dispatch(event("t")).await;
        assert!(outcome.is_delivered());
        assert_eq!(outcome.event().payload(), Some("enriched"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
