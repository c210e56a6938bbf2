use std::sync::Arc;

use relay_infra::config::{ConfigError, DispatchSettings};
use relay_infra::processors::{
    HandlerClasses, HandlerFactory, InMemoryComponentRegistry, ProcessorConfigStore,
    ProcessorRegistry, PublisherFactory,
};

#[cfg(not(feature = "redis"))]
use relay_infra::processors::queue::UnavailablePublisherFactory;
#[cfg(feature = "redis")]
use relay_infra::processors::queue::RedisStreamsPublisherFactory;

/// With the `redis` feature, selects the Redis Streams queue transport.
pub const ENV_REDIS_URL: &str = "RELAY_REDIS_URL";

/// Everything the HTTP handlers need.
#[derive(Clone)]
pub struct AppServices {
    pub registry: ProcessorRegistry,
    /// Named components resolvable by CUSTOM_BEAN processors.
    pub components: Arc<InMemoryComponentRegistry>,
    /// Handler types instantiable by CUSTOM_CLASS processors.
    pub classes: HandlerClasses,
}

impl AppServices {
    pub fn new(
        registry: ProcessorRegistry,
        components: Arc<InMemoryComponentRegistry>,
        classes: HandlerClasses,
    ) -> Self {
        Self {
            registry,
            components,
            classes,
        }
    }
}

/// Wire the dispatch pipeline from settings.
///
/// Loads processor records from `settings.processor_config` when set, and
/// warms up every handler when `settings.eager` is on.
pub async fn build_services(
    settings: &DispatchSettings,
    redis_url: Option<String>,
) -> Result<AppServices, ConfigError> {
    let store = match &settings.processor_config {
        Some(path) => ProcessorConfigStore::from_json_file(path)?,
        None => {
            tracing::warn!("no processor config file set; starting with an empty processor store");
            ProcessorConfigStore::new()
        }
    };

    let components = Arc::new(InMemoryComponentRegistry::new());
    let classes = HandlerClasses::new();
    let factory = HandlerFactory::default()
        .with_publishers(publisher_factory(redis_url))
        .with_classes(classes.clone())
        .with_components(components.clone());

    let registry = ProcessorRegistry::new(Arc::new(store), Arc::new(factory), settings.retry.clone());

    if settings.eager {
        let failed = registry.warm_up().await;
        if !failed.is_empty() {
            tracing::warn!(failed = failed.len(), "some processors failed eager construction");
        }
    }

    Ok(AppServices::new(registry, components, classes))
}

#[cfg(feature = "redis")]
fn publisher_factory(redis_url: Option<String>) -> Arc<dyn PublisherFactory> {
    match redis_url {
        Some(url) => {
            tracing::info!("queue processors publish to redis streams");
            Arc::new(RedisStreamsPublisherFactory::with_url(url))
        }
        None => Arc::new(RedisStreamsPublisherFactory::new()),
    }
}

#[cfg(not(feature = "redis"))]
fn publisher_factory(redis_url: Option<String>) -> Arc<dyn PublisherFactory> {
    if redis_url.is_some() {
        tracing::warn!("RELAY_REDIS_URL set but redis feature not enabled; queue processors will fail");
    }
    Arc::new(UnavailablePublisherFactory)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builds_an_empty_pipeline_by_default() {
        let services = build_services(&DispatchSettings::default(), None).await.unwrap();
        assert!(services.registry.store().is_empty());
        assert_eq!(services.registry.policy().max_retries, 3);
    }

    #[cfg(not(feature = "redis"))]
    #[tokio::test]
    async fn queue_tenants_fail_construction_without_a_transport() {
        use relay_core::TenantId;
        use relay_events::ProcessorError;
        use relay_infra::processors::{ProcessorKind, ProcessorRecord};

        let services = build_services(&DispatchSettings::default(), Some("redis://127.0.0.1:6379".into()))
            .await
            .unwrap();
        services
            .registry
            .register(
                ProcessorRecord::new("T1", ProcessorKind::Queue)
                    .with_parameter("topic", "due-events")
                    .with_parameter("config_path", "/etc/relay/queue.json"),
            )
            .unwrap();

        let tenant = TenantId::parse("T1").unwrap();
        match services.registry.resolve(&tenant).await {
            Ok(_) => panic!("expected construction failure"),
            Err(ProcessorError::Construction { reason, .. }) => {
                assert!(reason.contains(UnavailablePublisherFactory::REASON), "{reason}");
            }
            Err(other) => panic!("expected Construction, got {other:?}"),
        }
        assert!(!services.registry.resolver().is_cached(&tenant));
    }

    #[tokio::test]
    async fn missing_config_file_fails_startup() {
        let settings = DispatchSettings {
            processor_config: Some("/definitely/not/here.json".into()),
            ..DispatchSettings::default()
        };
        assert!(matches!(
            build_services(&settings, None).await,
            Err(ConfigError::Io { .. })
        ));
    }
}
