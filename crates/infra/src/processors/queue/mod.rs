//! Queue-publish handler and the publisher abstraction behind it.

pub mod in_memory;
#[cfg(feature = "redis")]
pub mod redis_streams;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use relay_events::{Event, EventHandler, EventResponse, ProcessorError, ProcessorResult};

pub use in_memory::{InMemoryPublisher, InMemoryPublisherFactory, PublishedMessage};
#[cfg(feature = "redis")]
pub use redis_streams::{RedisStreamsPublisher, RedisStreamsPublisherFactory};

/// Broker acknowledgement for one published message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishAck {
    pub topic: String,
    /// Broker-assigned message id (offset, stream entry id, ...).
    pub message_id: String,
}

/// A connection bound to one topic.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    fn topic(&self) -> &str;

    /// Publish `payload` under `key`, resolving once the broker acknowledges it.
    async fn publish(&self, key: &str, payload: &str) -> ProcessorResult<PublishAck>;
}

/// Builds publishers from a topic plus a connection-settings file.
#[async_trait]
pub trait PublisherFactory: Send + Sync {
    async fn create(&self, topic: &str, config_path: &Path)
    -> ProcessorResult<Arc<dyn MessagePublisher>>;
}

/// Publisher factory for builds without a queue transport.
///
/// Every `create` fails, so QUEUE tenants fail construction instead of
/// silently acknowledging messages that never leave the process.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailablePublisherFactory;

impl UnavailablePublisherFactory {
    pub const REASON: &'static str = "no queue transport compiled in";
}

#[async_trait]
impl PublisherFactory for UnavailablePublisherFactory {
    async fn create(
        &self,
        topic: &str,
        _config_path: &Path,
    ) -> ProcessorResult<Arc<dyn MessagePublisher>> {
        warn!(topic = %topic, "queue processor configured but no queue transport is available");
        Err(ProcessorError::transport(Self::REASON))
    }
}

/// Dispatches events by publishing their [`EventResponse`] keyed by `tenant/id`.
pub struct QueueHandler {
    publisher: Arc<dyn MessagePublisher>,
}

impl QueueHandler {
    pub fn new(publisher: Arc<dyn MessagePublisher>) -> Self {
        Self { publisher }
    }

    pub fn topic(&self) -> &str {
        self.publisher.topic()
    }
}

#[async_trait]
impl EventHandler for QueueHandler {
    async fn dispatch(&self, event: &Event) -> ProcessorResult<Event> {
        let key = event.key().to_string();
        let payload = EventResponse::from(event)
            .to_json()
            .map_err(|e| ProcessorError::transport(format!("failed to encode event {key}: {e}")))?;

        match self.publisher.publish(&key, &payload).await {
            Ok(ack) => {
                debug!(
                    tenant = %event.tenant(),
                    event_id = %event.id(),
                    topic = %ack.topic,
                    message_id = %ack.message_id,
                    "event published"
                );
                Ok(event.clone())
            }
            Err(err) => {
                warn!(
                    tenant = %event.tenant(),
                    event_id = %event.id(),
                    topic = %self.publisher.topic(),
                    error = %err,
                    "publish failed"
                );
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use relay_core::{EventId, TenantId};

    #[tokio::test]
    async fn publishes_response_keyed_by_tenant_and_id() {
        let publisher = Arc::new(InMemoryPublisher::new("due-events"));
        let handler = QueueHandler::new(publisher.clone());

        let event = Event::new(
            TenantId::parse("t1").unwrap(),
            EventId::parse("e1").unwrap(),
            Utc::now(),
        )
        .with_payload("body");

        let out = handler.dispatch(&event).await.unwrap();
        assert_eq!(out, event);

        let sent = publisher.messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].key, "t1/e1");
        let json: serde_json::Value = serde_json::from_str(&sent[0].payload).unwrap();
        assert_eq!(json["eventStatus"], "TRIGGERED");
        assert_eq!(json["payload"], "body");
    }

    #[tokio::test]
    async fn broker_failures_surface_as_transport_errors() {
        let publisher = Arc::new(InMemoryPublisher::new("due-events"));
        publisher.fail_next(1);
        let handler = QueueHandler::new(publisher.clone());

        let event = Event::new(
            TenantId::parse("t1").unwrap(),
            EventId::parse("e1").unwrap(),
            Utc::now(),
        );

        let err = handler.dispatch(&event).await.unwrap_err();
        assert!(matches!(err, ProcessorError::Transport { .. }));
        assert!(handler.dispatch(&event).await.is_ok());
    }

    #[tokio::test]
    async fn unavailable_transport_refuses_every_topic() {
        let factory = UnavailablePublisherFactory;
        let err = match factory.create("due-events", Path::new("/etc/q.json")).await {
            Ok(_) => panic!("expected publisher creation to fail"),
            Err(err) => err,
        };
        assert_eq!(err, ProcessorError::transport(UnavailablePublisherFactory::REASON));
    }
}
