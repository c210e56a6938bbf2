use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use relay_events::{ProcessorError, ProcessorResult};

use super::{MessagePublisher, PublishAck, PublisherFactory};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub key: String,
    pub payload: String,
}

/// In-process publisher that records every message.
///
/// A test double: recorded messages are never drained, so it is not wired
/// into the server.
#[derive(Debug)]
pub struct InMemoryPublisher {
    topic: String,
    messages: Mutex<Vec<PublishedMessage>>,
    next_id: AtomicU64,
    failures_left: AtomicU32,
}

impl InMemoryPublisher {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            messages: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
            failures_left: AtomicU32::new(0),
        }
    }

    /// Make the next `n` publishes fail with a transport error.
    pub fn fail_next(&self, n: u32) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    pub fn messages(&self) -> Vec<PublishedMessage> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl MessagePublisher for InMemoryPublisher {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn publish(&self, key: &str, payload: &str) -> ProcessorResult<PublishAck> {
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ProcessorError::transport(format!(
                "broker unavailable for topic {}",
                self.topic
            )));
        }

        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(PublishedMessage {
                topic: self.topic.clone(),
                key: key.to_string(),
                payload: payload.to_string(),
            });

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(PublishAck {
            topic: self.topic.clone(),
            message_id: id.to_string(),
        })
    }
}

/// Hands out [`InMemoryPublisher`]s and keeps them reachable for inspection.
#[derive(Debug, Default)]
pub struct InMemoryPublisherFactory {
    created: Mutex<Vec<(PathBuf, Arc<InMemoryPublisher>)>>,
}

impl InMemoryPublisherFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishers created so far, in creation order.
    pub fn publishers(&self) -> Vec<Arc<InMemoryPublisher>> {
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub fn created_count(&self) -> usize {
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl PublisherFactory for InMemoryPublisherFactory {
    async fn create(
        &self,
        topic: &str,
        config_path: &Path,
    ) -> ProcessorResult<Arc<dyn MessagePublisher>> {
        let publisher = Arc::new(InMemoryPublisher::new(topic));
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((config_path.to_path_buf(), publisher.clone()));
        Ok(publisher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acks_carry_increasing_ids() {
        let publisher = InMemoryPublisher::new("t");
        let a = publisher.publish("k", "1").await.unwrap();
        let b = publisher.publish("k", "2").await.unwrap();
        assert_eq!(a.message_id, "0");
        assert_eq!(b.message_id, "1");
        assert_eq!(publisher.messages().len(), 2);
    }

    #[tokio::test]
    async fn factory_tracks_created_publishers() {
        let factory = InMemoryPublisherFactory::new();
        let publisher = factory
            .create("orders", Path::new("/etc/q.json"))
            .await
            .unwrap();
        assert_eq!(publisher.topic(), "orders");
        assert_eq!(factory.created_count(), 1);
        assert_eq!(factory.publishers()[0].topic(), "orders");
    }
}
