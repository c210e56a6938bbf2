//! Redis Streams queue transport.
//!
//! Each publish is one `XADD <topic> [MAXLEN ~ n] * key <key> payload <json>`;
//! the broker acknowledgement is the stream entry id Redis assigns.
//!
//! The connection file referenced by a QUEUE processor's `config_path` is JSON:
//!
//! ```json
//! { "url": "redis://localhost:6379", "max_len": 100000 }
//! ```

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use serde::Deserialize;
use tracing::{info, instrument};

use relay_events::{ProcessorError, ProcessorResult};

use super::{MessagePublisher, PublishAck, PublisherFactory};

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConnectionConfig {
    pub url: String,
    /// Approximate stream cap passed as `MAXLEN ~`.
    #[serde(default)]
    pub max_len: Option<u64>,
}

#[derive(Clone)]
pub struct RedisStreamsPublisher {
    conn: MultiplexedConnection,
    topic: String,
    max_len: Option<u64>,
}

impl RedisStreamsPublisher {
    pub async fn connect(config: &RedisConnectionConfig, topic: impl Into<String>) -> ProcessorResult<Self> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| ProcessorError::transport(format!("invalid redis url: {e}")))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| ProcessorError::transport(format!("redis connection failed: {e}")))?;

        Ok(Self {
            conn,
            topic: topic.into(),
            max_len: config.max_len,
        })
    }
}

#[async_trait]
impl MessagePublisher for RedisStreamsPublisher {
    fn topic(&self) -> &str {
        &self.topic
    }

    #[instrument(skip(self, payload), fields(stream_key = %self.topic), err)]
    async fn publish(&self, key: &str, payload: &str) -> ProcessorResult<PublishAck> {
        let mut cmd = redis::cmd("XADD");
        cmd.arg(&self.topic);
        if let Some(max_len) = self.max_len {
            cmd.arg("MAXLEN").arg("~").arg(max_len);
        }
        cmd.arg("*").arg("key").arg(key).arg("payload").arg(payload);

        let mut conn = self.conn.clone();
        let entry_id: String = cmd
            .query_async(&mut conn)
            .await
            .map_err(|e| ProcessorError::transport(format!("XADD failed: {e}")))?;

        Ok(PublishAck {
            topic: self.topic.clone(),
            message_id: entry_id,
        })
    }
}

/// Opens one multiplexed connection per QUEUE handler built.
#[derive(Debug, Default)]
pub struct RedisStreamsPublisherFactory {
    /// Used instead of the file's `url` when set.
    url_override: Option<String>,
}

impl RedisStreamsPublisherFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url_override: Some(url.into()),
        }
    }

    async fn read_config(&self, config_path: &Path) -> ProcessorResult<RedisConnectionConfig> {
        let raw = tokio::fs::read_to_string(config_path).await.map_err(|e| {
            ProcessorError::transport(format!(
                "cannot read queue connection config {}: {e}",
                config_path.display()
            ))
        })?;
        let mut config: RedisConnectionConfig = serde_json::from_str(&raw).map_err(|e| {
            ProcessorError::transport(format!(
                "malformed queue connection config {}: {e}",
                config_path.display()
            ))
        })?;
        if let Some(url) = &self.url_override {
            config.url = url.clone();
        }
        Ok(config)
    }
}

#[async_trait]
impl PublisherFactory for RedisStreamsPublisherFactory {
    async fn create(
        &self,
        topic: &str,
        config_path: &Path,
    ) -> ProcessorResult<Arc<dyn MessagePublisher>> {
        let config = self.read_config(config_path).await?;
        let publisher = RedisStreamsPublisher::connect(&config, topic).await?;
        info!(topic, "redis streams publisher connected");
        Ok(Arc::new(publisher))
    }
}
