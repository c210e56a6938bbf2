use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, StatusCode, Url};
use tracing::{debug, warn};

use relay_events::{Event, EventHandler, EventResponse, ProcessorError, ProcessorResult};

const APPLICATION_JSON: &str = "application/json";

/// Dispatches events by POSTing their [`EventResponse`] to a tenant URL.
///
/// Success is a 200 or 204 answer; any other status fails with the response
/// body as the transport error message.
#[derive(Debug, Clone)]
pub struct WebhookHandler {
    client: Client,
    url: Url,
}

impl WebhookHandler {
    pub fn new(client: Client, url: Url) -> Self {
        Self { client, url }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl EventHandler for WebhookHandler {
    async fn dispatch(&self, event: &Event) -> ProcessorResult<Event> {
        let body = EventResponse::from(event).to_json().map_err(|e| {
            ProcessorError::transport(format!("failed to encode event {}: {e}", event.key()))
        })?;

        let response = self
            .client
            .post(self.url.clone())
            .header(ACCEPT, APPLICATION_JSON)
            .header(CONTENT_TYPE, APPLICATION_JSON)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                warn!(
                    tenant = %event.tenant(),
                    event_id = %event.id(),
                    url = %self.url,
                    error = %e,
                    "webhook request failed"
                );
                ProcessorError::transport(e.to_string())
            })?;

        let status = response.status();
        if status == StatusCode::OK || status == StatusCode::NO_CONTENT {
            debug!(
                tenant = %event.tenant(),
                event_id = %event.id(),
                status = status.as_u16(),
                "webhook delivered"
            );
            return Ok(event.clone());
        }

        let body = body_or_read_error(response.text().await);
        warn!(
            tenant = %event.tenant(),
            event_id = %event.id(),
            url = %self.url,
            status = status.as_u16(),
            "webhook answered with unexpected status"
        );
        Err(ProcessorError::unexpected_status(status.as_u16(), body))
    }
}

/// The response body, or a description of why it could not be read.
fn body_or_read_error<E: std::fmt::Display>(body: Result<String, E>) -> String {
    match body {
        Ok(body) => body,
        Err(e) => format!("<unreadable body: {e}>"),
    }
}
