use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use relay_core::{EventId, TenantId};
use relay_events::Event;
use relay_infra::processors::ProcessorRecord;

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

/// Body of `POST /events`. A missing id is generated; a missing time is "now".
#[derive(Debug, Deserialize)]
pub struct DispatchEventRequest {
    pub tenant: String,
    pub id: Option<String>,
    pub event_time: Option<DateTime<Utc>>,
    pub payload: Option<String>,
}

impl DispatchEventRequest {
    pub fn into_event(self) -> Result<Event, axum::response::Response> {
        let tenant = TenantId::parse(&self.tenant)
            .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "invalid_tenant", e.to_string()))?;
        let id = match self.id {
            Some(raw) => EventId::parse(&raw)
                .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "invalid_event_id", e.to_string()))?,
            None => EventId::generate(),
        };

        let event = Event::new(tenant, id, self.event_time.unwrap_or_else(Utc::now));
        Ok(match self.payload {
            Some(payload) => event.with_payload(payload),
            None => event,
        })
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub tenants: usize,
    pub cached_handlers: usize,
}

#[derive(Debug, Serialize)]
pub struct RegisterProcessorResponse {
    pub previous: Option<ProcessorRecord>,
}
