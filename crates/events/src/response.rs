//! Wire projection of an [`Event`] (queue payload / webhook body).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use relay_core::{EventId, TenantId};

use crate::Event;

/// Status reported to downstream consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    Triggered,
}

/// Serializable projection of an event sent across the external boundary.
///
/// Derived on demand; never persisted by the dispatch core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    pub id: EventId,
    pub tenant: TenantId,
    pub event_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    pub event_status: EventStatus,
}

impl EventResponse {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<&Event> for EventResponse {
    fn from(event: &Event) -> Self {
        Self {
            id: event.id().clone(),
            tenant: event.tenant().clone(),
            event_time: event.event_time(),
            payload: event.payload().map(str::to_string),
            processed_at: event.processed_at(),
            event_status: EventStatus::Triggered,
        }
    }
}
