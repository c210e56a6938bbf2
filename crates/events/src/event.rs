use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use relay_core::{EventId, TenantId};

/// A due event, ready to be routed to its tenant's handler.
///
/// Notes:
/// - Identity is the pair (`tenant`, `id`), see [`EventKey`].
/// - `payload` is opaque to the dispatch core.
/// - `processed_at` is stamped by the dispatch facade when an attempt sequence
///   starts; nothing else in the pipeline mutates the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    tenant: TenantId,
    id: EventId,

    /// When the event was scheduled to fire.
    event_time: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    processed_at: Option<DateTime<Utc>>,
}

impl Event {
    pub fn new(tenant: TenantId, id: EventId, event_time: DateTime<Utc>) -> Self {
        Self {
            tenant,
            id,
            event_time,
            payload: None,
            processed_at: None,
        }
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    pub fn id(&self) -> &EventId {
        &self.id
    }

    pub fn key(&self) -> EventKey {
        EventKey {
            tenant: self.tenant.clone(),
            id: self.id.clone(),
        }
    }

    pub fn event_time(&self) -> DateTime<Utc> {
        self.event_time
    }

    pub fn payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }

    pub fn processed_at(&self) -> Option<DateTime<Utc>> {
        self.processed_at
    }

    /// Record the start of a dispatch attempt sequence.
    pub fn mark_processed(&mut self, at: DateTime<Utc>) {
        self.processed_at = Some(at);
    }
}

/// Identity of an event: its tenant plus its id.
///
/// Displays as `tenant/id`, which is also the message key used by queue
/// publishers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventKey {
    pub tenant: TenantId,
    pub id: EventId,
}

impl core::fmt::Display for EventKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.tenant, self.id)
    }
}
