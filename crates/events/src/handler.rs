use std::sync::Arc;

use async_trait::async_trait;

use crate::{Event, ProcessorResult};

/// Dispatches a due event to wherever its tenant wants it delivered.
///
/// This is the single capability every handler variant (queue publisher,
/// webhook, in-process custom handler, named component) exposes.
///
/// ## Contract
///
/// - On success, return the resulting event. Transport-style handlers return
///   the input unchanged; custom handlers may return an enriched copy.
/// - On failure, return a [`crate::ProcessorError`]. The caller decides whether
///   to retry; handlers never retry on their own.
///
/// ## Thread Safety
///
/// One instance is shared across every dispatch for a tenant and may be invoked
/// concurrently from several worker threads, hence `Send + Sync` and `&self`.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn dispatch(&self, event: &Event) -> ProcessorResult<Event>;
}

#[async_trait]
impl<H> EventHandler for Arc<H>
where
    H: EventHandler + ?Sized,
{
    async fn dispatch(&self, event: &Event) -> ProcessorResult<Event> {
        (**self).dispatch(event).await
    }
}
