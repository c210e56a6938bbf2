use std::sync::Arc;

use axum::{
    Json,
    extract::Extension,
    response::IntoResponse,
};

use relay_events::EventResponse;

use crate::app::dto;
use crate::app::services::AppServices;

/// Dispatch one event and answer with the event the pipeline returned.
///
/// Tenant-side failures are logged by the registry and never turn into an
/// error response.
pub async fn dispatch_event(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::DispatchEventRequest>,
) -> axum::response::Response {
    let event = match body.into_event() {
        Ok(event) => event,
        Err(response) => return response,
    };

    let processed = services.registry.process(event).await;
    Json(EventResponse::from(&processed)).into_response()
}
