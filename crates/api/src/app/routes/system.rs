use std::sync::Arc;

use axum::{Json, extract::Extension};

use crate::app::dto::HealthResponse;
use crate::app::services::AppServices;

pub async fn health(Extension(services): Extension<Arc<AppServices>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        tenants: services.registry.store().len(),
        cached_handlers: services.registry.resolver().cached_len(),
    })
}
