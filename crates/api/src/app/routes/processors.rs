use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
};

use relay_core::TenantId;
use relay_infra::processors::ProcessorRecord;

use crate::app::dto::RegisterProcessorResponse;
use crate::app::errors;
use crate::app::services::AppServices;

pub async fn list_processors(Extension(services): Extension<Arc<AppServices>>) -> impl IntoResponse {
    let records: Vec<ProcessorRecord> = services
        .registry
        .store()
        .configs()
        .iter()
        .map(|config| config.to_record())
        .collect();
    Json(records)
}

pub async fn get_processor(
    Extension(services): Extension<Arc<AppServices>>,
    Path(tenant): Path<String>,
) -> axum::response::Response {
    let tenant = match TenantId::parse(&tenant) {
        Ok(t) => t,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_tenant", e.to_string()),
    };

    match services.registry.store().get(&tenant) {
        Ok(config) => Json(config.to_record()).into_response(),
        Err(e) => errors::processor_error_to_response(e),
    }
}

/// Register or replace a tenant's processor; answers with the record it replaced.
pub async fn register_processor(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<ProcessorRecord>,
) -> axum::response::Response {
    match services.registry.register(body) {
        Ok(previous) => Json(RegisterProcessorResponse {
            previous: previous.map(|config| config.to_record()),
        })
        .into_response(),
        Err(e) => errors::processor_error_to_response(e),
    }
}
