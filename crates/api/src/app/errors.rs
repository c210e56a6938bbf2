use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use relay_events::ProcessorError;

pub fn processor_error_to_response(err: ProcessorError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        ProcessorError::Validation(_) => json_error(StatusCode::BAD_REQUEST, "validation_error", message),
        ProcessorError::UnsupportedProcessorType(_) => {
            json_error(StatusCode::BAD_REQUEST, "unsupported_processor_type", message)
        }
        ProcessorError::ConfigNotFound(_) => json_error(StatusCode::NOT_FOUND, "config_not_found", message),
        ProcessorError::Construction { .. } => json_error(StatusCode::BAD_GATEWAY, "construction_error", message),
        ProcessorError::Transport { .. } => json_error(StatusCode::BAD_GATEWAY, "transport_error", message),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::TenantId;

    #[test]
    fn maps_error_kinds_to_statuses() {
        let cases = [
            (ProcessorError::validation("bad"), StatusCode::BAD_REQUEST),
            (
                ProcessorError::UnsupportedProcessorType("SMOKE_SIGNAL".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                ProcessorError::ConfigNotFound(TenantId::parse("t").unwrap()),
                StatusCode::NOT_FOUND,
            ),
            (ProcessorError::transport("down"), StatusCode::BAD_GATEWAY),
        ];
        for (err, status) in cases {
            assert_eq!(processor_error_to_response(err).status(), status);
        }
    }
}
