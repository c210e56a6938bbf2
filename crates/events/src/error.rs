//! Failures raised while configuring, building or invoking event handlers.

use thiserror::Error;

use relay_core::{DomainError, TenantId};

/// Result type used by handlers and the dispatch pipeline.
pub type ProcessorResult<T> = Result<T, ProcessorError>;

/// Dispatch pipeline error.
///
/// `Clone` so that a single failed handler construction can be handed to every
/// caller that was waiting on it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProcessorError {
    /// A processor registration was malformed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// No processor is configured for the tenant.
    #[error("no processor config for tenant: {0}")]
    ConfigNotFound(TenantId),

    /// The configured processor kind is not one this pipeline knows how to build.
    #[error("unsupported processor type: {0}")]
    UnsupportedProcessorType(String),

    /// Building the tenant's handler failed.
    #[error("failed to construct processor for tenant {tenant}: {reason}")]
    Construction { tenant: TenantId, reason: String },

    /// Publishing or posting the event failed.
    ///
    /// For webhooks answering with an unexpected status, `message` carries the
    /// response body.
    #[error("transport error{}: {message}", .status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    Transport { status: Option<u16>, message: String },
}

impl ProcessorError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn construction(tenant: &TenantId, reason: impl Into<String>) -> Self {
        Self::Construction {
            tenant: tenant.clone(),
            reason: reason.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            status: None,
            message: message.into(),
        }
    }

    pub fn unexpected_status(status: u16, body: impl Into<String>) -> Self {
        Self::Transport {
            status: Some(status),
            message: body.into(),
        }
    }
}

impl From<DomainError> for ProcessorError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => Self::Validation(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_display_includes_status_when_known() {
        let err = ProcessorError::unexpected_status(500, "boom");
        assert_eq!(err.to_string(), "transport error (status 500): boom");

        let err = ProcessorError::transport("connection refused");
        assert_eq!(err.to_string(), "transport error: connection refused");
    }

    #[test]
    fn domain_errors_become_validation_errors() {
        let err: ProcessorError = TenantId::parse("").unwrap_err().into();
        assert!(matches!(err, ProcessorError::Validation(_)));
    }
}
