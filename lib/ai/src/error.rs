//! Error types for the provider crate.

/// Errors from provider backend operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The request never got a response.
    #[error("provider request failed: {reason}")]
    RequestFailed { reason: String },
    /// The provider answered with a non-success status.
    #[error("provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    /// Response parsing failed.
    #[error("failed to parse provider response: {reason}")]
    ResponseParseFailed { reason: String },
    /// Invalid configuration.
    #[error("invalid provider configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl BackendError {
    /// Returns true for failures of the transport itself rather than the
    /// provider's answer.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::RequestFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_display() {
        let err = BackendError::Http {
            status: 429,
            body: "rate limited".to_string(),
        };
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("rate limited"));
    }

    #[test]
    fn request_failed_is_transport() {
        let err = BackendError::RequestFailed {
            reason: "connection refused".to_string(),
        };
        assert!(err.is_transport());
        assert!(
            !BackendError::ResponseParseFailed {
                reason: "eof".to_string()
            }
            .is_transport()
        );
    }
}
