//! Error types for Blockflow.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message used when the backend gives no structured reason.
pub const GENERIC_ERROR_MESSAGE: &str = "An error occurred";

/// Status reported when no HTTP response was received.
pub const TRANSPORT_ERROR_STATUS: u16 = 500;

/// The uniform failure shape every resource call is normalized into.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message} (status {status})")]
pub struct ApiError {
    /// Server-provided `detail`, or the generic fallback.
    pub message: String,

    /// HTTP status code, 500 when no response was received.
    pub status: u16,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

impl ApiError {
    /// Create an error with an explicit message and status.
    pub fn new(message: impl Into<String>, status: u16) -> Self {
        Self {
            message: message.into(),
            status,
        }
    }

    /// Failure where no response came back (connect, DNS, reset, timeout).
    pub fn transport() -> Self {
        Self::new(GENERIC_ERROR_MESSAGE, TRANSPORT_ERROR_STATUS)
    }

    /// Build from a non-2xx response. `detail` is used only when it is a string.
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.detail)
            .and_then(|d| d.as_str().map(str::to_string))
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string());

        Self::new(message, status)
    }

    /// True if this error stands for "no response received".
    pub fn is_transport(&self) -> bool {
        self.status == TRANSPORT_ERROR_STATUS && self.message == GENERIC_ERROR_MESSAGE
    }
}

/// Main error type for Blockflow operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockflowError {
    /// A backend call failed (transport or server).
    #[error("{0}")]
    Api(#[from] ApiError),

    /// Client-side validation failed before any call was issued.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// An operation needed a selected flow but none was selected.
    #[error("No flow is selected")]
    NotSelected,

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BlockflowError {
    /// HTTP-like status for this error, if it came from the backend.
    pub fn status(&self) -> Option<u16> {
        match self {
            BlockflowError::Api(e) => Some(e.status),
            _ => None,
        }
    }

    /// Returns true if no response was received.
    pub fn is_transport(&self) -> bool {
        matches!(self, BlockflowError::Api(e) if e.is_transport())
    }

    /// The message to show a user.
    pub fn user_message(&self) -> String {
        match self {
            BlockflowError::Api(e) => e.message.clone(),
            other => other.to_string(),
        }
    }
}

/// Convenience Result type for Blockflow operations.
pub type Result<T> = std::result::Result<T, BlockflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_is_used_verbatim() {
        let err = ApiError::from_response(422, r#"{"detail": "name required"}"#);
        assert_eq!(err.message, "name required");
        assert_eq!(err.status, 422);
    }

    #[test]
    fn test_missing_or_non_string_detail_falls_back() {
        assert_eq!(
            ApiError::from_response(404, "").message,
            GENERIC_ERROR_MESSAGE
        );
        assert_eq!(
            ApiError::from_response(500, "<html>oops</html>").message,
            GENERIC_ERROR_MESSAGE
        );
        // FastAPI validation errors carry a list in `detail`
        let err = ApiError::from_response(422, r#"{"detail": [{"loc": ["body", "name"]}]}"#);
        assert_eq!(err.message, GENERIC_ERROR_MESSAGE);
        assert_eq!(err.status, 422);
    }

    #[test]
    fn test_transport_error_shape() {
        let err: BlockflowError = ApiError::transport().into();
        assert_eq!(err.status(), Some(500));
        assert!(err.is_transport());
        assert_eq!(err.user_message(), GENERIC_ERROR_MESSAGE);
    }

    #[test]
    fn test_server_500_with_detail_is_not_transport() {
        let err = ApiError::from_response(500, r#"{"detail": "boom"}"#);
        assert!(!err.is_transport());
    }
}
