//! Error types for the academy client
//!
//! Every failure, whether it came from the transport, the server, or local
//! storage, is normalized into [`Error`]. Callers read [`Error::status`] and
//! [`Error::message`] without caring where the failure started.

use serde_json::Value;
use thiserror::Error;

/// Result type alias using the academy Error
pub type Result<T> = std::result::Result<T, Error>;

/// Fallback message for transport failures that carry no useful text
pub const NETWORK_ERROR_MESSAGE: &str = "An unknown network error occurred";

/// Academy error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Network errors (E100-E199)
    #[error("Network error: {0}. Check your internet connection.")]
    Network(#[from] reqwest::Error),

    #[error("{message}")]
    Http {
        status: u16,
        message: String,
        details: Option<Value>,
    },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    // Storage errors (E200-E299)
    #[error("Storage error: {0}")]
    Storage(String),

    // Session errors (E300-E399)
    #[error("Session changed while the operation was in flight")]
    Superseded,

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    Config(String),

    // Input errors (E800-E899)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Build an HTTP error from a status and message
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
            details: None,
        }
    }

    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::Network(_) => "E100",
            Self::Http { .. } => "E101",
            Self::MalformedResponse(_) => "E102",
            Self::Storage(_) => "E200",
            Self::Superseded => "E300",
            Self::Config(_) => "E600",
            Self::InvalidInput(_) => "E800",
            Self::Serialization(_) => "E801",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::Network(_) => Some("academy config get api.base_url".to_string()),
            Self::Http { status: 401, .. } => Some("academy login <username-or-email>".to_string()),
            Self::Storage(_) => Some("academy config set storage.backend file".to_string()),
            Self::Config(_) => Some("academy config list".to_string()),
            _ => None,
        }
    }

    /// HTTP status of the failed response, absent for transport failures
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Human-readable message, always present
    pub fn message(&self) -> String {
        match self {
            Self::Http { message, .. } => message.clone(),
            Self::Network(e) if e.is_timeout() => "Request timed out".to_string(),
            Self::Network(e) if e.is_connect() => "Could not connect to the server".to_string(),
            Self::Network(_) => NETWORK_ERROR_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }

    /// Diagnostic payload returned by the server, if any
    pub fn details(&self) -> Option<&Value> {
        match self {
            Self::Http { details, .. } => details.as_ref(),
            _ => None,
        }
    }

    /// True when the server rejected the credential (HTTP 401)
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_http_error_message_is_display() {
        let error = Error::Http {
            status: 401,
            message: "Bad credentials".to_string(),
            details: Some(json!({"message": "Bad credentials"})),
        };
        assert_eq!(error.to_string(), "Bad credentials");
        assert_eq!(error.message(), "Bad credentials");
        assert_eq!(error.status(), Some(401));
        assert!(error.is_unauthorized());
        assert_eq!(error.code(), "E101");
        assert_eq!(
            error.suggestion(),
            Some("academy login <username-or-email>".to_string())
        );
    }

    #[test]
    fn test_server_error_is_not_unauthorized() {
        let error = Error::http(500, "Internal Server Error");
        assert!(!error.is_unauthorized());
        assert_eq!(error.suggestion(), None);
        assert!(error.details().is_none());
    }

    #[test]
    fn test_non_http_errors_have_no_status() {
        let errors = [
            Error::MalformedResponse("missing token".to_string()),
            Error::Storage("keyring locked".to_string()),
            Error::Superseded,
        ];
        for error in errors {
            assert_eq!(error.status(), None);
            assert!(!error.message().is_empty());
        }
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::MalformedResponse(String::new()).code(), "E102");
        assert_eq!(Error::Storage(String::new()).code(), "E200");
        assert_eq!(Error::Superseded.code(), "E300");
        assert_eq!(Error::Config(String::new()).code(), "E600");
        assert_eq!(Error::InvalidInput(String::new()).code(), "E800");
    }
}
