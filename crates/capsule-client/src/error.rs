//! Client error types.

use thiserror::Error;

use crate::config::ConfigError;

/// Client error type.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed before a response was received.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing failed.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The Capsule API returned a non-success status.
    #[error("Capsule API error {status}: {detail}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error detail: the JSON error body when the response was JSON,
        /// otherwise the raw response text.
        detail: String,
    },

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ClientError {
    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Api { status: 404, .. })
    }

    /// Check if this is an authentication error.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, ClientError::Api { status: 401, .. })
    }

    /// Check if this is a rate limit error.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ClientError::Api { status: 429, .. })
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = ClientError::Api {
            status: 422,
            detail: r#"{"message":"firstName is required"}"#.to_string(),
        };
        assert!(err.to_string().contains("422"));
        assert!(err.to_string().contains("firstName"));
    }

    #[test]
    fn test_status_predicates() {
        let not_found = ClientError::Api {
            status: 404,
            detail: String::new(),
        };
        assert!(not_found.is_not_found());
        assert!(!not_found.is_auth_error());

        let unauthorized = ClientError::Api {
            status: 401,
            detail: String::new(),
        };
        assert!(unauthorized.is_auth_error());
        assert!(!unauthorized.is_rate_limited());
    }
}
