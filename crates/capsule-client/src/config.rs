//! Client configuration.
//!
//! Configuration is an explicit construction step: missing credentials are a
//! typed error at startup, not a deferred failure on the first request.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default base URL of the Capsule v2 API.
pub const DEFAULT_BASE_URL: &str = "https://api.capsulecrm.com/api/v2";

/// Environment variable holding the Capsule API token.
pub const TOKEN_ENV_VAR: &str = "CAPSULE_API_TOKEN";

/// Environment variable overriding the API base URL.
pub const BASE_URL_ENV_VAR: &str = "CAPSULE_BASE_URL";

/// Configuration problems detected at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No API token was provided.
    #[error(
        "{TOKEN_ENV_VAR} env var is required - create one in Capsule -> \
         My Preferences -> API Authentication and restart the server"
    )]
    MissingToken,

    /// The token contains characters that cannot appear in an HTTP header.
    #[error("API token is not a valid HTTP header value")]
    InvalidToken,
}

/// Connection settings for the Capsule API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapsuleConfig {
    /// Base URL of the API, e.g. `https://api.capsulecrm.com/api/v2`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Personal API token, sent as a bearer header.
    pub api_token: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl CapsuleConfig {
    /// Configuration for the production API with the given token.
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            base_url: default_base_url(),
            api_token: api_token.into(),
        }
    }

    /// Override the base URL (self-hosted proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Read configuration from `CAPSULE_API_TOKEN` / `CAPSULE_BASE_URL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_token = std::env::var(TOKEN_ENV_VAR)
            .ok()
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingToken)?;
        let base_url = std::env::var(BASE_URL_ENV_VAR)
            .ok()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(default_base_url);

        Ok(Self {
            base_url,
            api_token,
        })
    }
}
