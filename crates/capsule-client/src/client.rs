//! HTTP transport for the Capsule API.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use url::Url;

use crate::config::CapsuleConfig;
use crate::error::{ClientError, Result};

/// Request timeout, matching Capsule's own recommended client settings.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Async Capsule CRM API client.
///
/// Cheap to clone; the underlying connection pool is shared.
#[derive(Debug, Clone)]
pub struct CapsuleClient {
    http: reqwest::Client,
    base_url: Url,
}

impl CapsuleClient {
    /// Build a client from configuration.
    ///
    /// Fails if the base URL does not parse or the token is not a valid
    /// header value.
    pub fn new(config: CapsuleConfig) -> Result<Self> {
        // Normalize so Url::join treats the last path segment as a directory.
        let mut base_url = Url::parse(&config.base_url)?;
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.api_token))
            .map_err(|_| crate::config::ConfigError::InvalidToken)?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let user_agent = format!(
            "capsule-mcp-server/{} (+https://github.com/fuzzylabs/capsule-crm-mcp-server)",
            env!("CARGO_PKG_VERSION")
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(user_agent)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self { http, base_url })
    }

    /// Base URL requests are issued against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build a URL for an API path.
    pub(crate) fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(ClientError::from)
    }

    /// Make a GET request with query parameters.
    pub(crate) async fn get<T>(&self, path: &str, query: &[(&str, String)]) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = self.url(path)?;
        tracing::debug!(%url, "GET");
        let response = self.http.get(url).query(query).send().await?;
        Self::handle_response(response).await
    }

    /// Make a POST request with a JSON body.
    pub(crate) async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        let url = self.url(path)?;
        tracing::debug!(%url, "POST");
        let response = self.http.post(url).json(body).send().await?;
        Self::handle_response(response).await
    }

    /// Extract the JSON body or turn a non-success status into an error.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            Err(Self::extract_error(response).await)
        }
    }

    /// Build an API error from a failed response.
    ///
    /// Keeps the JSON error body when Capsule sent one, otherwise the raw
    /// response text.
    async fn extract_error(response: reqwest::Response) -> ClientError {
        let status = response.status().as_u16();
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/json"));
        let body = response.text().await.unwrap_or_default();

        let detail = if is_json {
            match serde_json::from_str::<serde_json::Value>(&body) {
                Ok(value) => value.to_string(),
                Err(_) => body,
            }
        } else {
            body
        };

        ClientError::Api { status, detail }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> CapsuleClient {
        CapsuleClient::new(CapsuleConfig::new("test-token").with_base_url(base)).unwrap()
    }

    #[test]
    fn test_base_url_gains_trailing_slash() {
        let c = client("https://api.capsulecrm.com/api/v2");
        assert_eq!(c.base_url().as_str(), "https://api.capsulecrm.com/api/v2/");
    }

    #[test]
    fn test_url_joins_below_base_path() {
        let c = client("https://api.capsulecrm.com/api/v2");

        let url = c.url("parties").unwrap();
        assert_eq!(url.as_str(), "https://api.capsulecrm.com/api/v2/parties");

        // A leading slash must not escape to the host root
        let url = c.url("/parties/search").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.capsulecrm.com/api/v2/parties/search"
        );
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let result = CapsuleClient::new(CapsuleConfig::new("t").with_base_url("not a url"));
        assert!(matches!(result, Err(ClientError::InvalidUrl(_))));
    }
}
