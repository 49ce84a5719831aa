//! Minimal D&D Beyond API client.
//!
//! This crate fetches the two documents the sheet engine needs:
//! - The global config document (abilities, skills, damage types, weapons,
//!   adjustment types)
//! - A single character's JSON document
//!
//! Both are returned as parsed `serde_json::Value`s. No retries are performed;
//! a failed request is reported to the caller as-is.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://www.dndbeyond.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const CLIENT_USER_AGENT: &str = concat!("beyond/", env!("CARGO_PKG_VERSION"));

/// Errors that can occur when talking to D&D Beyond.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// True when the server answered 404, i.e. the character does not exist
    /// or is not public.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Api { status: 404, .. })
    }
}

/// Connection settings for the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    /// Build a config from `DDB_BASE_URL` and `DDB_TIMEOUT_SECS`, falling back
    /// to the defaults for anything unset.
    pub fn from_env() -> Result<Self, Error> {
        let mut config = Self::default();
        if let Ok(base_url) = std::env::var("DDB_BASE_URL") {
            config = config.with_base_url(base_url);
        }
        if let Ok(secs) = std::env::var("DDB_TIMEOUT_SECS") {
            let secs: u64 = secs
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("DDB_TIMEOUT_SECS: {e}")))?;
            config = config.with_timeout(Duration::from_secs(secs));
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// URL of the global config document.
    pub fn config_url(&self) -> String {
        format!("{}/api/config/json", self.base_url)
    }

    /// URL of a character's JSON document.
    pub fn character_url(&self, id: u64) -> String {
        format!("{}/character/{id}/json", self.base_url)
    }
}

/// D&D Beyond API client.
#[derive(Clone)]
pub struct Beyond {
    client: reqwest::Client,
    config: ClientConfig,
}

impl Beyond {
    /// Create a client with the given settings.
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .default_headers(default_headers())
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Create a client from the `DDB_*` environment variables.
    pub fn from_env() -> Result<Self, Error> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fetch the global config document.
    pub async fn fetch_config(&self) -> Result<serde_json::Value, Error> {
        self.get_json(&self.config.config_url()).await
    }

    /// Fetch a character's JSON document.
    ///
    /// Some responses wrap the sheet in a `{ "success": .., "data": {..} }`
    /// envelope; the inner `data` object is returned in that case.
    pub async fn fetch_character(&self, id: u64) -> Result<serde_json::Value, Error> {
        let value = self.get_json(&self.config.character_url(id)).await?;
        unwrap_envelope(value)
    }

    async fn get_json(&self, url: &str) -> Result<serde_json::Value, Error> {
        debug!(url, "fetching document");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!(url, status, "document fetch failed");
            return Err(Error::Api {
                status,
                message: body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))
    }
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));
    headers
}

#[derive(Deserialize)]
struct Envelope {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    data: Option<serde_json::Value>,
}

fn unwrap_envelope(value: serde_json::Value) -> Result<serde_json::Value, Error> {
    let is_envelope = value.get("success").is_some() && value.get("data").is_some();
    if !is_envelope {
        return Ok(value);
    }

    let envelope: Envelope =
        serde_json::from_value(value).map_err(|e| Error::Parse(e.to_string()))?;
    match (envelope.success, envelope.data) {
        (true, Some(data)) => Ok(data),
        _ => Err(Error::Api {
            status: 404,
            message: envelope
                .message
                .unwrap_or_else(|| "character unavailable".to_string()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_urls() {
        let config = ClientConfig::default().with_base_url("http://localhost:8080/");
        assert_eq!(config.config_url(), "http://localhost:8080/api/config/json");
        assert_eq!(
            config.character_url(1234),
            "http://localhost:8080/character/1234/json"
        );
    }

    #[test]
    fn test_client_creation() {
        let client = Beyond::new(ClientConfig::default().with_timeout(Duration::from_secs(5)))
            .expect("client should build");
        assert_eq!(client.config().timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_plain_document_passes_through() {
        let doc = json!({"name": "Vex", "stats": []});
        assert_eq!(unwrap_envelope(doc.clone()).unwrap(), doc);
    }

    #[test]
    fn test_envelope_unwrapped() {
        let doc = json!({"success": true, "message": "ok", "data": {"name": "Vex"}});
        assert_eq!(unwrap_envelope(doc).unwrap(), json!({"name": "Vex"}));
    }

    #[test]
    fn test_failed_envelope_is_not_found() {
        let doc = json!({"success": false, "message": "private", "data": null});
        let err = unwrap_envelope(doc).unwrap_err();
        assert!(err.is_not_found());
    }
}
