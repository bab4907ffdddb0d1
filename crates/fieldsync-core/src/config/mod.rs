//! Client configuration.
//!
//! `ClientConfig` carries the remote endpoint and the sync tuning knobs
//! shared by every front end. Credentials are never part of it.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::sync::{RejectionPolicy, SyncOptions};

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
const DEFAULT_RETRY_BASE_SECS: u64 = 5;
const DEFAULT_RETRY_MAX_SECS: u64 = 300;

/// Sync endpoint and tuning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Base URL of the BrAPI server, e.g. `https://brapi.example.org`
    #[serde(default)]
    pub api_base_url: Option<String>,
    /// Upper bound on one send, enforced by the sync service
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// What a durable server rejection does to the drain
    #[serde(default)]
    pub rejection_policy: RejectionPolicy,
    /// First auto-sync retry delay after a transient failure
    #[serde(default = "default_retry_base_secs")]
    pub retry_base_secs: u64,
    /// Cap for the doubling retry delay
    #[serde(default = "default_retry_max_secs")]
    pub retry_max_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            rejection_policy: RejectionPolicy::default(),
            retry_base_secs: DEFAULT_RETRY_BASE_SECS,
            retry_max_secs: DEFAULT_RETRY_MAX_SECS,
        }
    }
}

impl ClientConfig {
    /// Parse and normalize a config from JSON.
    pub fn parse(payload: &str) -> Result<Self, String> {
        let config: Self = serde_json::from_str(payload)
            .map_err(|error| format!("invalid client config JSON: {error}"))?;
        config.normalized()
    }

    /// Trim and validate fields.
    ///
    /// The base URL must use http(s) and loses any trailing slash.
    pub fn normalized(self) -> Result<Self, String> {
        let api_base_url = normalize_base_url(self.api_base_url)
            .map_err(|error| format!("api_base_url {error}"))?;

        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be greater than zero".to_string());
        }
        if self.retry_base_secs == 0 {
            return Err("retry_base_secs must be greater than zero".to_string());
        }
        if self.retry_max_secs < self.retry_base_secs {
            return Err(format!(
                "retry_max_secs ({}) must not be below retry_base_secs ({})",
                self.retry_max_secs, self.retry_base_secs
            ));
        }

        Ok(Self {
            api_base_url,
            ..self
        })
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Options for [`crate::sync::SyncService`]
    pub const fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            send_timeout: self.request_timeout(),
            rejection_policy: self.rejection_policy,
            retry_base: Duration::from_secs(self.retry_base_secs),
            retry_max: Duration::from_secs(self.retry_max_secs),
        }
    }
}

/// Trimmed text, or `None` when blank
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Trim an http(s) base URL and drop trailing slashes
///
/// Blank input is `Ok(None)`.
pub fn normalize_base_url(raw: Option<String>) -> Result<Option<String>, String> {
    let Some(url) = non_blank(raw) else {
        return Ok(None);
    };
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(Some(url.trim_end_matches('/').to_string()))
    } else {
        Err("must include http:// or https://".to_string())
    }
}

const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

const fn default_retry_base_secs() -> u64 {
    DEFAULT_RETRY_BASE_SECS
}

const fn default_retry_max_secs() -> u64 {
    DEFAULT_RETRY_MAX_SECS
}
