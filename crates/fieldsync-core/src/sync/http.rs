//! BrAPI HTTP transport.

use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::Deserialize;

use super::transport::{SyncTransport, TransportError, TransportResult};
use crate::config::{self, non_blank, ClientConfig};
use crate::models::{ActionType, EntityType, PendingSyncAction};

const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";
const SERVER_INFO_PATH: &str = "/brapi/v2/serverinfo";
const PROBE_TIMEOUT_SECS: u64 = 4;

/// Sends queued actions to a BrAPI v2 server
#[derive(Clone)]
pub struct HttpSyncTransport {
    base_url: String,
    token: Option<String>,
    request_timeout: Duration,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpSyncTransport {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpSyncTransport")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl HttpSyncTransport {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        request_timeout: Duration,
    ) -> TransportResult<Self> {
        let base_url = validated_base_url(base_url.into())?;
        Ok(Self {
            base_url,
            token: non_blank(token),
            request_timeout,
            client: reqwest::Client::builder().timeout(request_timeout).build()?,
        })
    }

    /// Build from a normalized config plus an out-of-band token
    pub fn from_config(config: &ClientConfig, token: Option<String>) -> TransportResult<Self> {
        let base_url = config.api_base_url.clone().ok_or_else(|| {
            TransportError::InvalidConfiguration("api_base_url is not configured".to_string())
        })?;
        Self::new(base_url, token, config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Collection URL for an entity type
    pub fn endpoint(&self, entity_type: EntityType) -> String {
        format!("{}{}", self.base_url, resource_path(entity_type))
    }

    /// Whether the server answers its `serverinfo` call
    pub async fn check_connectivity(&self) -> bool {
        let request = self
            .client
            .get(format!("{}{SERVER_INFO_PATH}", self.base_url))
            .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
            .header(reqwest::header::ACCEPT, "application/json");

        match self.authorize(request).send().await {
            Ok(response) => response.status().is_success(),
            Err(error) => {
                tracing::debug!("Connectivity probe failed: {error}");
                false
            }
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.token.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

impl SyncTransport for HttpSyncTransport {
    async fn send(&self, action: &PendingSyncAction) -> TransportResult<()> {
        let method = match action.action_type {
            ActionType::Create => Method::POST,
            ActionType::Update => Method::PUT,
        };
        let url = self.endpoint(action.entity_type);

        let request = self
            .client
            .request(method, &url)
            .header(IDEMPOTENCY_HEADER, action.id.as_str())
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&action.payload);

        let response = self.authorize(request).send().await.map_err(|error| {
            if error.is_timeout() {
                TransportError::Timeout(self.request_timeout)
            } else {
                TransportError::Http(error)
            }
        })?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(action_id = %action.id, status = status.as_u16(), "Server acknowledged action");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(TransportError::from_status(
            status.as_u16(),
            parse_api_error(status, &body),
        ))
    }
}

/// BrAPI v2 collection path for an entity type
pub const fn resource_path(entity_type: EntityType) -> &'static str {
    match entity_type {
        EntityType::Observation => "/brapi/v2/observations",
        EntityType::Germplasm => "/brapi/v2/germplasm",
        EntityType::Trial => "/brapi/v2/trials",
        EntityType::Study => "/brapi/v2/studies",
        EntityType::Cross => "/brapi/v2/crosses",
        EntityType::Image => "/brapi/v2/images",
        EntityType::Sample => "/brapi/v2/samples",
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    detail: Option<serde_json::Value>,
    message: Option<String>,
    error: Option<String>,
}

/// Longest server error detail kept in queue rows and logs
const MAX_ERROR_DETAIL_CHARS: usize = 180;

fn compact_detail(value: &str) -> String {
    value.trim().chars().take(MAX_ERROR_DETAIL_CHARS).collect()
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        let detail = payload.detail.map(|detail| match detail {
            serde_json::Value::String(text) => text,
            other => other.to_string(),
        });
        if let Some(message) = payload.message.or(payload.error).or(detail) {
            return compact_detail(&message);
        }
    }

    let trimmed = compact_detail(body);
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .map_or_else(|| format!("HTTP {}", status.as_u16()), str::to_string)
    } else {
        trimmed
    }
}

fn validated_base_url(raw: String) -> TransportResult<String> {
    config::normalize_base_url(Some(raw))
        .map_err(|error| TransportError::InvalidConfiguration(format!("base URL {error}")))?
        .ok_or_else(|| {
            TransportError::InvalidConfiguration("base URL must not be empty".to_string())
        })
}
