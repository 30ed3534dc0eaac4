//! Courier API client
//!
//! [`HttpApiClient`] is the authenticated request-executing collaborator the
//! rest of the crate builds on: JSON requests against the API base URL with a
//! bearer token, plus raw byte-range transfers for upload operations (which
//! go to whatever destination the server specified, with exactly the headers
//! it specified).
//!
//! Failures are mapped into [`ApiError`] variants that carry everything the
//! classifier needs: timeouts, missing credentials, 401/403, and 429 with the
//! parsed `Retry-After` and `X-Rate-Limit` quota summary.

use crate::config::Config;
use crate::upload::{UploadOperation, UploadTransport};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

pub mod assets;

/// API request failures, classified at the transport boundary.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("no API credentials are configured")]
    MissingCredentials,

    #[error("request timed out")]
    Timeout,

    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("forbidden: {message}")]
    Forbidden { message: String },

    #[error("rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
        quota: Option<RateLimitQuota>,
    },

    #[error("API responded with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to decode response body: {0}")]
    Decode(String),
}

/// Quota summary parsed from the `X-Rate-Limit` header
/// (`user-hour-lim:3600;user-hour-rem:42` format).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitQuota {
    pub limit: Option<u64>,
    pub remaining: Option<u64>,
}

impl RateLimitQuota {
    fn parse(header: &str) -> Option<Self> {
        let mut limit = None;
        let mut remaining = None;
        for part in header.split(';') {
            let Some((key, value)) = part.trim().split_once(':') else {
                continue;
            };
            match key.trim() {
                "user-hour-lim" => limit = value.trim().parse().ok(),
                "user-hour-rem" => remaining = value.trim().parse().ok(),
                _ => {}
            }
        }
        if limit.is_none() && remaining.is_none() {
            None
        } else {
            Some(Self { limit, remaining })
        }
    }
}

/// Parse a `Retry-After` header: delta-seconds or an HTTP-date.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(reqwest::header::RETRY_AFTER)?.to_str().ok()?;
    if let Ok(secs) = raw.trim().parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let when = chrono::DateTime::parse_from_rfc2822(raw.trim()).ok()?;
    (when.with_timezone(&Utc) - Utc::now()).to_std().ok()
}

fn parse_rate_limit_quota(headers: &HeaderMap) -> Option<RateLimitQuota> {
    let raw = headers.get("x-rate-limit")?.to_str().ok()?;
    RateLimitQuota::parse(raw)
}

/// Extract a human-readable message from an error response body.
///
/// The API reports errors as `{"errors": [{"title", "detail"}]}`; anything
/// else falls back to the raw body, truncated.
fn error_message(status: StatusCode, body: &str) -> String {
    #[derive(serde::Deserialize)]
    struct ErrorDocument {
        #[serde(default)]
        errors: Vec<ErrorEntry>,
    }
    #[derive(serde::Deserialize)]
    struct ErrorEntry {
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        detail: Option<String>,
    }

    if let Ok(doc) = serde_json::from_str::<ErrorDocument>(body) {
        let details: Vec<String> = doc
            .errors
            .into_iter()
            .filter_map(|e| e.detail.or(e.title))
            .collect();
        if !details.is_empty() {
            return details.join("; ");
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        trimmed.chars().take(200).collect()
    }
}

fn map_send_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::Transport(err.to_string())
    }
}

async fn error_from_response(response: Response) -> ApiError {
    let status = response.status();
    let retry_after = parse_retry_after(response.headers());
    let quota = parse_rate_limit_quota(response.headers());
    let body = response.text().await.unwrap_or_default();
    let message = error_message(status, &body);

    match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized { message },
        StatusCode::FORBIDDEN => ApiError::Forbidden { message },
        StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited {
            message,
            retry_after,
            quota,
        },
        StatusCode::REQUEST_TIMEOUT => ApiError::Timeout,
        _ => ApiError::Status {
            status: status.as_u16(),
            message,
        },
    }
}

/// Authenticated HTTP client for the Courier API.
pub struct HttpApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpApiClient {
    /// Create a client from configuration.
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.api.request_timeout())
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.api.base_url.trim_end_matches('/').to_string(),
            token: config.api.token.clone().filter(|t| !t.is_empty()),
        })
    }

    /// Whether a credential is configured at all.
    pub fn has_credentials(&self) -> bool {
        self.token.is_some()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve a path against the base URL. Absolute URLs (pagination
    /// cursors) pass through unchanged.
    fn url(&self, path_or_url: &str) -> String {
        if path_or_url.starts_with("http://") || path_or_url.starts_with("https://") {
            path_or_url.to_string()
        } else {
            format!("{}/{}", self.base_url, path_or_url.trim_start_matches('/'))
        }
    }

    /// GET a JSON resource. Accepts either an API path or an absolute cursor
    /// URL.
    pub async fn get_json<T: DeserializeOwned>(&self, path_or_url: &str) -> Result<T, ApiError> {
        self.send_json::<(), T>(Method::GET, path_or_url, None).await
    }

    /// POST a JSON body and decode the JSON response.
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send_json(Method::POST, path, Some(body)).await
    }

    /// PATCH a JSON body and decode the JSON response.
    pub async fn patch_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send_json(Method::PATCH, path, Some(body)).await
    }

    async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path_or_url: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError> {
        let token = self
            .token
            .as_deref()
            .ok_or(ApiError::MissingCredentials)?;
        let url = self.url(path_or_url);

        let mut request = self
            .http
            .request(method.clone(), &url)
            .bearer_auth(token)
            .header("X-Request-Id", uuid::Uuid::new_v4().to_string());
        if let Some(body) = body {
            request = request.json(body);
        }

        tracing::debug!(method = %method, url = %url, "api request");
        let response = request.send().await.map_err(map_send_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl UploadTransport for HttpApiClient {
    /// One raw transfer per upload operation: exact method, exact URL, every
    /// specified header (duplicates included), byte slice as the body. The
    /// destination is server-chosen and gets no bearer token.
    async fn transmit(&self, operation: &UploadOperation, body: Bytes) -> Result<(), ApiError> {
        let method = Method::from_bytes(operation.method.as_bytes())
            .map_err(|_| ApiError::Transport(format!("invalid method {:?}", operation.method)))?;

        let mut headers = HeaderMap::new();
        for header in &operation.request_headers {
            let name = HeaderName::from_bytes(header.name.as_bytes())
                .map_err(|_| ApiError::Transport(format!("invalid header name {:?}", header.name)))?;
            let value = HeaderValue::from_str(&header.value).map_err(|_| {
                ApiError::Transport(format!("invalid value for header {:?}", header.name))
            })?;
            headers.append(name, value);
        }

        let response = self
            .http
            .request(method, &operation.url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(map_send_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiConfig, UploadConfig};

    fn test_config(token: Option<&str>) -> Config {
        Config {
            api: ApiConfig {
                base_url: "https://api.courier.example".into(),
                token: token.map(str::to_owned),
                request_timeout_secs: 5,
            },
            upload: UploadConfig::default(),
        }
    }

    #[test]
    fn test_url_resolution() {
        let client = HttpApiClient::new(&test_config(Some("t"))).unwrap();
        assert_eq!(
            client.url("/v1/apps"),
            "https://api.courier.example/v1/apps"
        );
        assert_eq!(client.url("v1/apps"), "https://api.courier.example/v1/apps");
        assert_eq!(
            client.url("https://api.courier.example/v1/apps?cursor=abc"),
            "https://api.courier.example/v1/apps?cursor=abc"
        );
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let client = HttpApiClient::new(&test_config(None)).unwrap();
        assert!(!client.has_credentials());

        let err = client
            .get_json::<serde_json::Value>("/v1/apps")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::MissingCredentials));
    }

    #[test]
    fn test_rate_limit_quota_parsing() {
        let quota = RateLimitQuota::parse("user-hour-lim:3600;user-hour-rem:42").unwrap();
        assert_eq!(quota.limit, Some(3600));
        assert_eq!(quota.remaining, Some(42));

        let quota = RateLimitQuota::parse("user-hour-rem:7").unwrap();
        assert_eq!(quota.limit, None);
        assert_eq!(quota.remaining, Some(7));

        assert!(RateLimitQuota::parse("nothing-useful").is_none());
    }

    #[test]
    fn test_retry_after_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert(reqwest::header::RETRY_AFTER, "30".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_retry_after_http_date() {
        let when = Utc::now() + chrono::Duration::seconds(90);
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::RETRY_AFTER,
            when.to_rfc2822().parse().unwrap(),
        );
        let parsed = parse_retry_after(&headers).unwrap();
        assert!(parsed <= Duration::from_secs(90));
        assert!(parsed >= Duration::from_secs(80));
    }

    #[test]
    fn test_error_message_from_error_document() {
        let body = r#"{"errors":[{"title":"Not Found","detail":"app 123 does not exist"}]}"#;
        assert_eq!(
            error_message(StatusCode::NOT_FOUND, body),
            "app 123 does not exist"
        );
    }

    #[test]
    fn test_error_message_fallbacks() {
        assert_eq!(error_message(StatusCode::NOT_FOUND, ""), "Not Found");
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, "upstream exploded"),
            "upstream exploded"
        );
    }
}
