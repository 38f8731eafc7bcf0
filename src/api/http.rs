//! HTTP implementation of the rate limit service client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use super::client::{ApiError, RateLimitApi};
use super::model::{ApiResponse, RateLimitRecord};
use crate::config::ApiConfig;
use crate::error::{AdapterError, Result};

/// Header carrying the IAM bearer token.
const AUTH_HEADER: &str = "X-Auth-User-Token";

/// `reqwest`-backed client for the `/v1/{instance}/zones/{zone}/rate_limits` routes.
pub struct HttpRateLimitClient {
    http: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpRateLimitClient {
    /// Build a client from API configuration.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let base_url = Url::parse(&config.endpoint).map_err(|e| {
            AdapterError::Config(format!("invalid API endpoint {:?}: {}", config.endpoint, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(AdapterError::Config(format!(
                "API endpoint {:?} cannot be used as a base URL",
                config.endpoint
            )));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| AdapterError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            token: config.token.clone(),
        })
    }

    /// URL of the rule collection, or of a single rule when `rule_id` is given.
    fn rate_limits_url(
        &self,
        instance_id: &str,
        zone_id: &str,
        rule_id: Option<&str>,
    ) -> std::result::Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ApiError::Decode(format!("invalid base URL {}", self.base_url)))?;
            segments
                .pop_if_empty()
                .extend(["v1", instance_id, "zones", zone_id, "rate_limits"]);
            if let Some(rule_id) = rule_id {
                segments.push(rule_id);
            }
        }
        Ok(url)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.header(AUTH_HEADER, token),
            None => builder,
        }
    }

    /// Send a request and unwrap the response envelope.
    async fn send<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> std::result::Result<Option<T>, ApiError> {
        let response = self.authorize(builder).send().await?;
        let status = response.status();
        let body = response.text().await?;

        trace!(status = %status, body = %body, "Received rate limit API response");

        classify_response(status, &body)
    }
}

/// Map a status and body to the envelope result or a typed error.
///
/// 404 is reported as [`ApiError::NotFound`] so callers can treat the rule as
/// absent; any other non-2xx status is [`ApiError::Status`].
fn classify_response<T: DeserializeOwned>(
    status: StatusCode,
    body: &str,
) -> std::result::Result<Option<T>, ApiError> {
    if status == StatusCode::NOT_FOUND {
        return Err(ApiError::NotFound(error_message(body, status)));
    }
    if !status.is_success() {
        return Err(ApiError::Status {
            status: status.as_u16(),
            message: error_message(body, status),
        });
    }

    decode_envelope(body)
}

#[async_trait]
impl RateLimitApi for HttpRateLimitClient {
    async fn create_rate_limit(
        &self,
        instance_id: &str,
        zone_id: &str,
        record: &RateLimitRecord,
    ) -> std::result::Result<RateLimitRecord, ApiError> {
        let url = self.rate_limits_url(instance_id, zone_id, None)?;
        debug!(url = %url, "Creating rate limit");
        self.send(self.http.post(url).json(record))
            .await?
            .ok_or_else(|| ApiError::Decode("create response has no result".to_string()))
    }

    async fn get_rate_limit(
        &self,
        instance_id: &str,
        zone_id: &str,
        rule_id: &str,
    ) -> std::result::Result<RateLimitRecord, ApiError> {
        let url = self.rate_limits_url(instance_id, zone_id, Some(rule_id))?;
        debug!(url = %url, "Fetching rate limit");
        self.send(self.http.get(url))
            .await?
            .ok_or_else(|| ApiError::Decode("get response has no result".to_string()))
    }

    async fn update_rate_limit(
        &self,
        instance_id: &str,
        zone_id: &str,
        rule_id: &str,
        record: &RateLimitRecord,
    ) -> std::result::Result<RateLimitRecord, ApiError> {
        let url = self.rate_limits_url(instance_id, zone_id, Some(rule_id))?;
        debug!(url = %url, "Updating rate limit");
        self.send(self.http.put(url).json(record))
            .await?
            .ok_or_else(|| ApiError::Decode("update response has no result".to_string()))
    }

    async fn delete_rate_limit(
        &self,
        instance_id: &str,
        zone_id: &str,
        rule_id: &str,
    ) -> std::result::Result<(), ApiError> {
        let url = self.rate_limits_url(instance_id, zone_id, Some(rule_id))?;
        debug!(url = %url, "Deleting rate limit");
        self.send::<serde_json::Value>(self.http.delete(url)).await?;
        Ok(())
    }
}

/// Parse a success body, turning `success: false` into an error.
fn decode_envelope<T: DeserializeOwned>(body: &str) -> std::result::Result<Option<T>, ApiError> {
    if body.trim().is_empty() {
        return Ok(None);
    }

    let envelope: ApiResponse<T> =
        serde_json::from_str(body).map_err(|e| ApiError::Decode(e.to_string()))?;

    if !envelope.success {
        return Err(ApiError::Rejected(join_errors(&envelope.errors).unwrap_or_else(
            || "service reported failure without details".to_string(),
        )));
    }

    Ok(envelope.result)
}

/// Best-effort human-readable message from an error body.
fn error_message(body: &str, status: StatusCode) -> String {
    if let Ok(envelope) = serde_json::from_str::<ApiResponse<serde_json::Value>>(body) {
        if let Some(message) = join_errors(&envelope.errors) {
            return message;
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        status.canonical_reason().unwrap_or("no response body").to_string()
    } else {
        trimmed.to_string()
    }
}

fn join_errors(errors: &[super::model::ApiMessage]) -> Option<String> {
    if errors.is_empty() {
        return None;
    }
    let messages: Vec<String> = errors
        .iter()
        .map(|e| format!("{} (code {})", e.message, e.code))
        .collect();
    Some(messages.join("; "))
}
