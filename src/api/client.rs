//! Remote client trait for abstracting the rate limit service.

use async_trait::async_trait;
use thiserror::Error;

use super::model::RateLimitRecord;

/// Failures reported by a [`RateLimitApi`] implementation.
///
/// A missing rule is its own variant so callers can treat it as "absent"
/// without inspecting error messages.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The service answered 404 for the addressed rule
    #[error("Request failed with status code: 404, {0}")]
    NotFound(String),

    /// Any other non-success HTTP status
    #[error("Request failed with status code: {status}, {message}")]
    Status { status: u16, message: String },

    /// A success status whose envelope reports `success: false`
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// Connection, TLS or timeout failures
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A body that does not match the expected shape
    #[error("Invalid response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Whether the addressed rule does not exist remotely.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }
}

/// Trait for remote rate limit service clients.
///
/// This trait abstracts over the HTTP client and in-process fakes so the
/// resource lifecycle can work with either.
#[async_trait]
pub trait RateLimitApi: Send + Sync {
    /// Create a rule in a zone and return the stored record.
    async fn create_rate_limit(
        &self,
        instance_id: &str,
        zone_id: &str,
        record: &RateLimitRecord,
    ) -> Result<RateLimitRecord, ApiError>;

    /// Fetch a single rule.
    async fn get_rate_limit(
        &self,
        instance_id: &str,
        zone_id: &str,
        rule_id: &str,
    ) -> Result<RateLimitRecord, ApiError>;

    /// Replace a rule and return the stored record.
    async fn update_rate_limit(
        &self,
        instance_id: &str,
        zone_id: &str,
        rule_id: &str,
        record: &RateLimitRecord,
    ) -> Result<RateLimitRecord, ApiError>;

    /// Delete a rule.
    async fn delete_rate_limit(
        &self,
        instance_id: &str,
        zone_id: &str,
        rule_id: &str,
    ) -> Result<(), ApiError>;
}
