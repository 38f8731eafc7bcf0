//! Wire types of the remote rate limit API.
//!
//! Field names and omission rules mirror the JSON accepted and returned by the
//! service. Values that the service treats as "unset" are skipped when empty so
//! that the payload only carries what the configuration actually specifies.

use serde::{Deserialize, Serialize};

/// What the edge does once a rule's threshold is exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionMode {
    Simulate,
    Ban,
    Challenge,
    JsChallenge,
}

impl ActionMode {
    pub const NAMES: &'static [&'static str] = &["simulate", "ban", "challenge", "js_challenge"];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionMode::Simulate => "simulate",
            ActionMode::Ban => "ban",
            ActionMode::Challenge => "challenge",
            ActionMode::JsChallenge => "js_challenge",
        }
    }

    /// Whether this mode blocks for a fixed duration and therefore needs a timeout.
    pub fn requires_timeout(&self) -> bool {
        matches!(self, ActionMode::Simulate | ActionMode::Ban)
    }
}

/// Content type of a custom action response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentType {
    #[serde(rename = "text/plain")]
    TextPlain,
    #[serde(rename = "text/xml")]
    TextXml,
    #[serde(rename = "application/json")]
    ApplicationJson,
}

impl ContentType {
    pub const NAMES: &'static [&'static str] = &["text/plain", "text/xml", "application/json"];
}

/// HTTP methods a rule can match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HttpMethod {
    #[serde(rename = "GET")]
    Get,
    #[serde(rename = "POST")]
    Post,
    #[serde(rename = "PUT")]
    Put,
    #[serde(rename = "DELETE")]
    Delete,
    #[serde(rename = "PATCH")]
    Patch,
    #[serde(rename = "HEAD")]
    Head,
    #[serde(rename = "_ALL_")]
    All,
}

impl HttpMethod {
    pub const NAMES: &'static [&'static str] =
        &["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "_ALL_"];
}

/// URL schemes a rule can match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Scheme {
    #[serde(rename = "HTTP")]
    Http,
    #[serde(rename = "HTTPS")]
    Https,
    #[serde(rename = "_ALL_")]
    All,
}

impl Scheme {
    pub const NAMES: &'static [&'static str] = &["HTTP", "HTTPS", "_ALL_"];
}

/// How requests are grouped when counting against the threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelateBy {
    /// Count by the translated (NAT) client address
    #[default]
    Nat,
}

impl CorrelateBy {
    pub const NAMES: &'static [&'static str] = &["nat"];
}

/// Kind of key a bypass entry exempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BypassName {
    #[default]
    Url,
}

impl BypassName {
    pub const NAMES: &'static [&'static str] = &["url"];
}

/// A rate limit rule as stored by the remote service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateLimitRecord {
    /// Server-assigned id; never sent on create
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bypass: Option<Vec<RateLimitBypass>>,
    /// Requests allowed per period
    #[serde(default)]
    pub threshold: u32,
    /// Counting period in seconds
    #[serde(default)]
    pub period: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlate: Option<RateLimitCorrelate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<RateLimitAction>,
    #[serde(default)]
    pub r#match: RateLimitMatch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitAction {
    pub mode: ActionMode,
    /// Block duration in seconds, zero when the mode takes none
    #[serde(default, skip_serializing_if = "is_zero")]
    pub timeout: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ActionResponse>,
}

/// Custom body served when the action fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse {
    pub content_type: ContentType,
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateLimitMatch {
    #[serde(default)]
    pub request: MatchRequest,
    #[serde(default)]
    pub response: MatchResponse,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchRequest {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<HttpMethod>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schemes: Vec<Scheme>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchResponse {
    #[serde(default, rename = "status", skip_serializing_if = "Vec::is_empty")]
    pub statuses: Vec<u16>,
    /// Tri-state: `None` leaves the service default in place
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_traffic: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<MatchResponseHeader>,
}

impl MatchResponse {
    /// True when none of the response conditions is populated.
    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty() && self.origin_traffic.is_none() && self.headers.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResponseHeader {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub op: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitCorrelate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by: Option<CorrelateBy>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitBypass {
    #[serde(default)]
    pub name: BypassName,
    #[serde(default)]
    pub value: String,
}

/// Envelope wrapping every response body.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default = "Option::default")]
    pub result: Option<T>,
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<ApiMessage>,
    #[serde(default)]
    pub messages: Vec<serde_json::Value>,
}

/// An error entry in the response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiMessage {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

fn default_success() -> bool {
    true
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_record_payload() {
        let payload = serde_json::to_value(RateLimitRecord::default()).unwrap();
        assert_eq!(
            payload,
            json!({
                "disabled": false,
                "threshold": 0,
                "period": 0,
                "match": { "request": {}, "response": {} }
            })
        );
    }

    #[test]
    fn test_record_from_service_json() {
        let body = json!({
            "id": "372e67954025e0ba6aaa6d586b9e0b59",
            "disabled": false,
            "description": "Prevent multiple login failures",
            "threshold": 60,
            "period": 900,
            "action": {
                "mode": "js_challenge",
                "response": { "content_type": "text/xml", "body": "<error>blocked</error>" }
            },
            "match": {
                "request": { "methods": ["GET", "POST"], "schemes": ["_ALL_"], "url": "*.example.org/path*" },
                "response": { "status": [401, 403], "origin_traffic": true,
                              "headers": [{ "name": "Cf-Cache-Status", "op": "ne", "value": "HIT" }] }
            },
            "correlate": { "by": "nat" },
            "bypass": [{ "name": "url", "value": "api.example.com/*" }]
        });

        let record: RateLimitRecord = serde_json::from_value(body).unwrap();
        let action = record.action.unwrap();
        assert_eq!(action.mode, ActionMode::JsChallenge);
        assert_eq!(action.timeout, 0);
        assert_eq!(action.response.unwrap().content_type, ContentType::TextXml);
        assert_eq!(record.r#match.request.methods, vec![HttpMethod::Get, HttpMethod::Post]);
        assert_eq!(record.r#match.request.schemes, vec![Scheme::All]);
        assert_eq!(record.r#match.response.statuses, vec![401, 403]);
        assert_eq!(record.r#match.response.origin_traffic, Some(true));
        assert_eq!(record.correlate.unwrap().by, Some(CorrelateBy::Nat));
        assert_eq!(record.bypass.unwrap()[0].value, "api.example.com/*");
    }

    #[test]
    fn test_origin_traffic_false_is_sent() {
        let response = MatchResponse {
            origin_traffic: Some(false),
            ..Default::default()
        };
        assert!(!response.is_empty());
        assert_eq!(serde_json::to_value(&response).unwrap(), json!({ "origin_traffic": false }));
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let result = serde_json::from_value::<RateLimitAction>(json!({ "mode": "block" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_envelope_defaults() {
        let envelope: ApiResponse<RateLimitRecord> = serde_json::from_value(json!({})).unwrap();
        assert!(envelope.success);
        assert!(envelope.result.is_none());
        assert!(envelope.errors.is_empty());
    }
}
