//! Mapping a remote record back into the configuration shape.
//!
//! The action, match, match request and correlate blocks are always emitted,
//! even when empty. The match response block is only emitted when one of its
//! conditions is populated, so an unused response block does not show up as a
//! spurious empty block in the engine's diff.

use super::schema::{
    ActionConfig, ActionResponseConfig, BypassConfig, CorrelateConfig, HeaderMatchConfig,
    MatchConfig, MatchRequestConfig, MatchResponseConfig, RuleConfig,
};
use crate::api::model::{
    MatchRequest, MatchResponse, RateLimitAction, RateLimitBypass, RateLimitCorrelate,
    RateLimitMatch, RateLimitRecord,
};
use crate::error::{AdapterError, Result};

/// Map a full remote record into rule configuration.
pub fn flatten_rule(record: &RateLimitRecord) -> Result<RuleConfig> {
    let action = record.action.as_ref().ok_or_else(|| {
        AdapterError::InvariantViolation(format!("rate limit {} has no action", record.id))
    })?;

    Ok(RuleConfig {
        threshold: record.threshold,
        period: record.period,
        description: record.description.clone().filter(|d| !d.is_empty()),
        disabled: record.disabled,
        action: flatten_action(action),
        r#match: Some(flatten_match(&record.r#match)),
        correlate: Some(flatten_correlate(record.correlate.as_ref())),
        bypass: record.bypass.as_deref().map(flatten_bypass),
    })
}

pub fn flatten_action(action: &RateLimitAction) -> ActionConfig {
    ActionConfig {
        mode: action.mode,
        timeout: action.timeout,
        response: action.response.as_ref().map(|response| ActionResponseConfig {
            content_type: response.content_type,
            body: response.body.clone(),
        }),
    }
}

pub fn flatten_match(matching: &RateLimitMatch) -> MatchConfig {
    MatchConfig {
        request: Some(flatten_match_request(&matching.request)),
        response: flatten_match_response(&matching.response),
    }
}

pub fn flatten_match_request(request: &MatchRequest) -> MatchRequestConfig {
    MatchRequestConfig {
        url: request.url.clone().filter(|url| !url.is_empty()),
        methods: request.methods.iter().copied().collect(),
        schemes: request.schemes.iter().copied().collect(),
    }
}

/// `None` unless at least one of origin traffic, statuses or headers is set.
pub fn flatten_match_response(response: &MatchResponse) -> Option<MatchResponseConfig> {
    if response.is_empty() {
        return None;
    }

    Some(MatchResponseConfig {
        status: response.statuses.iter().copied().collect(),
        origin_traffic: response.origin_traffic,
        headers: response
            .headers
            .iter()
            .map(|header| HeaderMatchConfig {
                name: header.name.clone(),
                op: header.op.clone(),
                value: header.value.clone(),
            })
            .collect(),
    })
}

/// A missing or empty correlate flattens to the default grouping.
pub fn flatten_correlate(correlate: Option<&RateLimitCorrelate>) -> CorrelateConfig {
    CorrelateConfig {
        by: correlate.and_then(|c| c.by).unwrap_or_default(),
    }
}

pub fn flatten_bypass(bypass: &[RateLimitBypass]) -> Vec<BypassConfig> {
    bypass
        .iter()
        .map(|entry| BypassConfig {
            name: entry.name,
            value: entry.value.clone(),
        })
        .collect()
}
