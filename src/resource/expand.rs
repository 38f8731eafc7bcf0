//! Building the remote payload from a rule configuration.

use tracing::debug;

use super::schema::{
    ActionConfig, BypassConfig, CorrelateConfig, MatchConfig, MatchRequestConfig,
    MatchResponseConfig, RuleConfig,
};
use crate::api::model::{
    ActionResponse, MatchRequest, MatchResponse, MatchResponseHeader, RateLimitAction,
    RateLimitBypass, RateLimitCorrelate, RateLimitMatch, RateLimitRecord,
};
use crate::error::{AdapterError, Result};

/// Build the full request body for create and update.
///
/// Fails with [`AdapterError::Validation`] before anything is sent when the
/// action's mode and timeout contradict each other.
pub fn expand_rule(rule: &RuleConfig) -> Result<RateLimitRecord> {
    let record = RateLimitRecord {
        id: String::new(),
        disabled: rule.disabled,
        description: rule.description.clone(),
        bypass: expand_bypass(rule.bypass.as_deref()),
        threshold: rule.threshold,
        period: rule.period,
        correlate: Some(expand_correlate(rule.correlate.as_ref())),
        action: Some(expand_action(&rule.action)?),
        r#match: expand_match(rule.r#match.as_ref()),
    };

    debug!(
        threshold = record.threshold,
        period = record.period,
        "Expanded rate limit rule"
    );
    Ok(record)
}

/// Expand the action block, enforcing the mode/timeout exclusion.
pub fn expand_action(action: &ActionConfig) -> Result<RateLimitAction> {
    let mode = action.mode;
    if action.timeout == 0 {
        if mode.requires_timeout() {
            return Err(AdapterError::Validation(format!(
                "timeout must be set for mode '{}'; valid range for timeout is 10 - 86400",
                mode.as_str()
            )));
        }
    } else if !mode.requires_timeout() {
        return Err(AdapterError::Validation(format!(
            "timeout is only valid for 'simulate' and 'ban' modes, not '{}'",
            mode.as_str()
        )));
    }

    Ok(RateLimitAction {
        mode,
        timeout: action.timeout,
        response: action.response.as_ref().map(|response| ActionResponse {
            content_type: response.content_type,
            body: response.body.clone(),
        }),
    })
}

/// Expand the match block; an absent block yields an empty match.
pub fn expand_match(matching: Option<&MatchConfig>) -> RateLimitMatch {
    let Some(matching) = matching else {
        return RateLimitMatch::default();
    };

    RateLimitMatch {
        request: matching
            .request
            .as_ref()
            .map(expand_match_request)
            .unwrap_or_default(),
        response: matching
            .response
            .as_ref()
            .map(expand_match_response)
            .unwrap_or_default(),
    }
}

fn expand_match_request(request: &MatchRequestConfig) -> MatchRequest {
    MatchRequest {
        methods: request.methods.iter().copied().collect(),
        schemes: request.schemes.iter().copied().collect(),
        url: request.url.clone().filter(|url| !url.is_empty()),
    }
}

fn expand_match_response(response: &MatchResponseConfig) -> MatchResponse {
    MatchResponse {
        statuses: response.status.iter().copied().collect(),
        origin_traffic: response.origin_traffic,
        headers: response
            .headers
            .iter()
            .map(|header| MatchResponseHeader {
                name: header.name.clone(),
                op: header.op.clone(),
                value: header.value.clone(),
            })
            .collect(),
    }
}

/// Expand the correlate block. An absent block still sends an empty correlate
/// so the service applies its own default.
pub fn expand_correlate(correlate: Option<&CorrelateConfig>) -> RateLimitCorrelate {
    RateLimitCorrelate {
        by: correlate.map(|c| c.by),
    }
}

/// Expand the bypass list, keeping its order.
pub fn expand_bypass(bypass: Option<&[BypassConfig]>) -> Option<Vec<RateLimitBypass>> {
    bypass.map(|entries| {
        entries
            .iter()
            .map(|entry| RateLimitBypass {
                name: entry.name,
                value: entry.value.clone(),
            })
            .collect()
    })
}
