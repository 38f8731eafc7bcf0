//! Per-resource state handed between the engine and the lifecycle operations.

use std::fmt;

use super::expand::expand_rule;
use super::flatten::flatten_rule;
use super::schema::{RateLimitSpec, RuleConfig};

/// Rule fields whose change triggers a full re-send on update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackedField {
    Disabled,
    Threshold,
    Period,
    Description,
    Action,
    Match,
    Correlate,
    Bypass,
}

impl TrackedField {
    pub const ALL: [TrackedField; 8] = [
        TrackedField::Disabled,
        TrackedField::Threshold,
        TrackedField::Period,
        TrackedField::Description,
        TrackedField::Action,
        TrackedField::Match,
        TrackedField::Correlate,
        TrackedField::Bypass,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrackedField::Disabled => "disabled",
            TrackedField::Threshold => "threshold",
            TrackedField::Period => "period",
            TrackedField::Description => "description",
            TrackedField::Action => "action",
            TrackedField::Match => "match",
            TrackedField::Correlate => "correlate",
            TrackedField::Bypass => "bypass",
        }
    }

    fn differs(&self, old: &RuleConfig, new: &RuleConfig) -> bool {
        match self {
            TrackedField::Disabled => old.disabled != new.disabled,
            TrackedField::Threshold => old.threshold != new.threshold,
            TrackedField::Period => old.period != new.period,
            TrackedField::Description => old.description != new.description,
            TrackedField::Action => old.action != new.action,
            TrackedField::Match => old.r#match != new.r#match,
            TrackedField::Correlate => old.correlate != new.correlate,
            TrackedField::Bypass => old.bypass != new.bypass,
        }
    }
}

impl fmt::Display for TrackedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of one resource instance for the duration of a lifecycle call.
///
/// An empty id means the resource does not exist (or no longer exists)
/// remotely. `prior` holds the last known remote state and drives change
/// detection on update.
#[derive(Debug, Clone, Default)]
pub struct ResourceData {
    id: String,
    spec: Option<RateLimitSpec>,
    prior: Option<RuleConfig>,
}

impl ResourceData {
    /// State for a resource about to be created from `spec`.
    pub fn new(spec: RateLimitSpec) -> Self {
        Self {
            id: String::new(),
            spec: Some(spec),
            prior: None,
        }
    }

    /// State known only by its composite id, as on import.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            spec: None,
            prior: None,
        }
    }

    /// Desired configuration for an existing resource, diffed against `prior`.
    pub fn planned(id: impl Into<String>, spec: RateLimitSpec, prior: RuleConfig) -> Self {
        Self {
            id: id.into(),
            spec: Some(spec),
            prior: Some(prior),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// Mark the resource as gone.
    pub fn clear_id(&mut self) {
        self.id.clear();
    }

    pub fn exists(&self) -> bool {
        !self.id.is_empty()
    }

    pub fn spec(&self) -> Option<&RateLimitSpec> {
        self.spec.as_ref()
    }

    pub fn set_spec(&mut self, spec: RateLimitSpec) {
        self.spec = Some(spec);
    }

    pub fn into_spec(self) -> Option<RateLimitSpec> {
        self.spec
    }

    /// Tracked fields that differ between the prior state and the configuration.
    ///
    /// Both sides are compared in the form read returns them, so blocks the
    /// service fills in (match, correlate) do not show up as changes when the
    /// configuration leaves them out. Without a prior state every field counts
    /// as changed; without a configuration nothing does.
    pub fn changed_fields(&self) -> Vec<TrackedField> {
        let Some(spec) = &self.spec else {
            return Vec::new();
        };
        let Some(prior) = &self.prior else {
            return TrackedField::ALL.to_vec();
        };

        let old = normalized(prior);
        let new = normalized(&spec.rule);
        TrackedField::ALL
            .into_iter()
            .filter(|field| field.differs(&old, &new))
            .collect()
    }

    pub fn has_change(&self, field: TrackedField) -> bool {
        self.changed_fields().contains(&field)
    }
}

/// The rule as it would read back after being stored.
///
/// A rule that does not expand is compared as written; update reports the
/// validation error itself.
fn normalized(rule: &RuleConfig) -> RuleConfig {
    expand_rule(rule)
        .and_then(|record| flatten_rule(&record))
        .unwrap_or_else(|_| rule.clone())
}
