//! Composite identifiers used by the IaC engine.
//!
//! A rate limit rule is addressed remotely by three values: the rule id, the
//! zone id and the service instance id. The engine only stores one opaque
//! string, so the three are joined with [`SEPARATOR`]. Instance ids are CRNs
//! and contain the separator themselves, so decoding splits off the leading
//! components and keeps the remainder intact as the instance id.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Delimiter between identifier components.
pub const SEPARATOR: char = ':';

/// Errors produced when decoding a composite identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdFormatError {
    #[error(
        "expected at least {expected} '{sep}'-separated parts in {id:?}, found {found}",
        sep = SEPARATOR
    )]
    PartCount {
        id: String,
        expected: usize,
        found: usize,
    },
}

/// The 3-tuple key of a rate limit rule: `ruleID:zoneID:instanceID`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuleId {
    /// Server-assigned rule id
    pub rule_id: String,
    /// Zone owning the rule
    pub zone_id: String,
    /// Service instance (CRN) owning the zone
    pub instance_id: String,
}

impl RuleId {
    /// Create a rule id from its components.
    pub fn new(
        rule_id: impl Into<String>,
        zone_id: impl Into<String>,
        instance_id: impl Into<String>,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            zone_id: zone_id.into(),
            instance_id: instance_id.into(),
        }
    }

    /// Decode an identifier produced by [`RuleId::encode`].
    pub fn parse(id: &str) -> Result<Self, IdFormatError> {
        let parts = split_parts(id, 3)?;
        Ok(Self::new(parts[0], parts[1], parts[2]))
    }

    /// Encode to the single string stored by the engine.
    pub fn encode(&self) -> String {
        [
            self.rule_id.as_str(),
            self.zone_id.as_str(),
            self.instance_id.as_str(),
        ]
        .join(&SEPARATOR.to_string())
    }

    /// The domain id of the zone this rule belongs to.
    pub fn domain_id(&self) -> DomainId {
        DomainId::new(self.zone_id.clone(), self.instance_id.clone())
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for RuleId {
    type Err = IdFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// The 2-tuple key of a zone: `zoneID:instanceID`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DomainId {
    /// Zone id
    pub zone_id: String,
    /// Service instance (CRN) owning the zone
    pub instance_id: String,
}

impl DomainId {
    /// Create a domain id from its components.
    pub fn new(zone_id: impl Into<String>, instance_id: impl Into<String>) -> Self {
        Self {
            zone_id: zone_id.into(),
            instance_id: instance_id.into(),
        }
    }

    /// Decode an identifier produced by [`DomainId::encode`].
    pub fn parse(id: &str) -> Result<Self, IdFormatError> {
        let parts = split_parts(id, 2)?;
        Ok(Self::new(parts[0], parts[1]))
    }

    /// Encode to the single string stored by the engine.
    pub fn encode(&self) -> String {
        [self.zone_id.as_str(), self.instance_id.as_str()].join(&SEPARATOR.to_string())
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for DomainId {
    type Err = IdFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Join rule, zone and instance ids into one identifier.
pub fn encode_rule_id(rule_id: &str, zone_id: &str, instance_id: &str) -> String {
    RuleId::new(rule_id, zone_id, instance_id).encode()
}

/// Split an identifier into `(rule_id, zone_id, instance_id)`.
pub fn decode_rule_id(id: &str) -> Result<(String, String, String), IdFormatError> {
    let RuleId {
        rule_id,
        zone_id,
        instance_id,
    } = RuleId::parse(id)?;
    Ok((rule_id, zone_id, instance_id))
}

/// Join zone and instance ids into one identifier.
pub fn encode_domain_id(zone_id: &str, instance_id: &str) -> String {
    DomainId::new(zone_id, instance_id).encode()
}

/// Split an identifier into `(zone_id, instance_id)`.
pub fn decode_domain_id(id: &str) -> Result<(String, String), IdFormatError> {
    let DomainId {
        zone_id,
        instance_id,
    } = DomainId::parse(id)?;
    Ok((zone_id, instance_id))
}

/// Split `id` into exactly `count` parts, the last one keeping any further separators.
fn split_parts(id: &str, count: usize) -> Result<Vec<&str>, IdFormatError> {
    let parts: Vec<&str> = id.splitn(count, SEPARATOR).collect();
    if parts.len() < count {
        return Err(IdFormatError::PartCount {
            id: id.to_string(),
            expected: count,
            found: parts.len(),
        });
    }
    Ok(parts)
}
