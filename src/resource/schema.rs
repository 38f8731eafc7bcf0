//! Declarative configuration of a rate limit rule and its schema.
//!
//! Optional nested blocks are plain `Option`s: a block is either absent or
//! present exactly once. Value sets (methods, schemes, statuses) are ordered
//! sets so that the payload built from them is deterministic.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::model::{
    ActionMode, BypassName, ContentType, CorrelateBy, HttpMethod, Scheme,
};
use crate::error::{AdapterError, Result};

/// A complete resource configuration as written by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SpecDocument")]
pub struct RateLimitSpec {
    /// Service instance (CRN) owning the zone
    pub cis_id: String,
    /// Zone, as a `zoneID:instanceID` domain id
    pub domain_id: String,
    /// Server-assigned rule id, filled in by read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    /// The rule itself
    #[serde(flatten)]
    pub rule: RuleConfig,
}

/// The rule fields shared by configuration and flattened remote state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    /// Requests allowed per period
    pub threshold: u32,
    /// Counting period in seconds
    pub period: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub disabled: bool,
    pub action: ActionConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#match: Option<MatchConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlate: Option<CorrelateConfig>,
    /// Absent and empty are distinct: an empty list is sent as `[]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bypass: Option<Vec<BypassConfig>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionConfig {
    pub mode: ActionMode,
    /// Seconds; zero means unset
    #[serde(default)]
    pub timeout: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ActionResponseConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionResponseConfig {
    pub content_type: ContentType,
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<MatchRequestConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<MatchResponseConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchRequestConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub methods: BTreeSet<HttpMethod>,
    #[serde(default)]
    pub schemes: BTreeSet<Scheme>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchResponseConfig {
    #[serde(default)]
    pub status: BTreeSet<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_traffic: Option<bool>,
    #[serde(default)]
    pub headers: Vec<HeaderMatchConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeaderMatchConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub op: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CorrelateConfig {
    #[serde(default)]
    pub by: CorrelateBy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BypassConfig {
    #[serde(default)]
    pub name: BypassName,
    #[serde(default)]
    pub value: String,
}

/// Flat on-disk form of [`RateLimitSpec`].
///
/// Serde does not reject unknown keys on a struct with a flattened member, so
/// documents are read through this strict mirror instead.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SpecDocument {
    cis_id: String,
    domain_id: String,
    #[serde(default)]
    rule_id: Option<String>,
    threshold: u32,
    period: u32,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    disabled: bool,
    action: ActionConfig,
    #[serde(default, rename = "match")]
    matching: Option<MatchConfig>,
    #[serde(default)]
    correlate: Option<CorrelateConfig>,
    #[serde(default)]
    bypass: Option<Vec<BypassConfig>>,
}

impl From<SpecDocument> for RateLimitSpec {
    fn from(doc: SpecDocument) -> Self {
        Self {
            cis_id: doc.cis_id,
            domain_id: doc.domain_id,
            rule_id: doc.rule_id,
            rule: RuleConfig {
                threshold: doc.threshold,
                period: doc.period,
                description: doc.description,
                disabled: doc.disabled,
                action: doc.action,
                r#match: doc.matching,
                correlate: doc.correlate,
                bypass: doc.bypass,
            },
        }
    }
}

impl RateLimitSpec {
    /// Load a resource configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading rate limit resource configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load a resource configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| {
            AdapterError::Config(format!("Failed to parse rate limit resource: {}", e))
        })
    }

    /// Render as YAML, the format the CLI prints state in.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| AdapterError::Config(format!("Failed to render rate limit resource: {}", e)))
    }
}

/// Kind of value a schema field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Int,
    Bool,
    /// Ordered list of nested blocks
    List,
    /// Unordered set of scalars
    Set,
    /// A single nested block
    Block,
}

/// Whether a field must be set by the user, may be, or is filled by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    Required,
    Optional,
    Computed,
}

/// Description of one configuration field.
#[derive(Debug, Clone, Serialize)]
pub struct FieldSchema {
    pub name: &'static str,
    pub kind: FieldKind,
    pub presence: Presence,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<&'static str>,
    /// Allowed values of the field, or of the set's elements
    #[serde(skip_serializing_if = "no_values")]
    pub allowed: &'static [&'static str],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element: Option<FieldKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_items: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FieldSchema>,
}

impl FieldSchema {
    fn new(name: &'static str, kind: FieldKind, presence: Presence) -> Self {
        Self {
            name,
            kind,
            presence,
            default: None,
            allowed: &[],
            element: None,
            min_items: None,
            max_items: None,
            children: Vec::new(),
        }
    }

    fn required(name: &'static str, kind: FieldKind) -> Self {
        Self::new(name, kind, Presence::Required)
    }

    fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self::new(name, kind, Presence::Optional)
    }

    fn computed(name: &'static str, kind: FieldKind) -> Self {
        Self::new(name, kind, Presence::Computed)
    }

    fn default_value(mut self, value: &'static str) -> Self {
        self.default = Some(value);
        self
    }

    fn allowed(mut self, values: &'static [&'static str]) -> Self {
        self.allowed = values;
        self
    }

    fn set_of(mut self, element: FieldKind) -> Self {
        self.element = Some(element);
        self
    }

    fn items(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.min_items = min;
        self.max_items = max;
        self
    }

    fn children(mut self, children: Vec<FieldSchema>) -> Self {
        self.children = children;
        self
    }

    /// Look up a direct child by name.
    pub fn child(&self, name: &str) -> Option<&FieldSchema> {
        self.children.iter().find(|f| f.name == name)
    }
}

fn no_values(values: &&'static [&'static str]) -> bool {
    values.is_empty()
}

/// Schema of the whole resource.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceSchema {
    pub name: &'static str,
    pub fields: Vec<FieldSchema>,
}

impl ResourceSchema {
    /// Look up a top-level field by name.
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// The schema of the rate limit resource as exposed to the engine.
pub fn resource_schema() -> ResourceSchema {
    use FieldKind::*;

    let action = FieldSchema::required("action", Block)
        .items(Some(1), Some(1))
        .children(vec![
            FieldSchema::required("mode", String).allowed(ActionMode::NAMES),
            FieldSchema::optional("timeout", Int),
            FieldSchema::optional("response", Block)
                .items(None, Some(1))
                .children(vec![
                    FieldSchema::required("content_type", String).allowed(ContentType::NAMES),
                    FieldSchema::required("body", String),
                ]),
        ]);

    let match_request = FieldSchema::optional("request", Block)
        .items(Some(1), Some(1))
        .children(vec![
            FieldSchema::optional("methods", Set)
                .set_of(String)
                .allowed(HttpMethod::NAMES),
            FieldSchema::optional("schemes", Set)
                .set_of(String)
                .allowed(Scheme::NAMES),
            FieldSchema::optional("url", String),
        ]);

    let match_response = FieldSchema::optional("response", Block)
        .items(Some(1), Some(1))
        .children(vec![
            FieldSchema::optional("status", Set).set_of(Int),
            FieldSchema::optional("origin_traffic", Bool),
            FieldSchema::optional("headers", List).children(vec![
                FieldSchema::optional("name", String),
                FieldSchema::optional("op", String),
                FieldSchema::optional("value", String),
            ]),
        ]);

    ResourceSchema {
        name: "ibm_cis_rate_limit",
        fields: vec![
            FieldSchema::required("cis_id", String),
            FieldSchema::required("domain_id", String),
            FieldSchema::optional("disabled", Bool).default_value("false"),
            FieldSchema::optional("description", String),
            FieldSchema::optional("bypass", List).children(vec![
                FieldSchema::optional("name", String)
                    .default_value("url")
                    .allowed(BypassName::NAMES),
                FieldSchema::optional("value", String),
            ]),
            FieldSchema::required("threshold", Int),
            FieldSchema::required("period", Int),
            FieldSchema::optional("correlate", Block)
                .items(None, Some(1))
                .children(vec![FieldSchema::optional("by", String)
                    .default_value("nat")
                    .allowed(CorrelateBy::NAMES)]),
            action,
            FieldSchema::optional("match", Block)
                .items(None, Some(1))
                .children(vec![match_request, match_response]),
            FieldSchema::computed("rule_id", String),
        ],
    }
}
