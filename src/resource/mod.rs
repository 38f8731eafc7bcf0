//! The rate limit resource: configuration model, expand/flatten mapping and
//! lifecycle operations.

pub mod expand;
pub mod flatten;
mod lifecycle;
pub mod schema;
mod state;

pub use lifecycle::RateLimitResource;
pub use schema::{resource_schema, RateLimitSpec, ResourceSchema, RuleConfig};
pub use state::{ResourceData, TrackedField};
