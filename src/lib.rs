//! CIS Rate Limit - declarative resource adapter for edge rate limit rules
//!
//! This crate exposes a remote rate limit rule as a managed infrastructure
//! resource. It maps the declarative configuration into the service payload,
//! drives create/read/update/delete/exists/import against the service, and
//! maps the stored rule back so the calling engine can compute diffs.

pub mod api;
pub mod config;
pub mod error;
pub mod id;
pub mod resource;
