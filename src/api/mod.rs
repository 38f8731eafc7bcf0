//! Remote rate limit service: wire types, client trait and HTTP client.

mod client;
mod http;
pub mod model;

pub use client::{ApiError, RateLimitApi};
pub use http::HttpRateLimitClient;
pub use model::RateLimitRecord;
