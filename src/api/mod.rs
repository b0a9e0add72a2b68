//! Upstream API access
//!
//! This module contains everything that talks to the marketplace:
//! - A retrying JSON client with linear backoff
//! - The endpoint catalog with per-endpoint header profiles

mod client;
mod marketplace;
mod retry;

pub use client::{build_http_client, AttemptError, JsonFetcher, RetryingHttpClient, TransportError};
pub use marketplace::{HeaderProfile, MarketplaceApi};
pub use retry::RetryPolicy;
