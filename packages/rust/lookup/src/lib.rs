//! Upstream character lookup: rate limiting, HTTP client, and world catalog.
//!
//! This crate provides:
//! - [`RateLimiter`] — rolling one-second window shared by all outbound calls
//! - [`LookupClient`] — `search_character` and `fetch_character_by_id`
//! - [`canonical_world`] — validation against the fixed world list

mod client;
mod rate_limit;
mod wire;
mod worlds;

pub use client::LookupClient;
pub use rate_limit::RateLimiter;
pub use worlds::{WORLDS, canonical_world};
