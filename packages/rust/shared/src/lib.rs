//! Shared types, error model, and configuration for lodebot.
//!
//! This crate is the foundation depended on by all other lodebot crates.
//! It provides:
//! - [`LodebotError`] — the unified error type, and [`FailureKind`] for replies
//! - Domain types ([`Character`], [`Job`], [`SearchCandidate`], [`RoleBucket`])
//! - Configuration ([`AppConfig`], [`LookupConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AnnouncementConfig, AppConfig, BotConfig, ClassOverride, LodestoneConfig, LookupConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from, resolve_api_key,
    validate_config,
};
pub use error::{FailureKind, LodebotError, Result};
pub use types::{
    ActiveJob, Character, CharacterId, GrandCompany, Job, RoleBucket, SearchCandidate,
};
