//! Configuration for the merge bot
//!
//! This crate provides:
//! - Configuration file loading (TOML)
//! - Bot configuration (BotConfig): feature flags, minimum-LGTM count,
//!   size thresholds, draft command allowlist, secret masks

pub mod bot_config;
pub mod config_file;

pub use bot_config::{BotConfig, Features, SizeThreshold};
pub use config_file::load_config_file;
