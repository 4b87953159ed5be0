//! Configuration module for the Houndify sample client.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for each screen,
//! `AppPaths` for cross-platform data directories, and TOML persistence via
//! `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AppConfig, BackendConfig, LocationConfig, PlaybackConfig, SearchConfig, VoiceResponseConfig,
};
