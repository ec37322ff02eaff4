use thiserror::Error;

mod app_config;
mod config;
pub mod rank;
mod types;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use rank::{ImpactPolicy, RankTransition};
pub use types::{Impact, Priority, RankStatus};

/// Position value meaning "not ranked anywhere in the scanned results".
pub const UNRANKED: i32 = 0;

/// Deepest result position the extractor scans.
pub const MAX_SCAN_DEPTH: usize = 100;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
