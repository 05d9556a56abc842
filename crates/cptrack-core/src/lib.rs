//! Domain types and pure logic shared across the cptrack workspace:
//! platform identifiers, rating normalization, series alignment and the
//! refresh cooldown. No I/O lives here.

use thiserror::Error;

pub mod app_config;
pub mod config;
pub mod cooldown;
pub mod normalize;
pub mod platform;
pub mod profile;
pub mod series;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use platform::{Platform, RatingBounds, Scope, UnknownPlatform};
pub use profile::{PlatformProfile, SolvedByDifficulty};
pub use series::{RatingPoint, SeriesPoint};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
