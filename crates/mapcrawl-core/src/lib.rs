//! Shared domain types and configuration for the map crawler.

mod app_config;
mod config;
pub mod places;
pub mod query;
pub mod rank;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use places::{Place, SearchIndexEntry};
pub use query::{normalize_term, parse_coordinates, CoordinateError};
pub use rank::{rank_places, RankBy};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
