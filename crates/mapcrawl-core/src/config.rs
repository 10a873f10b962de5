use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Radius 10 is already a 21×21 sweep (441 requests per search).
const MAX_GRID_RADIUS: u32 = 10;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so tests can drive it with a `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_positive_f64 = |var: &str, default: &str| -> Result<f64, ConfigError> {
        let value = or_default(var, default)
            .parse::<f64>()
            .map_err(|e| invalid(var, e.to_string()))?;
        if value.is_finite() && value > 0.0 {
            Ok(value)
        } else {
            Err(invalid(var, format!("must be a positive number, got {value}")))
        }
    };

    let storage_dir = PathBuf::from(require("MAPCRAWL_STORAGE_DIR")?);

    let env = parse_environment(&or_default("MAPCRAWL_ENV", "development"));
    let log_level = or_default("MAPCRAWL_LOG_LEVEL", "info");
    let index_key = or_default("MAPCRAWL_INDEX_KEY", "master_search.json");
    let results_prefix = or_default("MAPCRAWL_RESULTS_PREFIX", "projects/mapCrawler/data/result");
    let provider_base_url = or_default("MAPCRAWL_PROVIDER_BASE_URL", "https://www.google.com");

    let scraper_request_timeout_secs = parse_u64("MAPCRAWL_SCRAPER_REQUEST_TIMEOUT_SECS", "10")?;
    let scraper_tile_timeout_secs = parse_u64("MAPCRAWL_SCRAPER_TILE_TIMEOUT_SECS", "45")?;
    let scraper_user_agent = or_default("MAPCRAWL_SCRAPER_USER_AGENT", DEFAULT_USER_AGENT);
    let scraper_max_retries = parse_u32("MAPCRAWL_SCRAPER_MAX_RETRIES", "3")?;
    let scraper_retry_backoff_base_ms = parse_u64("MAPCRAWL_SCRAPER_RETRY_BACKOFF_BASE_MS", "500")?;
    let scraper_max_concurrent_tiles = parse_usize("MAPCRAWL_SCRAPER_MAX_CONCURRENT_TILES", "4")?;
    let scraper_zoom = parse_positive_f64("MAPCRAWL_SCRAPER_ZOOM", "14.0")?;

    let grid_delta_lat = parse_positive_f64("MAPCRAWL_GRID_DELTA_LAT", "0.022")?;
    let grid_radius = parse_u32("MAPCRAWL_GRID_RADIUS", "3")?;
    if grid_radius > MAX_GRID_RADIUS {
        return Err(invalid(
            "MAPCRAWL_GRID_RADIUS",
            format!("must be at most {MAX_GRID_RADIUS}, got {grid_radius}"),
        ));
    }

    Ok(AppConfig {
        env,
        log_level,
        storage_dir,
        index_key,
        results_prefix,
        provider_base_url,
        scraper_request_timeout_secs,
        scraper_tile_timeout_secs,
        scraper_user_agent,
        scraper_max_retries,
        scraper_retry_backoff_base_ms,
        scraper_max_concurrent_tiles,
        scraper_zoom,
        grid_delta_lat,
        grid_radius,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
