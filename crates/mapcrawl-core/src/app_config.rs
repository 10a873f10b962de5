use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    /// Root directory of the blob store holding the index and result sets.
    pub storage_dir: PathBuf,
    /// Well-known key of the persisted search index.
    pub index_key: String,
    /// Key prefix for result-set blobs: `{results_prefix}/{key}.json`.
    pub results_prefix: String,
    pub provider_base_url: String,
    pub scraper_request_timeout_secs: u64,
    /// Upper bound on one tile's fetch, retries included.
    pub scraper_tile_timeout_secs: u64,
    pub scraper_user_agent: String,
    pub scraper_max_retries: u32,
    pub scraper_retry_backoff_base_ms: u64,
    pub scraper_max_concurrent_tiles: usize,
    pub scraper_zoom: f64,
    /// Latitude step between grid tiles, in degrees. Doubles as the cache
    /// latitude tolerance.
    pub grid_delta_lat: f64,
    /// Tiles extend this many steps from the center in each direction.
    pub grid_radius: u32,
}
