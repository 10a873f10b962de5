use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("timed out after {secs}s fetching {url}")]
    Timeout { url: String, secs: u64 },

    #[error("rate limited by provider at {url}")]
    RateLimited { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("invalid provider URL \"{url}\": {reason}")]
    InvalidProviderUrl { url: String, reason: String },
}
