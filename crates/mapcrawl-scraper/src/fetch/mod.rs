//! Tile fetching.
//!
//! [`TileFetcher`] is the seam between the crawl loop and the provider. The
//! production implementation, [`HttpTileFetcher`], requests the provider's
//! search page for one tile and splits it into [`RawEntry`] values; tests
//! substitute canned fetchers.

mod page;

use std::future::Future;
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::Client;
use tokio::time::Instant;

use crate::error::ScraperError;
use crate::extract::RawEntry;
use crate::grid::GridPoint;
use crate::rate_limit::retry_with_backoff;

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Fetches the raw result entries for one query tile.
///
/// An empty `Vec` means the tile genuinely has no results. Errors are for
/// failures the crawler should log and treat as an empty tile.
pub trait TileFetcher: Send + Sync {
    fn fetch(
        &self,
        term: &str,
        tile: GridPoint,
        zoom: f64,
    ) -> impl Future<Output = Result<Vec<RawEntry>, ScraperError>> + Send;
}

impl<T: TileFetcher + ?Sized> TileFetcher for &T {
    async fn fetch(
        &self,
        term: &str,
        tile: GridPoint,
        zoom: f64,
    ) -> Result<Vec<RawEntry>, ScraperError> {
        (**self).fetch(term, tile, zoom).await
    }
}

/// Provider search pages over HTTP.
///
/// Each attempt has `request_timeout_secs` to produce a body. If the deadline
/// passes while the body is streaming, whatever arrived is still parsed;
/// a deadline with no response at all is a [`ScraperError::Timeout`].
/// Transient failures are retried with jittered exponential back-off.
pub struct HttpTileFetcher {
    client: Client,
    base_url: String,
    request_timeout_secs: u64,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl HttpTileFetcher {
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidProviderUrl`] if `base_url` is not an
    /// absolute http(s) URL, or [`ScraperError::Http`] if the client cannot be
    /// built.
    pub fn new(
        base_url: &str,
        user_agent: &str,
        request_timeout_secs: u64,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, ScraperError> {
        let parsed = reqwest::Url::parse(base_url).map_err(|e| ScraperError::InvalidProviderUrl {
            url: base_url.to_owned(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ScraperError::InvalidProviderUrl {
                url: base_url.to_owned(),
                reason: format!("unsupported scheme {}", parsed.scheme()),
            });
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            request_timeout_secs,
            max_retries,
            backoff_base_ms,
        })
    }

    /// Search URL for one tile: `{base}/maps/search/{term}/@{lat},{lng},{zoom}z?hl=en`.
    ///
    /// Words of the term are percent-encoded individually and joined by `+`.
    #[must_use]
    pub fn search_url(&self, term: &str, tile: GridPoint, zoom: f64) -> String {
        let encoded = term
            .split_whitespace()
            .map(|word| utf8_percent_encode(word, NON_ALPHANUMERIC).to_string())
            .collect::<Vec<_>>()
            .join("+");
        format!(
            "{}/maps/search/{encoded}/@{:.7},{:.7},{zoom}z?hl=en",
            self.base_url, tile.lat, tile.lng
        )
    }

    async fn fetch_page(&self, url: &str) -> Result<String, ScraperError> {
        let deadline = Instant::now() + Duration::from_secs(self.request_timeout_secs);

        let Ok(sent) = tokio::time::timeout_at(deadline, self.client.get(url).send()).await else {
            return Err(ScraperError::Timeout {
                url: url.to_owned(),
                secs: self.request_timeout_secs,
            });
        };
        let mut response = sent?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ScraperError::RateLimited {
                url: url.to_owned(),
            });
        }
        if !status.is_success() {
            return Err(ScraperError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_owned(),
            });
        }

        let mut body: Vec<u8> = Vec::new();
        loop {
            match tokio::time::timeout_at(deadline, response.chunk()).await {
                Ok(Ok(Some(chunk))) => body.extend_from_slice(&chunk),
                Ok(Ok(None)) => break,
                Ok(Err(e)) => {
                    if body.is_empty() {
                        return Err(ScraperError::Http(e));
                    }
                    tracing::warn!(url, bytes = body.len(), error = %e, "body interrupted; parsing partial page");
                    break;
                }
                Err(_) => {
                    tracing::warn!(url, bytes = body.len(), "deadline reached mid-body; parsing partial page");
                    break;
                }
            }
        }
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

impl TileFetcher for HttpTileFetcher {
    async fn fetch(
        &self,
        term: &str,
        tile: GridPoint,
        zoom: f64,
    ) -> Result<Vec<RawEntry>, ScraperError> {
        let url = self.search_url(term, tile, zoom);
        let html = retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            self.fetch_page(&url)
        })
        .await?;

        let entries = page::split_entries(&html);
        tracing::debug!(
            lat = tile.lat,
            lng = tile.lng,
            entries = entries.len(),
            "fetched tile"
        );
        Ok(entries)
    }
}
