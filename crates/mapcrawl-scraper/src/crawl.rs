//! Crawl orchestration: grid → tile fetches → extraction → scoring.
//!
//! Tiles are fetched concurrently up to `max_concurrent_tiles` but consumed
//! in grid order. A tile that errors or times out counts as failed and
//! contributes nothing; it never fails the crawl.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use mapcrawl_core::{normalize_term, AppConfig, Place};

use crate::extract::{DefaultNameResolver, NameResolver, PlaceExtractor, RawEntry};
use crate::fetch::TileFetcher;
use crate::grid::{generate_grid, lng_step_for, GridPoint};
use crate::score::score;

/// Progress callback, invoked with the completed fraction in `(0, 1]`.
pub type ProgressFn<'a> = &'a (dyn Fn(f64) + Send + Sync);

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Grid spacing in degrees of latitude.
    pub lat_step: f64,
    pub radius: u32,
    pub zoom: f64,
    pub max_concurrent_tiles: usize,
    /// Budget for one tile, retries included.
    pub tile_timeout: Duration,
}

impl CrawlConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            lat_step: config.grid_delta_lat,
            radius: config.grid_radius,
            zoom: config.scraper_zoom,
            max_concurrent_tiles: config.scraper_max_concurrent_tiles.max(1),
            tile_timeout: Duration::from_secs(config.scraper_tile_timeout_secs),
        }
    }
}

/// Shared cancellation signal, checked before each tile starts.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of one crawl. `places` is scored but unsorted.
#[derive(Debug, Clone, Default)]
pub struct CrawlReport {
    pub places: Vec<Place>,
    pub tiles_total: usize,
    pub tiles_failed: usize,
    pub tiles_empty: usize,
    /// Set when the crawl was cancelled; `places` is then always empty.
    pub cancelled: bool,
}

enum TileOutcome {
    Fetched(Vec<RawEntry>),
    Failed,
    Skipped,
}

pub struct Crawler<F, R = DefaultNameResolver> {
    fetcher: F,
    extractor: PlaceExtractor<R>,
    config: CrawlConfig,
}

impl<F: TileFetcher> Crawler<F> {
    #[must_use]
    pub fn new(fetcher: F, config: CrawlConfig) -> Self {
        Self {
            fetcher,
            extractor: PlaceExtractor::new(),
            config,
        }
    }
}

impl<F: TileFetcher, R: NameResolver> Crawler<F, R> {
    #[must_use]
    pub fn with_extractor(fetcher: F, extractor: PlaceExtractor<R>, config: CrawlConfig) -> Self {
        Self {
            fetcher,
            extractor,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    /// Crawls the grid around `(center_lat, center_lng)` for `term`.
    ///
    /// Every place is scored against the query center, never a tile center.
    /// Zero places is a normal outcome and yields an empty report.
    pub async fn crawl(
        &self,
        term: &str,
        center_lat: f64,
        center_lng: f64,
        progress: Option<ProgressFn<'_>>,
        cancel: Option<&CancelFlag>,
    ) -> CrawlReport {
        let term = normalize_term(term);
        let lng_step = lng_step_for(self.config.lat_step, center_lat);
        let tiles = generate_grid(
            center_lat,
            center_lng,
            self.config.lat_step,
            lng_step,
            self.config.radius,
        );
        let tiles_total = tiles.len();
        let is_cancelled = || cancel.is_some_and(CancelFlag::is_cancelled);

        tracing::info!(
            term = %term,
            center_lat,
            center_lng,
            tiles = tiles_total,
            "starting crawl"
        );

        let mut report = CrawlReport {
            tiles_total,
            ..CrawlReport::default()
        };
        let mut working: Vec<Place> = Vec::new();
        let mut completed = 0usize;

        let mut outcomes = stream::iter(tiles)
            .map(|tile| {
                let term = term.as_str();
                async move {
                    if is_cancelled() {
                        return (tile, TileOutcome::Skipped);
                    }
                    (tile, self.fetch_tile(term, tile).await)
                }
            })
            .buffered(self.config.max_concurrent_tiles.max(1));

        while let Some((tile, outcome)) = outcomes.next().await {
            match outcome {
                TileOutcome::Fetched(entries) => {
                    if entries.is_empty() {
                        report.tiles_empty += 1;
                    }
                    working.extend(
                        entries
                            .iter()
                            .filter_map(|entry| self.extractor.extract(entry, tile.lat, tile.lng)),
                    );
                }
                TileOutcome::Failed => report.tiles_failed += 1,
                TileOutcome::Skipped => {}
            }
            completed += 1;
            if let Some(progress) = progress {
                #[allow(clippy::cast_precision_loss)]
                let fraction = completed as f64 / tiles_total as f64;
                progress(fraction);
            }
        }

        if is_cancelled() {
            tracing::info!(term = %term, completed, "crawl cancelled; discarding partial results");
            report.cancelled = true;
            return report;
        }

        let extracted = working.len();
        report.places = score(working, center_lat, center_lng);
        tracing::info!(
            term = %term,
            tiles = tiles_total,
            failed = report.tiles_failed,
            empty = report.tiles_empty,
            extracted,
            places = report.places.len(),
            "crawl complete"
        );
        report
    }

    async fn fetch_tile(&self, term: &str, tile: GridPoint) -> TileOutcome {
        let fetch = self.fetcher.fetch(term, tile, self.config.zoom);
        match tokio::time::timeout(self.config.tile_timeout, fetch).await {
            Ok(Ok(entries)) => TileOutcome::Fetched(entries),
            Ok(Err(e)) => {
                tracing::warn!(lat = tile.lat, lng = tile.lng, error = %e, "tile failed; treating as empty");
                TileOutcome::Failed
            }
            Err(_) => {
                tracing::warn!(
                    lat = tile.lat,
                    lng = tile.lng,
                    timeout_secs = self.config.tile_timeout.as_secs_f64(),
                    "tile timed out; treating as empty"
                );
                TileOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
#[path = "crawl_test.rs"]
mod tests;
