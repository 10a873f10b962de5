//! Cache-first search over the crawler.
//!
//! Nothing here returns an error to the caller. Storage problems on read fall
//! back to a fresh crawl; problems on write are logged and the fresh results
//! are returned anyway.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use mapcrawl_core::{normalize_term, AppConfig, Place, SearchIndexEntry};
use mapcrawl_scraper::{
    score_groups, CancelFlag, Crawler, DefaultNameResolver, NameResolver, ProgressFn, TileFetcher,
};
use tokio::sync::{watch, RwLock};
use uuid::Uuid;

use crate::index::{within_tolerance, SearchIndex};
use crate::store::BlobStore;
use crate::StorageError;

#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Key of the persisted search index.
    pub index_key: String,
    /// Result sets live at `{results_prefix}/{key}.json`.
    pub results_prefix: String,
    /// Latitude tolerance in degrees for a cache hit.
    pub lat_tolerance: f64,
}

impl CacheSettings {
    /// Uses the grid step as the latitude tolerance.
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            index_key: config.index_key.clone(),
            results_prefix: config.results_prefix.clone(),
            lat_tolerance: config.grid_delta_lat,
        }
    }
}

/// Per-call knobs for [`SearchService::search`].
#[derive(Clone, Copy, Default)]
pub struct SearchOptions<'a> {
    /// Skip the cache lookup and always crawl.
    pub force_refresh: bool,
    pub progress: Option<ProgressFn<'a>>,
    pub cancel: Option<&'a CancelFlag>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub places: Vec<Place>,
    pub served_from_cache: bool,
}

/// Distance reference when several centers are scored together.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ScoreReference {
    /// Each center's places are measured from that center.
    #[default]
    PerCenter,
    /// Every place is measured from one point.
    Global { lat: f64, lng: f64 },
}

pub struct SearchService<F, S, R = DefaultNameResolver> {
    crawler: Crawler<F, R>,
    store: S,
    settings: CacheSettings,
    /// The write lock is held from append through persist.
    index: RwLock<SearchIndex>,
    /// Buckets currently being crawled; at most one claim per bucket.
    in_flight: Mutex<Vec<InFlightCrawl>>,
    next_claim: AtomicU64,
}

struct InFlightCrawl {
    id: u64,
    term: String,
    lat: f64,
    lng: f64,
    /// Resolves once the claiming crawl has finished and persisted.
    done: watch::Receiver<()>,
}

/// Held by the one caller crawling a bucket. Dropping it releases the bucket
/// and wakes every caller waiting on it.
struct CrawlClaim<'a> {
    in_flight: &'a Mutex<Vec<InFlightCrawl>>,
    id: u64,
    _done: watch::Sender<()>,
}

impl Drop for CrawlClaim<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|c| c.id != self.id);
    }
}

enum Gate<'a> {
    Claimed(CrawlClaim<'a>),
    Wait(watch::Receiver<()>),
}

impl<F, S, R> SearchService<F, S, R>
where
    F: TileFetcher,
    S: BlobStore,
    R: NameResolver,
{
    /// Builds the service, loading the persisted index once.
    ///
    /// A missing or unreadable index starts the service with an empty one.
    pub async fn open(crawler: Crawler<F, R>, store: S, settings: CacheSettings) -> Self {
        let index = match store.load(&settings.index_key).await {
            Ok(bytes) => SearchIndex::from_json(&bytes).unwrap_or_else(|e| {
                tracing::warn!(
                    key = %settings.index_key,
                    error = %e,
                    "search index unreadable; starting with an empty index"
                );
                SearchIndex::new()
            }),
            Err(StorageError::NotFound(_)) => {
                tracing::info!(key = %settings.index_key, "no search index yet");
                SearchIndex::new()
            }
            Err(e) => {
                tracing::warn!(
                    key = %settings.index_key,
                    error = %e,
                    "failed to load search index; starting with an empty index"
                );
                SearchIndex::new()
            }
        };
        tracing::info!(entries = index.len(), "search index ready");

        Self {
            crawler,
            store,
            settings,
            index: RwLock::new(index),
            in_flight: Mutex::new(Vec::new()),
            next_claim: AtomicU64::new(0),
        }
    }

    /// Snapshot of the in-memory index.
    pub async fn index_snapshot(&self) -> SearchIndex {
        self.index.read().await.clone()
    }

    /// Results for `term` near `(lat, lng)`, from cache when possible.
    ///
    /// An empty result is a normal outcome; it is never cached. Concurrent
    /// callers for the same bucket share one crawl: the first crawls, the
    /// rest wait for it and are then served from cache. A forced refresh
    /// bypasses both the cache and the wait.
    pub async fn search(
        &self,
        term: &str,
        lat: f64,
        lng: f64,
        opts: SearchOptions<'_>,
    ) -> SearchOutcome {
        let term = normalize_term(term);

        let _claim = if opts.force_refresh {
            tracing::debug!(term = %term, "forced refresh; skipping cache");
            None
        } else {
            // Claim before looking up: a finished crawl persists before it
            // releases its claim, so the lookup below always sees it.
            loop {
                match self.claim_or_wait(&term, lat, lng) {
                    Gate::Claimed(claim) => {
                        if let Some(places) = self.lookup_cached(&term, lat, lng).await {
                            if let Some(progress) = opts.progress {
                                progress(1.0);
                            }
                            return SearchOutcome {
                                places,
                                served_from_cache: true,
                            };
                        }
                        break Some(claim);
                    }
                    Gate::Wait(mut done) => {
                        tracing::debug!(term = %term, "same search already crawling; waiting");
                        // Errors once the claim is dropped, which is the signal.
                        let _ = done.changed().await;
                    }
                }
            }
        };

        let report = self
            .crawler
            .crawl(&term, lat, lng, opts.progress, opts.cancel)
            .await;
        if !report.cancelled && !report.places.is_empty() {
            self.persist(&term, lat, lng, &report.places).await;
        }
        SearchOutcome {
            places: report.places,
            served_from_cache: false,
        }
    }

    /// Runs [`Self::search`] once per center and scores the union as one set.
    ///
    /// `served_from_cache` is true only when every center was a cache hit.
    /// Progress advances in equal slices per center.
    pub async fn search_many(
        &self,
        term: &str,
        centers: &[(f64, f64)],
        reference: ScoreReference,
        opts: SearchOptions<'_>,
    ) -> SearchOutcome {
        let total = centers.len();
        let mut groups: Vec<(Vec<Place>, (f64, f64))> = Vec::with_capacity(total);
        let mut all_cached = total > 0;

        for (done, &(lat, lng)) in centers.iter().enumerate() {
            let scaled;
            let progress: Option<ProgressFn<'_>> = match opts.progress {
                Some(outer) => {
                    scaled = move |fraction: f64| outer(overall_fraction(done, total, fraction));
                    Some(&scaled)
                }
                None => None,
            };
            let outcome = self
                .search(
                    term,
                    lat,
                    lng,
                    SearchOptions {
                        progress,
                        ..opts
                    },
                )
                .await;

            all_cached &= outcome.served_from_cache;
            if !outcome.places.is_empty() {
                let center = match reference {
                    ScoreReference::PerCenter => (lat, lng),
                    ScoreReference::Global { lat: ref_lat, lng: ref_lng } => (ref_lat, ref_lng),
                };
                groups.push((outcome.places, center));
            }
        }

        if opts.cancel.is_some_and(CancelFlag::is_cancelled) {
            return SearchOutcome {
                places: Vec::new(),
                served_from_cache: false,
            };
        }

        SearchOutcome {
            places: score_groups(groups),
            served_from_cache: all_cached,
        }
    }

    fn claim_or_wait(&self, term: &str, lat: f64, lng: f64) -> Gate<'_> {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(running) = in_flight.iter().find(|c| {
            c.term == term && within_tolerance(c.lat, c.lng, lat, lng, self.settings.lat_tolerance)
        }) {
            return Gate::Wait(running.done.clone());
        }

        let id = self.next_claim.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = watch::channel(());
        in_flight.push(InFlightCrawl {
            id,
            term: term.to_owned(),
            lat,
            lng,
            done: rx,
        });
        Gate::Claimed(CrawlClaim {
            in_flight: &self.in_flight,
            id,
            _done: tx,
        })
    }

    async fn lookup_cached(&self, term: &str, lat: f64, lng: f64) -> Option<Vec<Place>> {
        let key = {
            let index = self.index.read().await;
            index
                .find_first(term, lat, lng, self.settings.lat_tolerance)?
                .key
                .clone()
        };

        let bytes = match self.store.load(&self.result_key(&key)).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cached result set unavailable; crawling fresh");
                return None;
            }
        };
        match serde_json::from_slice::<Vec<Place>>(&bytes) {
            Ok(places) if is_complete(&places) => {
                tracing::info!(term, key = %key, places = places.len(), "served from cache");
                Some(places)
            }
            Ok(_) => {
                tracing::warn!(key = %key, "cached result set incomplete; crawling fresh");
                None
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cached result set corrupt; crawling fresh");
                None
            }
        }
    }

    async fn persist(&self, term: &str, lat: f64, lng: f64, places: &[Place]) {
        let key = Uuid::new_v4().simple().to_string();
        let bytes = match serde_json::to_vec(places) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode result set; not caching");
                return;
            }
        };
        if let Err(e) = self.store.store(&self.result_key(&key), bytes, true).await {
            tracing::error!(key = %key, error = %e, "failed to store result set; not caching");
            return;
        }

        let mut index = self.index.write().await;
        index.push(SearchIndexEntry {
            search_term: term.to_owned(),
            latitude: lat,
            longitude: lng,
            timestamp: now_secs(),
            key: key.clone(),
        });
        let persisted = match index.to_json() {
            Ok(bytes) => self.store.store(&self.settings.index_key, bytes, true).await,
            Err(e) => Err(e),
        };
        match persisted {
            Ok(()) => tracing::info!(term, key = %key, entries = index.len(), "cached result set"),
            Err(e) => tracing::error!(key = %key, error = %e, "failed to persist search index"),
        }
    }

    fn result_key(&self, key: &str) -> String {
        let prefix = self.settings.results_prefix.trim_end_matches('/');
        if prefix.is_empty() {
            format!("{key}.json")
        } else {
            format!("{prefix}/{key}.json")
        }
    }
}

/// A stored set is only reusable if it has at least one named place.
fn is_complete(places: &[Place]) -> bool {
    !places.is_empty() && places.iter().all(|p| !p.description.trim().is_empty())
}

#[allow(clippy::cast_precision_loss)]
fn overall_fraction(done: usize, total: usize, within: f64) -> f64 {
    (done as f64 + within) / total as f64
}

#[allow(clippy::cast_precision_loss)]
fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}
