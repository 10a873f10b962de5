//! Integration tests for `SearchService`.
//!
//! A counting in-process fetcher stands in for the provider so tests can
//! assert exactly when the crawler runs. Storage is in memory unless a test
//! is about the filesystem store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use mapcrawl_cache::{
    CacheSettings, FsBlobStore, MemoryBlobStore, ScoreReference, SearchOptions, SearchService,
};
use mapcrawl_core::SearchIndexEntry;
use mapcrawl_scraper::{CrawlConfig, Crawler, GridPoint, RawEntry, ScraperError, TileFetcher};

const INDEX_KEY: &str = "master_search.json";

/// Returns two cafes next to whichever tile it is asked for.
#[derive(Default)]
struct CountingFetcher {
    calls: AtomicUsize,
    empty: bool,
    delay: Option<Duration>,
}

impl CountingFetcher {
    fn empty() -> Self {
        Self {
            empty: true,
            ..Self::default()
        }
    }

    /// Sleeps before answering so concurrent searches overlap.
    fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TileFetcher for CountingFetcher {
    async fn fetch(
        &self,
        _term: &str,
        tile: GridPoint,
        _zoom: f64,
    ) -> Result<Vec<RawEntry>, ScraperError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.empty {
            return Ok(Vec::new());
        }
        let card = |name: &str, text: &str, dlat: f64| RawEntry {
            label: Some(name.to_owned()),
            href: Some(format!(
                "https://www.google.com/maps/place/x/data=!3d{}!4d{}",
                tile.lat + dlat,
                tile.lng
            )),
            text: text.to_owned(),
            ..RawEntry::default()
        };
        Ok(vec![
            card(&format!("Cafe North {:.2}", tile.lat), "4.6(820) · ₹600", 0.001),
            card(&format!("Cafe South {:.2}", tile.lat), "4.1(95) · ₹300", -0.001),
        ])
    }
}

fn crawl_config() -> CrawlConfig {
    CrawlConfig {
        lat_step: 0.022,
        radius: 0,
        zoom: 14.0,
        max_concurrent_tiles: 2,
        tile_timeout: Duration::from_secs(5),
    }
}

fn settings() -> CacheSettings {
    CacheSettings {
        index_key: INDEX_KEY.to_owned(),
        results_prefix: "results".to_owned(),
        lat_tolerance: 0.022,
    }
}

async fn service<'a>(
    fetcher: &'a CountingFetcher,
    store: &'a MemoryBlobStore,
) -> SearchService<&'a CountingFetcher, &'a MemoryBlobStore> {
    SearchService::open(Crawler::new(fetcher, crawl_config()), store, settings()).await
}

fn seed_index(store: &MemoryBlobStore, key: &str) {
    let entries = vec![SearchIndexEntry {
        search_term: "coffee".to_owned(),
        latitude: 12.97,
        longitude: 77.59,
        timestamp: 1_700_000_000.0,
        key: key.to_owned(),
    }];
    store.insert(INDEX_KEY, serde_json::to_vec(&entries).unwrap());
}

#[tokio::test]
async fn second_search_nearby_is_served_from_cache() {
    let fetcher = CountingFetcher::default();
    let store = MemoryBlobStore::new();
    let svc = service(&fetcher, &store).await;

    let first = svc
        .search("Coffee", 12.97, 77.59, SearchOptions::default())
        .await;
    assert!(!first.served_from_cache);
    assert_eq!(first.places.len(), 2);
    assert_eq!(fetcher.calls(), 1);

    let second = svc
        .search("  coffee ", 12.975, 77.595, SearchOptions::default())
        .await;
    assert!(second.served_from_cache);
    assert_eq!(fetcher.calls(), 1, "cache hit must not crawl");
    let names = |places: &[mapcrawl_core::Place]| {
        places.iter().map(|p| p.description.clone()).collect::<Vec<_>>()
    };
    assert_eq!(names(&second.places), names(&first.places));

    let keys = store.keys();
    assert!(keys.contains(&INDEX_KEY.to_owned()));
    assert!(keys
        .iter()
        .any(|k| k.starts_with("results/") && k.ends_with(".json")));
}

#[tokio::test]
async fn index_survives_service_restart() {
    let fetcher = CountingFetcher::default();
    let store = MemoryBlobStore::new();

    service(&fetcher, &store)
        .await
        .search("coffee", 12.97, 77.59, SearchOptions::default())
        .await;

    let reopened = service(&fetcher, &store).await;
    assert_eq!(reopened.index_snapshot().await.len(), 1);
    let outcome = reopened
        .search("coffee", 12.97, 77.59, SearchOptions::default())
        .await;
    assert!(outcome.served_from_cache);
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn force_refresh_always_crawls() {
    let fetcher = CountingFetcher::default();
    let store = MemoryBlobStore::new();
    let svc = service(&fetcher, &store).await;

    svc.search("coffee", 12.97, 77.59, SearchOptions::default())
        .await;
    let refreshed = svc
        .search(
            "coffee",
            12.97,
            77.59,
            SearchOptions {
                force_refresh: true,
                ..SearchOptions::default()
            },
        )
        .await;

    assert!(!refreshed.served_from_cache);
    assert_eq!(fetcher.calls(), 2);
    assert_eq!(svc.index_snapshot().await.len(), 2);
}

#[tokio::test]
async fn concurrent_searches_in_one_bucket_share_a_crawl() {
    let fetcher = CountingFetcher::slow(Duration::from_millis(50));
    let store = MemoryBlobStore::new();
    let svc = service(&fetcher, &store).await;

    let (a, b) = tokio::join!(
        svc.search("coffee", 12.97, 77.59, SearchOptions::default()),
        svc.search("Coffee", 12.971, 77.591, SearchOptions::default()),
    );

    assert_eq!(fetcher.calls(), 1, "second caller must wait, not crawl");
    assert_eq!(svc.index_snapshot().await.len(), 1);
    assert!(
        a.served_from_cache != b.served_from_cache,
        "exactly one caller crawls, the other is served from cache"
    );
    assert_eq!(a.places.len(), 2);
    assert_eq!(b.places.len(), 2);
}

#[tokio::test]
async fn concurrent_crawls_for_different_terms_both_reach_the_index() {
    let fetcher = CountingFetcher::slow(Duration::from_millis(50));
    let store = MemoryBlobStore::new();
    let svc = service(&fetcher, &store).await;

    let (coffee, tea) = tokio::join!(
        svc.search("coffee", 12.97, 77.59, SearchOptions::default()),
        svc.search("tea", 12.97, 77.59, SearchOptions::default()),
    );

    assert!(!coffee.served_from_cache);
    assert!(!tea.served_from_cache);
    assert_eq!(fetcher.calls(), 2);
    assert_eq!(svc.index_snapshot().await.len(), 2);

    let persisted: Vec<SearchIndexEntry> =
        serde_json::from_slice(&store.get(INDEX_KEY).expect("index persisted")).unwrap();
    let mut terms: Vec<_> = persisted.iter().map(|e| e.search_term.as_str()).collect();
    terms.sort_unstable();
    assert_eq!(terms, ["coffee", "tea"]);
}

#[tokio::test]
async fn far_away_or_different_term_misses_cache() {
    let fetcher = CountingFetcher::default();
    let store = MemoryBlobStore::new();
    let svc = service(&fetcher, &store).await;

    svc.search("coffee", 12.97, 77.59, SearchOptions::default())
        .await;
    let far = svc
        .search("coffee", 13.10, 77.59, SearchOptions::default())
        .await;
    let other = svc
        .search("tea", 12.97, 77.59, SearchOptions::default())
        .await;

    assert!(!far.served_from_cache);
    assert!(!other.served_from_cache);
    assert_eq!(fetcher.calls(), 3);
}

#[tokio::test]
async fn corrupt_cached_set_falls_back_to_crawl() {
    let fetcher = CountingFetcher::default();
    let store = MemoryBlobStore::new();
    seed_index(&store, "broken");
    store.insert("results/broken.json", b"{not json".to_vec());
    let svc = service(&fetcher, &store).await;

    let outcome = svc
        .search("coffee", 12.97, 77.59, SearchOptions::default())
        .await;

    assert!(!outcome.served_from_cache);
    assert_eq!(outcome.places.len(), 2);
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn missing_or_incomplete_cached_set_falls_back_to_crawl() {
    for blob in [
        None,
        Some(b"[]".to_vec()),
        Some(br#"[{"description":"","rating":4.0,"raters":10,"latitude":12.97,"longitude":77.59}]"#.to_vec()),
        Some(br#"[{"description":"No coords","rating":4.0,"raters":10}]"#.to_vec()),
    ] {
        let fetcher = CountingFetcher::default();
        let store = MemoryBlobStore::new();
        seed_index(&store, "stale");
        if let Some(bytes) = blob {
            store.insert("results/stale.json", bytes);
        }
        let svc = service(&fetcher, &store).await;

        let outcome = svc
            .search("coffee", 12.97, 77.59, SearchOptions::default())
            .await;

        assert!(!outcome.served_from_cache);
        assert_eq!(fetcher.calls(), 1);
    }
}

#[tokio::test]
async fn valid_seeded_set_is_served_without_crawling() {
    let fetcher = CountingFetcher::default();
    let store = MemoryBlobStore::new();
    seed_index(&store, "good");
    store.insert(
        "results/good.json",
        br#"[{"description":"Legacy Cafe","rating":4.4,"raters":250,"latitude":12.97,"longitude":77.59,"price":1.0}]"#.to_vec(),
    );
    let svc = service(&fetcher, &store).await;

    let outcome = svc
        .search("coffee", 12.97, 77.59, SearchOptions::default())
        .await;

    assert!(outcome.served_from_cache);
    assert_eq!(outcome.places[0].description, "Legacy Cafe");
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn write_failure_still_returns_results() {
    let fetcher = CountingFetcher::default();
    let store = MemoryBlobStore::new();
    store.set_fail_writes(true);
    let svc = service(&fetcher, &store).await;

    let outcome = svc
        .search("coffee", 12.97, 77.59, SearchOptions::default())
        .await;

    assert!(!outcome.served_from_cache);
    assert_eq!(outcome.places.len(), 2);
    assert!(store.keys().is_empty());
    assert!(svc.index_snapshot().await.is_empty());

    // Still usable afterwards.
    store.set_fail_writes(false);
    let retry = svc
        .search("coffee", 12.97, 77.59, SearchOptions::default())
        .await;
    assert_eq!(retry.places.len(), 2);
    assert_eq!(svc.index_snapshot().await.len(), 1);
}

#[tokio::test]
async fn empty_crawl_is_not_cached() {
    let fetcher = CountingFetcher::empty();
    let store = MemoryBlobStore::new();
    let svc = service(&fetcher, &store).await;

    let outcome = svc
        .search("nothing", 12.97, 77.59, SearchOptions::default())
        .await;

    assert!(outcome.places.is_empty());
    assert!(!outcome.served_from_cache);
    assert!(store.keys().is_empty());
}

#[tokio::test]
async fn unreadable_index_starts_empty() {
    let fetcher = CountingFetcher::default();
    let store = MemoryBlobStore::new();
    store.insert(INDEX_KEY, b"garbage".to_vec());
    let svc = service(&fetcher, &store).await;

    assert!(svc.index_snapshot().await.is_empty());
    let outcome = svc
        .search("coffee", 12.97, 77.59, SearchOptions::default())
        .await;
    assert_eq!(outcome.places.len(), 2);
}

#[tokio::test]
async fn search_many_combines_centers_and_reports_all_cached() {
    let fetcher = CountingFetcher::default();
    let store = MemoryBlobStore::new();
    let svc = service(&fetcher, &store).await;
    let centers = [(28.61, 77.20), (19.07, 72.87)];

    let first = svc
        .search_many("biryani", &centers, ScoreReference::PerCenter, SearchOptions::default())
        .await;
    assert!(!first.served_from_cache);
    assert_eq!(first.places.len(), 4);
    assert!(first.places.iter().all(|p| p.dist < 1.0));

    let second = svc
        .search_many("biryani", &centers, ScoreReference::PerCenter, SearchOptions::default())
        .await;
    assert!(second.served_from_cache);
    assert_eq!(fetcher.calls(), 2);

    // One new center makes the aggregate a partial hit.
    let third = svc
        .search_many(
            "biryani",
            &[(28.61, 77.20), (12.97, 77.59)],
            ScoreReference::PerCenter,
            SearchOptions::default(),
        )
        .await;
    assert!(!third.served_from_cache);
}

#[tokio::test]
async fn search_many_global_reference_measures_from_one_point() {
    let fetcher = CountingFetcher::default();
    let store = MemoryBlobStore::new();
    let svc = service(&fetcher, &store).await;

    let outcome = svc
        .search_many(
            "biryani",
            &[(28.61, 77.20), (19.07, 72.87)],
            ScoreReference::Global {
                lat: 28.61,
                lng: 77.20,
            },
            SearchOptions::default(),
        )
        .await;

    let far = outcome
        .places
        .iter()
        .filter(|p| p.dist > 1000.0)
        .count();
    assert_eq!(far, 2, "Mumbai places are over 1000 km from Delhi");
}

#[tokio::test]
async fn search_many_progress_is_monotonic() {
    let fetcher = CountingFetcher::default();
    let store = MemoryBlobStore::new();
    let svc = service(&fetcher, &store).await;
    let seen = std::sync::Mutex::new(Vec::new());
    let record: mapcrawl_scraper::ProgressFn<'_> = &|p| seen.lock().unwrap().push(p);

    svc.search_many(
        "biryani",
        &[(28.61, 77.20), (19.07, 72.87)],
        ScoreReference::PerCenter,
        SearchOptions {
            progress: Some(record),
            ..SearchOptions::default()
        },
    )
    .await;

    let seen = seen.into_inner().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    assert!((seen[1] - 1.0).abs() < 1e-12);
}

#[tokio::test]
async fn filesystem_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = CountingFetcher::default();

    let svc = SearchService::open(
        Crawler::new(&fetcher, crawl_config()),
        FsBlobStore::new(dir.path()),
        settings(),
    )
    .await;
    svc.search("coffee", 12.97, 77.59, SearchOptions::default())
        .await;
    assert!(dir.path().join(INDEX_KEY).exists());

    let reopened = SearchService::open(
        Crawler::new(&fetcher, crawl_config()),
        FsBlobStore::new(dir.path()),
        settings(),
    )
    .await;
    let outcome = reopened
        .search("coffee", 12.97, 77.59, SearchOptions::default())
        .await;
    assert!(outcome.served_from_cache);
    assert_eq!(fetcher.calls(), 1);
}
