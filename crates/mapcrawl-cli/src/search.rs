//! Search command handlers.
//!
//! The service never fails a search; the only errors surfaced here come from
//! building the fetcher or writing output.

use std::io::Write;

use mapcrawl_cache::{
    CacheSettings, FsBlobStore, ScoreReference, SearchOptions, SearchOutcome, SearchService,
};
use mapcrawl_core::{rank_places, AppConfig, Place, RankBy};
use mapcrawl_scraper::{CancelFlag, CrawlConfig, Crawler, HttpTileFetcher};

use crate::OutputArgs;

const NAME_WIDTH: usize = 40;

type Service = SearchService<HttpTileFetcher, FsBlobStore>;

async fn build_service(config: &AppConfig) -> anyhow::Result<Service> {
    let fetcher = HttpTileFetcher::new(
        &config.provider_base_url,
        &config.scraper_user_agent,
        config.scraper_request_timeout_secs,
        config.scraper_max_retries,
        config.scraper_retry_backoff_base_ms,
    )
    .map_err(|e| anyhow::anyhow!("failed to build tile fetcher: {e}"))?;

    let crawler = Crawler::new(fetcher, CrawlConfig::from_app_config(config));
    let store = FsBlobStore::new(&config.storage_dir);
    Ok(SearchService::open(crawler, store, CacheSettings::from_app_config(config)).await)
}

/// Sets the returned flag on the first Ctrl-C.
fn cancel_on_ctrl_c() -> CancelFlag {
    let cancel = CancelFlag::new();
    let flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; stopping after in-flight tiles");
            flag.cancel();
        }
    });
    cancel
}

fn report_progress(fraction: f64) {
    eprint!("\rcrawling... {:>3.0}%", (fraction * 100.0).clamp(0.0, 100.0));
    if fraction >= 1.0 {
        eprintln!();
    }
}

/// Search a single center and print the ranked results.
///
/// # Errors
///
/// Returns an error if the tile fetcher cannot be built or output cannot be
/// written.
pub(crate) async fn run_search(
    config: &AppConfig,
    term: &str,
    (lat, lng): (f64, f64),
    output: &OutputArgs,
) -> anyhow::Result<()> {
    let service = build_service(config).await?;
    let cancel = cancel_on_ctrl_c();
    let opts = SearchOptions {
        force_refresh: output.refresh,
        progress: Some(&report_progress),
        cancel: Some(&cancel),
    };

    let outcome = service.search(term, lat, lng, opts).await;
    finish(outcome, &cancel, output)
}

/// Search several centers and print the combined ranking.
///
/// # Errors
///
/// Returns an error if the tile fetcher cannot be built or output cannot be
/// written.
pub(crate) async fn run_multi(
    config: &AppConfig,
    term: &str,
    centers: &[(f64, f64)],
    reference: Option<(f64, f64)>,
    output: &OutputArgs,
) -> anyhow::Result<()> {
    let service = build_service(config).await?;
    let cancel = cancel_on_ctrl_c();
    let opts = SearchOptions {
        force_refresh: output.refresh,
        progress: Some(&report_progress),
        cancel: Some(&cancel),
    };
    let reference = match reference {
        Some((lat, lng)) => ScoreReference::Global { lat, lng },
        None => ScoreReference::PerCenter,
    };

    let outcome = service.search_many(term, centers, reference, opts).await;
    finish(outcome, &cancel, output)
}

fn finish(outcome: SearchOutcome, cancel: &CancelFlag, output: &OutputArgs) -> anyhow::Result<()> {
    if cancel.is_cancelled() {
        eprintln!();
        println!("search cancelled; nothing was cached");
        return Ok(());
    }

    let rank_by = RankBy::from(output.rank_by);
    let mut places = outcome.places;
    rank_places(&mut places, rank_by);
    places.truncate(output.limit);

    let mut stdout = std::io::stdout().lock();
    if output.json {
        serde_json::to_writer_pretty(&mut stdout, &places)?;
        writeln!(stdout)?;
        return Ok(());
    }

    if places.is_empty() {
        writeln!(stdout, "no places found")?;
        return Ok(());
    }
    if outcome.served_from_cache {
        writeln!(stdout, "(served from cache)")?;
    }
    for line in render_table(&places, rank_by) {
        writeln!(stdout, "{line}")?;
    }
    Ok(())
}

fn render_table(places: &[Place], rank_by: RankBy) -> Vec<String> {
    let mut lines = Vec::with_capacity(places.len() + 1);
    lines.push(format!(
        "{:<4}{:<w$}  {:>6}  {:>7}  {:>8}  {:>6}  {}",
        "#",
        "NAME",
        "RATING",
        "RATERS",
        "DIST KM",
        "PRICE",
        rank_by.to_string().to_uppercase(),
        w = NAME_WIDTH
    ));
    for (i, place) in places.iter().enumerate() {
        let price = place
            .price_level
            .map_or_else(|| "-".to_owned(), |level| "$".repeat(usize::from(level)));
        lines.push(format!(
            "{:<4}{:<w$}  {:>6.1}  {:>7}  {:>8.2}  {:>6}  {:.3}",
            i + 1,
            truncate_name(&place.description),
            place.rating,
            place.raters,
            place.dist,
            price,
            rank_by.key(place),
            w = NAME_WIDTH
        ));
    }
    lines
}

fn truncate_name(name: &str) -> String {
    if name.chars().count() > NAME_WIDTH {
        let kept: String = name.chars().take(NAME_WIDTH - 3).collect();
        format!("{kept}...")
    } else {
        name.to_owned()
    }
}
