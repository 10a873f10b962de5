pub mod crawl;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod grid;
pub(crate) mod rate_limit;
pub mod score;

pub use crawl::{CancelFlag, CrawlConfig, CrawlReport, Crawler, ProgressFn};
pub use error::ScraperError;
pub use extract::{DefaultNameResolver, NameResolver, PlaceExtractor, RawEntry};
pub use fetch::{HttpTileFetcher, TileFetcher};
pub use grid::{generate_grid, lng_step_for, GridPoint};
pub use score::{score, score_groups};
