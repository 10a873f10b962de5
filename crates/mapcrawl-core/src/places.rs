use serde::{Deserialize, Serialize};

/// A place found on the provider's map, as extracted from one result card.
///
/// The derived score fields (`scaled_rating` through `composite`) stay at
/// `0.0` until the whole result set of a search has been scored together:
/// they depend on set-wide medians and a single reference center, so a
/// `Place` is never scored on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    /// Display name. Never empty for records produced by the extractor.
    pub description: String,
    /// Average rating in `[0.0, 5.0]`.
    pub rating: f64,
    /// Number of ratings behind `rating`.
    pub raters: u64,
    pub latitude: f64,
    pub longitude: f64,
    /// Raw price estimate. Normalized to `1.0` when missing by the scorer.
    #[serde(default)]
    pub price: Option<f64>,
    /// Price tier in `[1, 4]` when the provider shows one (`$`, `$$`, ...).
    #[serde(default)]
    pub price_level: Option<u8>,
    #[serde(default)]
    pub review_url: Option<String>,
    /// Up to four thumbnail URLs, in page order.
    #[serde(default)]
    pub img_links: Vec<String>,

    #[serde(default)]
    pub scaled_rating: f64,
    /// Distance from the search center in kilometers.
    #[serde(default)]
    pub dist: f64,
    #[serde(default)]
    pub scaled_dist_rating: f64,
    #[serde(default)]
    pub vfm: f64,
    #[serde(default)]
    pub composite: f64,
}

impl Place {
    /// Builds a place with every derived score at its zero default.
    #[must_use]
    pub fn new(
        description: impl Into<String>,
        rating: f64,
        raters: u64,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            description: description.into(),
            rating,
            raters,
            latitude,
            longitude,
            price: None,
            price_level: None,
            review_url: None,
            img_links: Vec::new(),
            scaled_rating: 0.0,
            dist: 0.0,
            scaled_dist_rating: 0.0,
            vfm: 0.0,
            composite: 0.0,
        }
    }

    #[must_use]
    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    /// Copy of this place with every derived score reset to zero.
    #[must_use]
    pub fn unscored(&self) -> Self {
        Self {
            scaled_rating: 0.0,
            dist: 0.0,
            scaled_dist_rating: 0.0,
            vfm: 0.0,
            composite: 0.0,
            ..self.clone()
        }
    }
}

/// One row of the persisted search index: a completed crawl for a term at a
/// location, pointing at the stored result set by `key`.
///
/// Field names on the wire follow the historical index format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchIndexEntry {
    #[serde(rename = "Search")]
    pub search_term: String,
    #[serde(rename = "Latitude")]
    pub latitude: f64,
    #[serde(rename = "Longitude")]
    pub longitude: f64,
    /// Unix timestamp (seconds) at which the crawl completed.
    #[serde(rename = "Time")]
    pub timestamp: f64,
    #[serde(rename = "Key")]
    pub key: String,
}
