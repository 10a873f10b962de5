//! Place extraction from raw provider result cards.
//!
//! Each field is parsed independently: an unreadable rating, price, or
//! coordinate degrades that field to its default and never drops the entry.
//! The name is the only mandatory field.

mod fields;
mod name;

use mapcrawl_core::Place;

pub use name::{reconstruct_name, DefaultNameResolver, NameResolver};

/// One result card as returned by a tile fetch, before parsing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEntry {
    /// Structured name (the place link's `aria-label`), when the page has one.
    pub label: Option<String>,
    /// Place link, typically carrying `!3d<lat>!4d<lng>`.
    pub href: Option<String>,
    /// Visible card text with markup stripped.
    pub text: String,
    /// Comma-separated chunks of the raw card payload, for name reconstruction.
    pub fragments: Vec<String>,
    /// Raw card source.
    pub markup: String,
}

/// Parses [`RawEntry`] values into [`Place`] records.
#[derive(Debug, Clone, Default)]
pub struct PlaceExtractor<R = DefaultNameResolver> {
    resolver: R,
}

impl PlaceExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<R: NameResolver> PlaceExtractor<R> {
    #[must_use]
    pub fn with_resolver(resolver: R) -> Self {
        Self { resolver }
    }

    /// Extracts a place from one entry, or `None` when no name is recoverable.
    ///
    /// Coordinates come from the place link, the raw markup, or the payload
    /// fields preceding the place id; when none is readable the tile center
    /// `(fallback_lat, fallback_lng)` is used so the record is kept. Near the
    /// poles tile centers can fall off the globe, so the fallback is clamped
    /// to `[-90, 90]` and wrapped into `[-180, 180)`.
    pub fn extract(&self, entry: &RawEntry, fallback_lat: f64, fallback_lng: f64) -> Option<Place> {
        let Some(name) = self.resolver.resolve(entry) else {
            tracing::debug!(
                href = entry.href.as_deref().unwrap_or(""),
                "skipping entry with no recoverable name"
            );
            return None;
        };

        let (rating, raters) = fields::parse_rating(&entry.text)
            .or_else(|| fields::parse_rating(&entry.markup))
            .unwrap_or_else(|| {
                tracing::debug!(name, "no readable rating; defaulting to 0.0 (0)");
                (0.0, 0)
            });

        let price = fields::parse_price(&entry.text);
        let price_level = fields::parse_price_level(&entry.text);

        let (latitude, longitude) = entry
            .href
            .as_deref()
            .and_then(fields::parse_coordinates)
            .or_else(|| fields::parse_coordinates(&entry.markup))
            .or_else(|| fields::coordinates_before_id(&entry.fragments))
            .unwrap_or_else(|| onto_globe(fallback_lat, fallback_lng));

        Some(Place {
            price,
            price_level,
            review_url: entry.href.clone().filter(|h| !h.is_empty()),
            img_links: fields::extract_image_links(&entry.markup),
            ..Place::new(name, rating, raters, latitude, longitude)
        })
    }
}

/// Clamps latitude and wraps longitude into valid ranges.
fn onto_globe(lat: f64, lng: f64) -> (f64, f64) {
    let lng = if (-180.0..=180.0).contains(&lng) {
        lng
    } else {
        (lng + 180.0).rem_euclid(360.0) - 180.0
    };
    (lat.clamp(-90.0, 90.0), lng)
}
