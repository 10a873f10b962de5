//! Search-term and coordinate input handling.

use thiserror::Error;

/// Normalizes a search term for crawling and cache lookup.
///
/// Trims, lowercases, and collapses internal whitespace runs to one space.
/// Crawl and cache layers must both go through this so that `" Pizza  Hut"`
/// and `"pizza hut"` share an index entry.
#[must_use]
pub fn normalize_term(term: &str) -> String {
    term.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Error, PartialEq)]
pub enum CoordinateError {
    #[error("expected \"lat, lng\", got {0:?}")]
    Format(String),
    #[error("latitude {0} is outside [-90, 90]")]
    LatitudeRange(f64),
    #[error("longitude {0} is outside [-180, 180]")]
    LongitudeRange(f64),
}

/// Parses a `"lat, lng"` pair as typed by a user.
///
/// # Errors
///
/// Returns [`CoordinateError::Format`] unless the input holds exactly two
/// comma-separated finite numbers, and a range error when either value falls
/// outside the valid latitude/longitude bounds.
pub fn parse_coordinates(input: &str) -> Result<(f64, f64), CoordinateError> {
    let format_err = || CoordinateError::Format(input.to_owned());

    let mut parts = input.split(',');
    let (Some(lat_raw), Some(lng_raw), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(format_err());
    };

    let lat: f64 = lat_raw.trim().parse().map_err(|_| format_err())?;
    let lng: f64 = lng_raw.trim().parse().map_err(|_| format_err())?;
    if !lat.is_finite() || !lng.is_finite() {
        return Err(format_err());
    }
    if !(-90.0..=90.0).contains(&lat) {
        return Err(CoordinateError::LatitudeRange(lat));
    }
    if !(-180.0..=180.0).contains(&lng) {
        return Err(CoordinateError::LongitudeRange(lng));
    }
    Ok((lat, lng))
}
