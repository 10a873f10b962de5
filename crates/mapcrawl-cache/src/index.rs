//! The search index: one entry per completed crawl, append-only.

use mapcrawl_core::SearchIndexEntry;
use mapcrawl_scraper::lng_step_for;

use crate::StorageError;

/// Longitude tolerance matching `lat_tolerance` in ground distance at `lat`.
///
/// Same widening as grid spacing, so a hit is always within one tile step.
#[must_use]
pub fn lng_tolerance(lat_tolerance: f64, lat: f64) -> f64 {
    lng_step_for(lat_tolerance, lat)
}

/// Whether `(lat, lng)` falls in the cache bucket around `(center_lat, center_lng)`.
#[must_use]
pub fn within_tolerance(
    center_lat: f64,
    center_lng: f64,
    lat: f64,
    lng: f64,
    lat_tolerance: f64,
) -> bool {
    (center_lat - lat).abs() <= lat_tolerance
        && (center_lng - lng).abs() <= lng_tolerance(lat_tolerance, lat)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchIndex {
    entries: Vec<SearchIndexEntry>,
}

impl SearchIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_entries(entries: Vec<SearchIndexEntry>) -> Self {
        Self { entries }
    }

    #[must_use]
    pub fn entries(&self) -> &[SearchIndexEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry, in index order, for `term` within tolerance of `(lat, lng)`.
    ///
    /// `term` must already be normalized. Earlier entries win even when a
    /// later one is closer or newer.
    #[must_use]
    pub fn find_first(
        &self,
        term: &str,
        lat: f64,
        lng: f64,
        lat_tolerance: f64,
    ) -> Option<&SearchIndexEntry> {
        self.entries.iter().find(|e| {
            e.search_term == term
                && within_tolerance(e.latitude, e.longitude, lat, lng, lat_tolerance)
        })
    }

    pub fn push(&mut self, entry: SearchIndexEntry) {
        self.entries.push(entry);
    }

    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if `bytes` is not a JSON array
    /// of index entries.
    pub fn from_json(bytes: &[u8]) -> Result<Self, StorageError> {
        Ok(Self {
            entries: serde_json::from_slice(bytes)?,
        })
    }

    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if encoding fails.
    pub fn to_json(&self) -> Result<Vec<u8>, StorageError> {
        Ok(serde_json::to_vec(&self.entries)?)
    }
}
