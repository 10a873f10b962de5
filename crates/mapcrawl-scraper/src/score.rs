//! Result-set scoring.
//!
//! Scores are relative: `vfm` and `composite` divide by medians of the set
//! being scored, so two separately scored sets are never comparable. Scoring
//! does not sort; callers rank afterward.

use std::collections::HashSet;

use mapcrawl_core::Place;

/// Kilometers per degree of latitude.
const KM_PER_DEGREE: f64 = 111.3188;
const RATER_DISCOUNT_BASE: f64 = 1.25;
/// Distance in km at which the proximity factor falls to `1 - 1/1.25`.
const DISTANCE_SCALE_KM: f64 = 11.1;
const DISTANCE_EPSILON_KM: f64 = 0.001;
/// Coordinates and ratings are compared at this resolution when deduplicating.
const DEDUP_SCALE: f64 = 1e6;

/// Deduplicates and scores `places` against a single reference center.
#[must_use]
pub fn score(places: Vec<Place>, ref_lat: f64, ref_lng: f64) -> Vec<Place> {
    score_groups(vec![(places, (ref_lat, ref_lng))])
}

/// Scores several result groups as one set.
///
/// Deduplication and the medians behind `vfm` and `composite` span every
/// group; distance is measured from each group's own reference center.
/// Input order is preserved, first occurrence wins on duplicates.
#[must_use]
pub fn score_groups(groups: Vec<(Vec<Place>, (f64, f64))>) -> Vec<Place> {
    let mut seen = HashSet::new();
    let mut scored: Vec<Place> = Vec::new();

    for (places, (ref_lat, ref_lng)) in groups {
        for place in places {
            if !seen.insert(dedup_key(&place)) {
                continue;
            }
            let mut place = place.unscored();
            place.price = Some(place.price.filter(|p| *p > 0.0).unwrap_or(1.0));
            place.scaled_rating = scaled_rating(place.rating, place.raters);
            place.dist = distance_km(place.latitude, place.longitude, ref_lat, ref_lng);
            place.scaled_dist_rating = scaled_dist_rating(place.scaled_rating, place.dist);
            scored.push(place);
        }
    }

    apply_relative_scores(&mut scored);
    scored
}

/// `rating · (1 - 1.25^(-√raters))`; zero raters score zero.
#[must_use]
pub fn scaled_rating(rating: f64, raters: u64) -> f64 {
    // Rater counts stay far below 2^52.
    #[allow(clippy::cast_precision_loss)]
    let raters = raters as f64;
    rating * (1.0 - RATER_DISCOUNT_BASE.powf(-raters.sqrt()))
}

/// Equirectangular distance in km, with the cosine taken at the reference latitude.
#[must_use]
pub fn distance_km(lat: f64, lng: f64, ref_lat: f64, ref_lng: f64) -> f64 {
    let lat_km = (lat - ref_lat) * KM_PER_DEGREE;
    let lng_km = (lng - ref_lng) * ref_lat.to_radians().cos() * KM_PER_DEGREE;
    lat_km.hypot(lng_km)
}

fn scaled_dist_rating(scaled_rating: f64, dist: f64) -> f64 {
    scaled_rating * (1.0 - RATER_DISCOUNT_BASE.powf(-DISTANCE_SCALE_KM / (dist + DISTANCE_EPSILON_KM)))
}

fn apply_relative_scores(places: &mut [Place]) {
    let median_rating = median(places.iter().map(|p| p.scaled_rating));
    let median_price = median(places.iter().map(|p| p.price.unwrap_or(1.0)));
    if median_rating <= 0.0 || median_price <= 0.0 {
        return;
    }

    for place in places.iter_mut() {
        let relative = place.scaled_rating / median_rating;
        place.vfm = relative * (median_price / place.price.unwrap_or(1.0)).sqrt();
    }

    let median_vfm = median(places.iter().map(|p| p.vfm));
    if median_vfm <= 0.0 {
        return;
    }
    for place in places.iter_mut() {
        let relative = place.scaled_rating / median_rating;
        place.composite = relative * (place.vfm / median_vfm).sqrt();
    }
}

/// Median with the two middle values averaged for even counts; `0.0` when empty.
fn median(values: impl Iterator<Item = f64>) -> f64 {
    let mut sorted: Vec<f64> = values.collect();
    if sorted.is_empty() {
        return 0.0;
    }
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len().is_multiple_of(2) {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn dedup_key(place: &Place) -> (String, i64, u64, i64, i64) {
    #[allow(clippy::cast_possible_truncation)]
    let quantize = |v: f64| (v * DEDUP_SCALE).round() as i64;
    (
        place.description.clone(),
        quantize(place.rating),
        place.raters,
        quantize(place.latitude),
        quantize(place.longitude),
    )
}
