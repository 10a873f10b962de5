//! Query-tile grid around a search center.
//!
//! Longitude step widens with latitude so tiles keep roughly equal physical
//! spacing; the same formula sizes the cache's longitude tolerance.

/// Floor for `|cos(lat)|` so the longitude step stays finite at the poles.
const MIN_COS_LAT: f64 = 1e-6;

/// Center of one query tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Longitude span equal in ground distance to `lat_step` at latitude `lat`.
#[must_use]
pub fn lng_step_for(lat_step: f64, lat: f64) -> f64 {
    lat_step / lat.to_radians().cos().abs().max(MIN_COS_LAT)
}

/// Generate the `(2·radius+1)²` tile centers around `(center_lat, center_lng)`.
///
/// Points are `center + (i·lat_step, j·lng_step)` for `i, j ∈ [-radius, radius]`,
/// row-major (latitude outer, longitude inner). Identical inputs always yield
/// bit-identical output; `radius = 0` yields just the center.
#[must_use]
pub fn generate_grid(
    center_lat: f64,
    center_lng: f64,
    lat_step: f64,
    lng_step: f64,
    radius: u32,
) -> Vec<GridPoint> {
    let r = i64::from(radius);
    let side = 2 * radius as usize + 1;
    let mut points = Vec::with_capacity(side * side);
    for i in -r..=r {
        // |i|, |j| <= 10 in practice; exact in f64.
        #[allow(clippy::cast_precision_loss)]
        let lat = center_lat + i as f64 * lat_step;
        for j in -r..=r {
            #[allow(clippy::cast_precision_loss)]
            let lng = center_lng + j as f64 * lng_step;
            points.push(GridPoint { lat, lng });
        }
    }
    points
}
