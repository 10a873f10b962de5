//! Caller-side ordering of scored result sets.

use crate::places::Place;

/// Which derived score to order results by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RankBy {
    ScaledRating,
    ScaledDistRating,
    Vfm,
    #[default]
    Composite,
}

impl RankBy {
    #[must_use]
    pub fn key(self, place: &Place) -> f64 {
        match self {
            RankBy::ScaledRating => place.scaled_rating,
            RankBy::ScaledDistRating => place.scaled_dist_rating,
            RankBy::Vfm => place.vfm,
            RankBy::Composite => place.composite,
        }
    }
}

impl std::fmt::Display for RankBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RankBy::ScaledRating => write!(f, "scaled_rating"),
            RankBy::ScaledDistRating => write!(f, "scaled_dist_rating"),
            RankBy::Vfm => write!(f, "vfm"),
            RankBy::Composite => write!(f, "composite"),
        }
    }
}

/// Sorts `places` by the chosen score, highest first.
///
/// The sort is stable, so ties keep their scored order.
pub fn rank_places(places: &mut [Place], by: RankBy) {
    places.sort_by(|a, b| by.key(b).total_cmp(&by.key(a)));
}
