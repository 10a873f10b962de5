//! Field parsers for noisy result-card text.
//!
//! Every parser returns `None` on anything it cannot read; the caller decides
//! the default. None of them can fail an entry.

use std::sync::LazyLock;

use regex::Regex;

/// `4.5(1,200)` or `4.2 stars 500 Reviews`.
static RATING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b([0-5]\.\d)\s*(?:\(|stars?\b)\D{0,24}?(\d[\d,]*)").expect("valid regex")
});
/// `4.3 · 2,345 reviews`.
static RATING_REVIEWS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b([0-5]\.\d)\D{0,24}?(\d[\d,]*)\s*reviews?\b").expect("valid regex")
});
/// Payload order: `1,234 reviews` then the rating a few fields later.
static REVIEWS_RATING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d[\d,]*)\s*reviews?\b.{0,160}?\b([0-5]\.\d)\b").expect("valid regex")
});
static PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([₹$€£]\s?\d[\d,]*)").expect("valid regex"));
/// Coordinates embedded in place links: `!3d12.9716!4d77.5946`.
static COORDS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!3d(-?\d{1,3}(?:\.\d+)?)!4d(-?\d{1,3}(?:\.\d+)?)").expect("valid regex")
});
static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("valid regex"));
static IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https://lh\d+\.googleusercontent\.com/[^\s"'<>\\)]+"#).expect("valid regex")
});

const CURRENCY_SYMBOLS: [char; 4] = ['₹', '$', '€', '£'];
const MAX_PRICE_LEVEL: usize = 4;
pub(crate) const MAX_IMAGE_LINKS: usize = 4;

/// Parses `(rating, raters)` from card text.
///
/// Ratings outside `[0, 5]` and counts that don't fit are treated as unreadable.
pub(crate) fn parse_rating(text: &str) -> Option<(f64, u64)> {
    let (rating_raw, raters_raw) = if let Some(c) = RATING_RE
        .captures(text)
        .or_else(|| RATING_REVIEWS_RE.captures(text))
    {
        (c.get(1)?.as_str(), c.get(2)?.as_str())
    } else {
        let c = REVIEWS_RATING_RE.captures(text)?;
        (c.get(2)?.as_str(), c.get(1)?.as_str())
    };

    let rating: f64 = rating_raw.parse().ok()?;
    if !(0.0..=5.0).contains(&rating) {
        return None;
    }
    let raters: u64 = raters_raw.replace(',', "").parse().ok()?;
    Some((rating, raters))
}

/// First currency-prefixed amount in the text, digits only (`₹1,200` → 1200).
pub(crate) fn parse_price(text: &str) -> Option<f64> {
    let token = PRICE_RE.captures(text)?.get(1)?.as_str();
    parse_price_token(token)
}

pub(crate) fn parse_price_token(token: &str) -> Option<f64> {
    let digits: String = token.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    // u32 keeps the value exact in f64.
    digits.parse::<u32>().ok().map(f64::from)
}

/// Price tier from a standalone run of one repeated currency symbol (`$$` → 2).
pub(crate) fn parse_price_level(text: &str) -> Option<u8> {
    text.split(|c: char| c.is_whitespace() || matches!(c, '·' | '•' | '(' | ')' | ','))
        .find_map(|token| {
            let first = token.chars().next()?;
            if !CURRENCY_SYMBOLS.contains(&first) || !token.chars().all(|c| c == first) {
                return None;
            }
            let len = token.chars().count();
            if len > MAX_PRICE_LEVEL {
                return None;
            }
            u8::try_from(len).ok()
        })
}

/// Latitude/longitude pair embedded in a place link, range-checked.
pub(crate) fn parse_coordinates(payload: &str) -> Option<(f64, f64)> {
    let c = COORDS_RE.captures(payload)?;
    let lat: f64 = c.get(1)?.as_str().parse().ok()?;
    let lng: f64 = c.get(2)?.as_str().parse().ok()?;
    if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng) {
        Some((lat, lng))
    } else {
        None
    }
}

/// Coordinates from a comma-split payload, where the two fields just before
/// the first `\"0x…` place identifier carry latitude then longitude.
pub(crate) fn coordinates_before_id<S: AsRef<str>>(fragments: &[S]) -> Option<(f64, f64)> {
    let id_at = fragments
        .iter()
        .position(|f| f.as_ref().trim_start_matches('[').starts_with("\\\"0x"))?;
    let lat_field = fragments.get(id_at.checked_sub(2)?)?.as_ref();
    let lng_field = fragments.get(id_at - 1)?.as_ref();
    let lat: f64 = NUMBER_RE.find(lat_field)?.as_str().parse().ok()?;
    let lng: f64 = NUMBER_RE.find(lng_field)?.as_str().parse().ok()?;
    if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng) {
        Some((lat, lng))
    } else {
        None
    }
}

/// Distinct provider thumbnail URLs, in page order, at most [`MAX_IMAGE_LINKS`].
pub(crate) fn extract_image_links(markup: &str) -> Vec<String> {
    let mut links: Vec<String> = Vec::new();
    for m in IMAGE_RE.find_iter(markup) {
        let url = m.as_str().replace("&amp;", "&");
        if !links.contains(&url) {
            links.push(url);
        }
        if links.len() == MAX_IMAGE_LINKS {
            break;
        }
    }
    links
}
