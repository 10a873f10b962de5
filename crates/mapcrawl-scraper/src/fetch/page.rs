//! Splits a provider search page into raw result entries.
//!
//! Rendered pages carry one `role="article"` card per result. Pages served
//! without rendering only carry the data payload, which is cut into one
//! chunk per `N reviews` anchor instead. A page with neither is an empty tile.

use std::sync::LazyLock;

use regex::Regex;

use crate::extract::RawEntry;

static ARTICLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<div\b[^>]*\brole\s*=\s*["']article["'][^>]*>"#).expect("valid regex")
});
static PLACE_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*\bhref\s*=\s*(?:"[^"]*/maps/place/[^"]*"|'[^']*/maps/place/[^']*')[^>]*>"#)
        .expect("valid regex")
});
static HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bhref\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid regex")
});
static ARIA_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\baria-label\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid regex")
});
static SCRIPT_STYLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b.*?</script>|<style\b.*?</style>").expect("valid regex")
});
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));
static REVIEWS_ANCHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d[\d,]* reviews").expect("valid regex"));

/// Upper bound on the trailing payload chunk, which otherwise runs to the end
/// of the page.
const MAX_PAYLOAD_CHUNK: usize = 4096;

/// Raw entries on one page, in page order.
pub(crate) fn split_entries(html: &str) -> Vec<RawEntry> {
    let cards = article_entries(html);
    if !cards.is_empty() {
        return cards;
    }
    let chunks = payload_entries(html);
    if chunks.is_empty() {
        tracing::debug!(bytes = html.len(), "no results container on page");
    }
    chunks
}

fn article_entries(html: &str) -> Vec<RawEntry> {
    let starts: Vec<usize> = ARTICLE_RE.find_iter(html).map(|m| m.start()).collect();
    starts
        .iter()
        .enumerate()
        .filter_map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or_else(|| {
                html[start..]
                    .find("<script")
                    .map_or(html.len(), |offset| start + offset)
            });
            card_entry(&html[start..end])
        })
        .collect()
}

/// Cards without a place link are ads or section headers and are dropped.
fn card_entry(markup: &str) -> Option<RawEntry> {
    let link = PLACE_LINK_RE.find(markup)?.as_str();
    let href = attr(&HREF_RE, link).map(|h| decode_html(&h));
    let label = attr(&ARIA_LABEL_RE, link)
        .or_else(|| attr(&ARIA_LABEL_RE, markup))
        .map(|l| decode_html(&l))
        .filter(|l| !l.is_empty());

    Some(RawEntry {
        label,
        href,
        text: visible_text(markup),
        fragments: markup.split(',').map(str::to_owned).collect(),
        markup: markup.to_owned(),
    })
}

fn payload_entries(html: &str) -> Vec<RawEntry> {
    let starts: Vec<usize> = REVIEWS_ANCHOR_RE.find_iter(html).map(|m| m.start()).collect();
    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts
                .get(i + 1)
                .copied()
                .unwrap_or_else(|| floor_char_boundary(html, start + MAX_PAYLOAD_CHUNK));
            let chunk = &html[start..end];
            RawEntry {
                label: None,
                href: None,
                text: chunk.to_owned(),
                fragments: chunk.split(',').map(str::to_owned).collect(),
                markup: chunk.to_owned(),
            }
        })
        .collect()
}

/// Value of the first attribute matched by `re`, either quote style.
fn attr(re: &Regex, tag: &str) -> Option<String> {
    let caps = re.captures(tag)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().to_owned())
}

fn visible_text(markup: &str) -> String {
    let without_code = SCRIPT_STYLE_RE.replace_all(markup, " ");
    let without_tags = TAG_RE.replace_all(&without_code, " ");
    decode_html(&without_tags)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn decode_html(value: &str) -> String {
    value
        .replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("\\u0026", "&")
        .trim()
        .to_string()
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}
