//! Place-name resolution.
//!
//! Kept behind [`NameResolver`] so the fragment heuristic can be swapped out
//! without touching the rest of the extractor.

use super::RawEntry;

const ESCAPED_QUOTE: &str = "\\\"";

/// Recovers a display name for one raw result entry.
pub trait NameResolver {
    /// Returns `None` when no name can be recovered; the entry is then skipped.
    fn resolve(&self, entry: &RawEntry) -> Option<String>;
}

/// Structured label first, then fragment reconstruction.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultNameResolver;

impl NameResolver for DefaultNameResolver {
    fn resolve(&self, entry: &RawEntry) -> Option<String> {
        entry
            .label
            .as_deref()
            .map(clean_name)
            .filter(|name| !name.is_empty())
            .or_else(|| reconstruct_name(&entry.fragments))
    }
}

/// Rebuilds a name from payload fragments.
///
/// The payload is split on commas upstream, so one escaped-quoted name may
/// span several fragments (`["\"Split", " Name\""]`). A candidate opens at
/// a fragment starting with `\"` and runs, concatenating fragments, until one
/// ends with `\"`. The longest plausible candidate wins, first one on ties.
#[must_use]
pub fn reconstruct_name<S: AsRef<str>>(fragments: &[S]) -> Option<String> {
    let mut best: Option<String> = None;
    let mut open: Option<String> = None;

    let mut consider = |raw: &str| {
        let candidate = clean_name(raw);
        if !looks_like_name(&candidate) {
            return;
        }
        let longer = best
            .as_ref()
            .is_none_or(|b| candidate.chars().count() > b.chars().count());
        if longer {
            best = Some(candidate);
        }
    };

    for fragment in fragments {
        let fragment = fragment.as_ref().trim_start_matches('[').trim_end_matches(']');
        let closes = fragment.ends_with(ESCAPED_QUOTE);
        if let Some(mut acc) = open.take() {
            acc.push_str(fragment);
            if closes {
                consider(&acc);
            } else {
                open = Some(acc);
            }
        } else if fragment.starts_with(ESCAPED_QUOTE) {
            if closes && fragment.len() >= 2 * ESCAPED_QUOTE.len() {
                consider(fragment);
            } else {
                open = Some(fragment.to_owned());
            }
        }
    }
    best
}

/// Payload identifiers (`0x39...`), URLs, and bare numbers are never names.
fn looks_like_name(candidate: &str) -> bool {
    !candidate.is_empty()
        && !candidate.starts_with("0x")
        && !candidate.starts_with("http")
        && candidate.chars().any(char::is_alphabetic)
}

fn clean_name(raw: &str) -> String {
    raw.replace("\\u0026", "&")
        .replace("\\u0027", "'")
        .replace("&amp;", "&")
        .replace("&#39;", "'")
        .replace("&quot;", "\"")
        .replace(['\\', '"'], "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
