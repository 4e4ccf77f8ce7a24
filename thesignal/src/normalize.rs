//! Maps adapter output into the single canonical [`CandidateItem`] shape.
//!
//! Adapters fill a [`RawCandidate`] with whatever their upstream gave them;
//! `normalize` parses timestamps, derives a missing source domain and turns
//! blank optional fields into absent ones.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::debug;
use url::Url;

use crate::model::CandidateItem;

/// Loosely-typed item as produced by a source adapter.
#[derive(Debug, Clone, Default)]
pub struct RawCandidate {
    pub title: String,
    pub url: String,
    pub source_domain: Option<String>,
    pub raw_content: String,
    pub published_at: Option<String>,
    pub author_handle: Option<String>,
    pub image_url: Option<String>,
}

/// Produce the canonical item, or `None` when the raw item has no usable URL.
pub fn normalize(raw: RawCandidate) -> Option<CandidateItem> {
    let url = raw.url.trim().to_string();
    if url.is_empty() {
        debug!(title = %raw.title, "skipping item without URL");
        return None;
    }

    let source_domain = non_blank(raw.source_domain)
        .or_else(|| domain_of(&url))
        .unwrap_or_else(|| "unknown".to_string());

    Some(CandidateItem {
        title: raw.title.trim().to_string(),
        url,
        source_domain,
        raw_content: raw.raw_content,
        published_at: raw.published_at.as_deref().and_then(parse_timestamp),
        author_handle: non_blank(raw.author_handle),
        image_url: non_blank(raw.image_url),
    })
}

/// Host of `url` without a leading `www.`.
pub fn domain_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(host.strip_prefix("www.").unwrap_or(host).to_string())
}

/// First `max` characters of `s` (character-based, never splits a code point).
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Accepts RFC 3339, RFC 2822, the legacy Twitter format and bare dates.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%a %b %d %H:%M:%S %z %Y") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }
    if let Ok(date) = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|n| n.and_utc());
    }
    debug!(value = s, "unparseable timestamp ignored");
    None
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
