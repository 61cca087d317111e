//! Document metadata extraction.
//!
//! Listing pages need a title and a pair of timestamps for every entry, but
//! authors rarely provide them explicitly. Each field is resolved through a
//! prioritized fallback chain: the first source that yields a value wins, and
//! a source that fails to parse simply falls through. Metadata extraction
//! never aborts a build.
//!
//! ## Title
//!
//! - Document sources: the first non-empty line, stripped of leading `#`
//!   heading markers or a pandoc `%` title-block marker, with inline markup
//!   flattened to plain text (`# My *great* post` → "My great post").
//! - Everything else: the raw path wrapped in backticks, so binary and asset
//!   entries still display as literal text in a listing.
//!
//! ## Created
//!
//! 1. An explicit date directive in the header lines (`Date: 2021-01-01`,
//!    or a pandoc title-block `%` line), parsed against the configured
//!    format list.
//! 2. A date found in the title text itself (`Notes from 2021-01-01`).
//! 3. The timestamp of the entry's first recorded history event.
//!
//! ## Updated
//!
//! Always the timestamp of the most recent history event. Content never
//! overrides it; the repository knows when an entry last changed.

use crate::repo::HistoryEvent;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use pulldown_cmark::{Event, Parser};

/// How many leading lines are searched for a date directive.
const HEADER_LINES: usize = 5;

/// Resolved metadata for one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocMeta {
    pub title: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// Extract metadata for an entry.
///
/// `content` is the staged text for document sources and `None` for
/// everything else. `history` is oldest-first, per the repository contract.
pub fn extract(
    path: &str,
    content: Option<&str>,
    history: &[HistoryEvent],
    date_formats: &[String],
) -> DocMeta {
    let title = content
        .and_then(title_from_content)
        .unwrap_or_else(|| format!("`{path}`"));

    let created = content
        .and_then(|c| date_directive(c, date_formats))
        .or_else(|| date_in_text(&title, date_formats))
        .map(midnight_utc)
        .or_else(|| history.first().map(|e| e.timestamp))
        .unwrap_or_else(Utc::now);

    // Untracked working content has no history; treat it as changed now.
    let updated = history
        .last()
        .map(|e| e.timestamp)
        .unwrap_or_else(Utc::now);

    DocMeta {
        title,
        created,
        updated,
    }
}

/// First non-empty line, marker-stripped and flattened to plain text.
fn title_from_content(content: &str) -> Option<String> {
    let line = content.lines().find(|l| !l.trim().is_empty())?;
    let stripped = line
        .trim()
        .trim_start_matches('#')
        .trim_start_matches('%')
        .trim();
    let flat = flatten_inline(stripped);
    if flat.is_empty() { None } else { Some(flat) }
}

/// Flatten inline markdown to its text content.
fn flatten_inline(line: &str) -> String {
    let mut out = String::new();
    for event in Parser::new(line) {
        match event {
            Event::Text(t) | Event::Code(t) => out.push_str(&t),
            Event::SoftBreak | Event::HardBreak => out.push(' '),
            _ => {}
        }
    }
    out.trim().to_string()
}

/// Search the header lines (after the first) for an explicit date directive.
///
/// Recognizes `Date: <value>` in any case, and pandoc title-block `%` lines;
/// the author line of a title block fails to parse and falls through.
fn date_directive(content: &str, formats: &[String]) -> Option<NaiveDate> {
    for line in content.lines().take(HEADER_LINES).skip(1) {
        let line = line.trim();
        let lower = line.to_ascii_lowercase();
        let value = if lower.starts_with("date:") {
            &line[5..]
        } else if let Some(rest) = line.strip_prefix('%') {
            rest
        } else {
            continue;
        };
        if let Some(date) = parse_date(value, formats) {
            return Some(date);
        }
    }
    None
}

/// Scan free text for a parsable date, trying windows of up to three
/// whitespace-separated tokens ("7 August 2021", "August 7, 2021").
fn date_in_text(text: &str, formats: &[String]) -> Option<NaiveDate> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    for start in 0..tokens.len() {
        let max_len = (tokens.len() - start).min(3);
        for len in 1..=max_len {
            let candidate = tokens[start..start + len].join(" ");
            let candidate = candidate.trim_matches(|c: char| "`*_()[],.;".contains(c));
            if let Some(date) = parse_date(candidate, formats) {
                return Some(date);
            }
        }
    }
    None
}

fn parse_date(value: &str, formats: &[String]) -> Option<NaiveDate> {
    let value = value.trim();
    formats
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}
