//! Generated listing pages.
//!
//! Every directory in a section gets an `index.html` listing its file
//! entries, newest first, so readers can browse without hand-maintained
//! tables of contents. Listings are cheap to regenerate and are rebuilt
//! whenever the engine visits a directory, so they always reflect the current
//! metadata of the directory's contents.
//!
//! The one hard rule: an **explicit index always wins**. If the directory
//! contains an authored `index.md`, `index.markdown`, or a checked-in
//! `index.html`, the builder does not touch the directory at all.
//!
//! A generated listing is itself a document source: it is staged (which
//! applies variable substitution) and rendered through the same external
//! renderer as authored content, so listings pick up the theme like any
//! other page.

use crate::changeset::ContentRef;
use crate::config::{IndexOrder, SiteConfig};
use crate::metadata;
use crate::render::{self, DocumentRenderer};
use crate::repo::{ContentRepository, RepoError};
use crate::staging::{StagingError, StagingStore};
use chrono::{DateTime, Utc};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("repository error: {0}")]
    Repo(#[from] RepoError),
    #[error("staging error: {0}")]
    Staging(#[from] StagingError),
}

/// What happened to one directory's listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    /// An explicit index exists; nothing was touched.
    Skipped,
    Generated,
    /// The renderer rejected the listing; the old output is left in place.
    RenderFailed,
}

/// One row of a listing, derived from an entry's metadata. Held only while
/// the directory's index is being built.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub title: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub output_path: String,
}

/// Whether the directory carries an explicit index (source or compiled).
pub fn has_explicit_index(files: &[ContentRef]) -> bool {
    files
        .iter()
        .any(|f| render::output_name(f.name()) == "index.html")
}

/// Rebuild the listing for one directory.
///
/// `files` are the directory's file-kind children in the current tree.
/// Repository failures are fatal; a renderer failure is logged and reported
/// as [`IndexOutcome::RenderFailed`].
pub fn rebuild<R, D>(
    dir: &str,
    files: &[ContentRef],
    repo: &R,
    renderer: &D,
    staging: &mut StagingStore,
    template: &Path,
    config: &SiteConfig,
) -> Result<IndexOutcome, IndexError>
where
    R: ContentRepository + ?Sized,
    D: DocumentRenderer + ?Sized,
{
    if has_explicit_index(files) {
        debug!(dir, "explicit index present, skipping");
        return Ok(IndexOutcome::Skipped);
    }

    let mut entries = Vec::new();
    for file in files {
        if config.ignored(dir, file.name()) {
            continue;
        }
        let staged = staging.materialize(&file.path, &file.source, repo)?;
        let content = if render::is_document_source(&file.path) {
            Some(String::from_utf8_lossy(&std::fs::read(&staged)?).into_owned())
        } else {
            None
        };
        let history = repo.history(&file.path)?;
        let meta = metadata::extract(
            &file.path,
            content.as_deref(),
            &history,
            &config.site.date_formats,
        );
        entries.push(IndexEntry {
            title: meta.title,
            created: meta.created,
            updated: meta.updated,
            output_path: render::output_name(file.name()),
        });
    }

    sort_newest_first(&mut entries);
    let listing = render_listing(dir, &entries, config.site.index_order);

    let source_path = match dir {
        "" => "index.md".to_string(),
        dir => format!("{dir}/index.md"),
    };
    let staged = staging.stage_generated(&source_path, &listing)?;
    let output = staging.output_path(&render::output_name(&source_path))?;

    match renderer.render(&staged, template, &output) {
        Ok(()) => Ok(IndexOutcome::Generated),
        Err(e) => {
            warn!(dir, error = %e, "listing render failed, output left stale");
            Ok(IndexOutcome::RenderFailed)
        }
    }
}

/// Sort by creation date, most recent first. Stable: ties keep their
/// original traversal order.
pub fn sort_newest_first(entries: &mut [IndexEntry]) {
    entries.sort_by(|a, b| b.created.cmp(&a.created));
}

/// Render the listing document: a heading from the directory name, then a
/// numbered list of entries linking to their outputs, each annotated with
/// its humanized update date.
pub fn render_listing(dir: &str, entries: &[IndexEntry], order: IndexOrder) -> String {
    let title = match dir.rsplit('/').next() {
        Some("") | None => "Index".to_string(),
        Some(name) => name.to_string(),
    };
    let mut out = format!("# {title}\n");
    for (i, entry) in entries.iter().enumerate() {
        let number = match order {
            IndexOrder::Ascending => i + 1,
            IndexOrder::Descending => entries.len() - i,
        };
        out.push_str(&format!(
            "\n{number}. [{title}]({path}) ({date})",
            title = entry.title,
            path = entry.output_path,
            date = humanize_date(entry.updated),
        ));
    }
    out.push('\n');
    out
}

/// Format a timestamp the way a reader expects it in a listing.
pub fn humanize_date(date: DateTime<Utc>) -> String {
    date.format("%-d %B %Y").to_string()
}
