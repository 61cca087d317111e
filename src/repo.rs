//! Content repository access.
//!
//! The build engine never touches the content history itself; it consumes a
//! small interface ([`ContentRepository`]) that supplies tree snapshots,
//! revision-to-revision diffs, per-path history, and blob content. The
//! production implementation ([`GitRepository`]) drives the `git` CLI as a
//! blocking subprocess; tests substitute an in-memory implementation.
//!
//! Every repository failure is fatal by design: an unreadable entry or a
//! failed git invocation aborts the build before any output mutation, so a
//! partial build can never silently succeed.
//!
//! ## Wire formats
//!
//! The parsers in this module handle NUL-delimited git plumbing output:
//!
//! ```text
//! ls-tree -r -t -z:   <mode> <type> <oid>\t<path>\0...
//! diff-tree -r -z -M: :<srcmode> <dstmode> <srcoid> <dstoid> <status>\0<path>\0[<path>\0]...
//! log --format=%H %ct: one "<hash> <unix-seconds>" line per commit, newest first
//! ```
//!
//! They are pure functions over strings so the awkward cases (renames, type
//! changes, NUL handling) are unit-testable without a live repository.

use crate::changeset::{ContentRef, ContentSource};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("git {command} failed: {stderr}")]
    Git { command: String, stderr: String },
    #[error("malformed git output: {0}")]
    Parse(String),
    #[error("unreadable entry: {0}")]
    Unreadable(String),
}

/// How one path changed between two revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Renamed,
}

/// One record of a revision-to-revision diff.
///
/// `before` is the pre-image (absent for additions), `after` the post-image
/// (absent for deletions). Renames carry both, with differing paths.
#[derive(Debug, Clone)]
pub struct ChangeRecord {
    pub kind: ChangeKind,
    pub before: Option<ContentRef>,
    pub after: Option<ContentRef>,
}

/// One recorded revision touching a path. Ordered oldest-first by the
/// [`ContentRepository::history`] contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEvent {
    pub revision: String,
    pub timestamp: DateTime<Utc>,
}

/// An immutable snapshot of the content tree at one revision.
#[derive(Debug, Clone)]
pub struct Tree {
    pub revision: String,
    pub entries: Vec<ContentRef>,
}

/// The slice of a version-control system the build engine depends on.
pub trait ContentRepository {
    /// Resolve the current head revision identifier.
    fn head(&self) -> Result<String, RepoError>;

    /// Full tree snapshot at the given revision.
    fn tree_at(&self, revision: &str) -> Result<Tree, RepoError>;

    /// Change records between two revisions.
    fn diff(&self, from_rev: &str, to_rev: &str) -> Result<Vec<ChangeRecord>, RepoError>;

    /// Revision events that touched `path`, oldest first.
    fn history(&self, path: &str) -> Result<Vec<HistoryEvent>, RepoError>;

    /// Raw bytes behind a content handle.
    fn read_content(&self, source: &ContentSource) -> Result<Vec<u8>, RepoError>;

    /// Tree snapshot at head.
    fn current_tree(&self) -> Result<Tree, RepoError> {
        let head = self.head()?;
        self.tree_at(&head)
    }
}

/// Production repository backed by the `git` CLI.
pub struct GitRepository {
    root: PathBuf,
}

impl GitRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn run(&self, args: &[&str]) -> Result<Vec<u8>, RepoError> {
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.root)
            .args(args)
            .output()?;
        if !output.status.success() {
            return Err(RepoError::Git {
                command: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    fn run_utf8(&self, args: &[&str]) -> Result<String, RepoError> {
        let bytes = self.run(args)?;
        String::from_utf8(bytes).map_err(|e| RepoError::Parse(e.to_string()))
    }
}

impl ContentRepository for GitRepository {
    fn head(&self) -> Result<String, RepoError> {
        Ok(self.run_utf8(&["rev-parse", "HEAD"])?.trim().to_string())
    }

    fn tree_at(&self, revision: &str) -> Result<Tree, RepoError> {
        let raw = self.run_utf8(&["ls-tree", "-r", "-t", "-z", revision])?;
        Ok(Tree {
            revision: revision.to_string(),
            entries: parse_ls_tree(&raw)?,
        })
    }

    fn diff(&self, from_rev: &str, to_rev: &str) -> Result<Vec<ChangeRecord>, RepoError> {
        let raw = self.run_utf8(&["diff-tree", "-r", "-z", "-M", from_rev, to_rev])?;
        parse_diff_tree(&raw)
    }

    fn history(&self, path: &str) -> Result<Vec<HistoryEvent>, RepoError> {
        let raw = self.run_utf8(&["log", "--follow", "--format=%H %ct", "--", path])?;
        parse_history(&raw)
    }

    fn read_content(&self, source: &ContentSource) -> Result<Vec<u8>, RepoError> {
        match source {
            ContentSource::Repository(id) => self.run(&["cat-file", "blob", id]),
            ContentSource::Filesystem(path) => std::fs::read(path)
                .map_err(|e| RepoError::Unreadable(format!("{}: {e}", path.display()))),
        }
    }
}

/// Parse `ls-tree -r -t -z` output into content refs. Blobs become file
/// entries, trees become directory entries; anything else (submodules,
/// symlink modes still report as blob) is passed through by type.
pub fn parse_ls_tree(raw: &str) -> Result<Vec<ContentRef>, RepoError> {
    let mut entries = Vec::new();
    for record in raw.split('\0').filter(|r| !r.is_empty()) {
        let (meta, path) = record
            .split_once('\t')
            .ok_or_else(|| RepoError::Parse(format!("ls-tree record without tab: {record:?}")))?;
        let mut fields = meta.split(' ');
        let _mode = fields.next();
        let kind = fields.next();
        let oid = fields
            .next()
            .ok_or_else(|| RepoError::Parse(format!("ls-tree record too short: {record:?}")))?;
        let source = ContentSource::Repository(oid.to_string());
        match kind {
            Some("blob") => entries.push(ContentRef::file(path, source)),
            Some("tree") => entries.push(ContentRef::directory(path, source)),
            _ => {}
        }
    }
    Ok(entries)
}

/// Parse `diff-tree -r -z -M` raw output into change records.
pub fn parse_diff_tree(raw: &str) -> Result<Vec<ChangeRecord>, RepoError> {
    let mut records = Vec::new();
    let mut tokens = raw.split('\0').filter(|t| !t.is_empty()).peekable();

    while let Some(header) = tokens.next() {
        let header = header
            .strip_prefix(':')
            .ok_or_else(|| RepoError::Parse(format!("diff record without colon: {header:?}")))?;
        let fields: Vec<&str> = header.split(' ').collect();
        if fields.len() != 5 {
            return Err(RepoError::Parse(format!(
                "diff record has {} fields, expected 5: {header:?}",
                fields.len()
            )));
        }
        let (src_oid, dst_oid, status) = (fields[2], fields[3], fields[4]);
        let path = tokens
            .next()
            .ok_or_else(|| RepoError::Parse("diff record missing path".into()))?;

        // Status is a letter, optionally followed by a similarity score (R87).
        let record = match status.chars().next() {
            Some('A') => ChangeRecord {
                kind: ChangeKind::Added,
                before: None,
                after: Some(ContentRef::file(path, ContentSource::Repository(dst_oid.into()))),
            },
            // Type changes rewrite the entry in place; treat as modification.
            Some('M') | Some('T') => ChangeRecord {
                kind: ChangeKind::Modified,
                before: Some(ContentRef::file(path, ContentSource::Repository(src_oid.into()))),
                after: Some(ContentRef::file(path, ContentSource::Repository(dst_oid.into()))),
            },
            Some('D') => ChangeRecord {
                kind: ChangeKind::Deleted,
                before: Some(ContentRef::file(path, ContentSource::Repository(src_oid.into()))),
                after: None,
            },
            Some('R') | Some('C') => {
                let dst_path = tokens
                    .next()
                    .ok_or_else(|| RepoError::Parse("rename record missing target path".into()))?;
                let after = Some(ContentRef::file(
                    dst_path,
                    ContentSource::Repository(dst_oid.into()),
                ));
                if status.starts_with('C') {
                    // Copies leave the source untouched: only the new path changes.
                    ChangeRecord {
                        kind: ChangeKind::Added,
                        before: None,
                        after,
                    }
                } else {
                    ChangeRecord {
                        kind: ChangeKind::Renamed,
                        before: Some(ContentRef::file(
                            path,
                            ContentSource::Repository(src_oid.into()),
                        )),
                        after,
                    }
                }
            }
            other => {
                return Err(RepoError::Parse(format!(
                    "unknown diff status {other:?} in {header:?}"
                )));
            }
        };
        records.push(record);
    }
    Ok(records)
}

/// Parse `log --format=%H %ct` output (newest first) into history events,
/// reordered oldest-first.
pub fn parse_history(raw: &str) -> Result<Vec<HistoryEvent>, RepoError> {
    let mut events = Vec::new();
    for line in raw.lines().filter(|l| !l.trim().is_empty()) {
        let (hash, seconds) = line
            .split_once(' ')
            .ok_or_else(|| RepoError::Parse(format!("history line without timestamp: {line:?}")))?;
        let seconds: i64 = seconds
            .trim()
            .parse()
            .map_err(|_| RepoError::Parse(format!("bad unix timestamp: {line:?}")))?;
        let timestamp = DateTime::<Utc>::from_timestamp(seconds, 0)
            .ok_or_else(|| RepoError::Parse(format!("timestamp out of range: {line:?}")))?;
        events.push(HistoryEvent {
            revision: hash.to_string(),
            timestamp,
        });
    }
    events.reverse();
    Ok(events)
}
