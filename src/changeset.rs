//! Change tracking between content revisions.
//!
//! A [`ChangeSet`] partitions the paths that changed since the last build into
//! `modified` (compile or copy) and `deleted` (remove from output). The build
//! engine consumes it directory by directory via [`ChangeSet::pop`], which
//! extracts one directory's slice and subtracts it from the whole; every
//! changed path is handed out exactly once across a full traversal.
//!
//! ## Identity
//!
//! All set operations compare entries **by path**, never by content id. Two
//! changesets are equal when their underlying path partitions match, even if
//! the blob ids behind them differ. This is what makes re-running a diff
//! against the same revision pair idempotent.
//!
//! ## Construction
//!
//! - [`ChangeSet::from_snapshot`]: first build or forced full rebuild;
//!   every file in the tree is `modified`, nothing is `deleted`.
//! - [`ChangeSet::from_revision_diff`]: incremental build; added/modified
//!   records land in `modified`, deletions in `deleted`, and a rename
//!   contributes to both (old path deleted, new path modified).
//!
//! The two sets are always disjoint by path. When a diff reports the same
//! path both removed and re-introduced, the modification wins.

use crate::repo::{ChangeKind, ChangeRecord, Tree};
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

/// What kind of tree entry a [`ContentRef`] points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// Where an entry's bytes come from.
///
/// Tracked content carries a stable blob id from the repository; untracked
/// working content (the theme during local preview, generated listings) is
/// addressed by plain filesystem path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSource {
    Repository(String),
    Filesystem(PathBuf),
}

/// A reference to one tracked entry: its repository-relative path, its kind,
/// and a handle to its content.
///
/// Equality and hashing are by `path` only. The content repository owns the
/// underlying data; a `ContentRef` is a transient handle resolved fresh each
/// build.
#[derive(Debug, Clone)]
pub struct ContentRef {
    pub path: String,
    pub kind: EntryKind,
    pub source: ContentSource,
}

impl ContentRef {
    pub fn file(path: impl Into<String>, source: ContentSource) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::File,
            source,
        }
    }

    pub fn directory(path: impl Into<String>, source: ContentSource) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Directory,
            source,
        }
    }

    /// File name component of the path.
    pub fn name(&self) -> &str {
        match self.path.rfind('/') {
            Some(i) => &self.path[i + 1..],
            None => &self.path,
        }
    }
}

impl PartialEq for ContentRef {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for ContentRef {}

impl Hash for ContentRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

/// Direct parent directory of a repository-relative path. Top-level entries
/// have the empty string as parent.
pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[..i],
        None => "",
    }
}

/// The paths changed since a recorded revision, split into modified and
/// deleted. Scoped to a single build: constructed once, consumed via
/// [`pop`](ChangeSet::pop) during traversal, then discarded.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    /// Revision the set was computed against (`None` for working snapshots).
    pub revision: Option<String>,
    modified: Vec<ContentRef>,
    deleted: Vec<ContentRef>,
}

impl ChangeSet {
    /// Full-tree changeset: every file entry becomes a modification.
    ///
    /// Used when no prior revision exists or a global recompile is forced
    /// (including the theme-change policy in the engine).
    pub fn from_snapshot(tree: &Tree) -> Self {
        let mut set = Self {
            revision: Some(tree.revision.clone()),
            ..Self::default()
        };
        for entry in &tree.entries {
            if entry.kind == EntryKind::File {
                set.insert_modified(entry.clone());
            }
        }
        set
    }

    /// Changeset from a revision-to-revision diff.
    ///
    /// Renames are not move-in-place: the old path lands in `deleted` and the
    /// new path in `modified`.
    pub fn from_revision_diff(to_rev: &str, records: &[ChangeRecord]) -> Self {
        let mut set = Self {
            revision: Some(to_rev.to_string()),
            ..Self::default()
        };
        for record in records {
            match record.kind {
                ChangeKind::Added | ChangeKind::Modified => {
                    if let Some(after) = &record.after {
                        set.insert_modified(after.clone());
                    }
                }
                ChangeKind::Deleted => {
                    if let Some(before) = &record.before {
                        set.insert_deleted(before.clone());
                    }
                }
                ChangeKind::Renamed => {
                    if let Some(before) = &record.before {
                        set.insert_deleted(before.clone());
                    }
                    if let Some(after) = &record.after {
                        set.insert_modified(after.clone());
                    }
                }
            }
        }
        set
    }

    pub fn modified(&self) -> &[ContentRef] {
        &self.modified
    }

    pub fn deleted(&self) -> &[ContentRef] {
        &self.deleted
    }

    /// Total number of changed paths.
    pub fn len(&self) -> usize {
        self.modified.len() + self.deleted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modified.is_empty() && self.deleted.is_empty()
    }

    /// Whether the given path appears anywhere in the set.
    pub fn contains_path(&self, path: &str) -> bool {
        self.modified.iter().any(|r| r.path == path) || self.deleted.iter().any(|r| r.path == path)
    }

    /// Entries whose direct parent directory is `base` (not recursive).
    ///
    /// `base` is normalized by trimming leading and trailing separators, so
    /// `"a/b"`, `"/a/b"` and `"a/b/"` all select the same directory.
    pub fn filter(&self, base: &str) -> Self {
        let base = base.trim_matches('/');
        Self {
            revision: self.revision.clone(),
            modified: self
                .modified
                .iter()
                .filter(|r| parent_dir(&r.path) == base)
                .cloned()
                .collect(),
            deleted: self
                .deleted
                .iter()
                .filter(|r| parent_dir(&r.path) == base)
                .cloned()
                .collect(),
        }
    }

    /// Extract the sub-changeset for `base` and remove it from `self`.
    ///
    /// This is the consuming form of [`filter`](Self::filter): across a full
    /// traversal the pops partition the original set, so no path is processed
    /// twice.
    pub fn pop(&mut self, base: &str) -> Self {
        let sub = self.filter(base);
        self.subtract(&sub);
        sub
    }

    /// Remove every path present in `other` from both sets. Structural: match
    /// is by path equality, not content id.
    pub fn subtract(&mut self, other: &Self) {
        self.modified
            .retain(|r| !other.modified.iter().any(|o| o.path == r.path));
        self.deleted
            .retain(|r| !other.deleted.iter().any(|o| o.path == r.path));
    }

    fn insert_modified(&mut self, entry: ContentRef) {
        self.deleted.retain(|r| r.path != entry.path);
        if !self.modified.iter().any(|r| r.path == entry.path) {
            self.modified.push(entry);
        }
    }

    fn insert_deleted(&mut self, entry: ContentRef) {
        if self.modified.iter().any(|r| r.path == entry.path) {
            return;
        }
        if !self.deleted.iter().any(|r| r.path == entry.path) {
            self.deleted.push(entry);
        }
    }
}

impl PartialEq for ChangeSet {
    /// Path equality: the two partitions cover the same paths, content ids
    /// notwithstanding.
    fn eq(&self, other: &Self) -> bool {
        fn paths(refs: &[ContentRef]) -> Vec<&str> {
            let mut v: Vec<&str> = refs.iter().map(|r| r.path.as_str()).collect();
            v.sort_unstable();
            v
        }
        paths(&self.modified) == paths(&other.modified) && paths(&self.deleted) == paths(&other.deleted)
    }
}

impl Eq for ChangeSet {}
