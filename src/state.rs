//! Persisted build state.
//!
//! The single fact that survives between builds: the identifier of the last
//! revision that was built to completion. It lives as one line of plain text
//! in `current_rev` inside the meta directory. Absence means "never built";
//! the next build compiles the full tree.
//!
//! The marker is written exactly once per build, after traversal and index
//! regeneration have finished without a fatal error, and the write goes
//! through a temp file in the same directory followed by an atomic rename. A
//! crash mid-build (or mid-write) leaves the previous marker intact, so the
//! next run recomputes the same changeset instead of silently skipping work.

use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

/// Marker file name within the meta directory.
const REV_FILENAME: &str = "current_rev";

#[derive(Error, Debug)]
pub enum StateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed revision marker {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

/// Reads and writes the last-built revision marker.
pub struct RevisionStore {
    meta_dir: PathBuf,
}

impl RevisionStore {
    pub fn new(meta_dir: impl Into<PathBuf>) -> Self {
        Self {
            meta_dir: meta_dir.into(),
        }
    }

    fn marker_path(&self) -> PathBuf {
        self.meta_dir.join(REV_FILENAME)
    }

    /// The last successfully built revision, or `None` if never built.
    ///
    /// A marker that exists but does not hold a single revision identifier
    /// is a fatal error: guessing a baseline would make the incremental
    /// diff silently wrong.
    pub fn read(&self) -> Result<Option<String>, StateError> {
        let path = self.marker_path();
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        let revision = content.trim();
        if revision.is_empty() {
            return Err(StateError::Malformed {
                path,
                reason: "empty marker".into(),
            });
        }
        if !revision.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(StateError::Malformed {
                path,
                reason: format!("not a revision identifier: {revision:?}"),
            });
        }
        Ok(Some(revision.to_string()))
    }

    /// Persist the revision marker atomically.
    pub fn write(&self, revision: &str) -> Result<(), StateError> {
        std::fs::create_dir_all(&self.meta_dir)?;
        let mut tmp = NamedTempFile::new_in(&self.meta_dir)?;
        writeln!(tmp, "{revision}")?;
        tmp.persist(self.marker_path()).map_err(|e| e.error)?;
        debug!(revision, "revision marker updated");
        Ok(())
    }
}
