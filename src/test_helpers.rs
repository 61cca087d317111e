//! Shared test doubles for the pagemill test suite.
//!
//! [`FakeRepository`] is an in-memory [`ContentRepository`]: tests register
//! files with content and a commit timestamp, and the engine consumes them
//! exactly as it would a live git repository. [`RecordingRenderer`] stands in
//! for pandoc: it records every invocation and writes the staged source into
//! the output file, so tests can assert on both call order and published
//! content.

use crate::changeset::{ContentRef, ContentSource};
use crate::render::{DocumentRenderer, RenderError};
use crate::repo::{ChangeRecord, ContentRepository, HistoryEvent, RepoError, Tree};
use chrono::DateTime;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;

// =========================================================================
// FakeRepository
// =========================================================================

pub struct FakeRepository {
    head: String,
    files: Vec<ContentRef>,
    contents: HashMap<String, Vec<u8>>,
    histories: HashMap<String, Vec<HistoryEvent>>,
    diffs: HashMap<(String, String), Vec<ChangeRecord>>,
}

impl FakeRepository {
    pub fn new(head: &str) -> Self {
        Self {
            head: head.to_string(),
            files: Vec::new(),
            contents: HashMap::new(),
            histories: HashMap::new(),
            diffs: HashMap::new(),
        }
    }

    /// Register a file with one commit at the given unix timestamp.
    pub fn add_file(&mut self, path: &str, content: &str, committed: i64) {
        let blob = format!("blob-{path}");
        self.contents.insert(blob.clone(), content.as_bytes().to_vec());
        self.files
            .push(ContentRef::file(path, ContentSource::Repository(blob)));
        self.histories.insert(
            path.to_string(),
            vec![HistoryEvent {
                revision: self.head.clone(),
                timestamp: DateTime::from_timestamp(committed, 0).unwrap(),
            }],
        );
    }

    pub fn set_diff(&mut self, from: &str, to: &str, records: Vec<ChangeRecord>) {
        self.diffs
            .insert((from.to_string(), to.to_string()), records);
    }

    pub fn file_ref(&self, path: &str) -> ContentRef {
        self.files
            .iter()
            .find(|f| f.path == path)
            .unwrap_or_else(|| panic!("no such file in fake repository: {path}"))
            .clone()
    }

    pub fn tree(&self) -> Tree {
        Tree {
            revision: self.head.clone(),
            entries: self.files.clone(),
        }
    }
}

impl ContentRepository for FakeRepository {
    fn head(&self) -> Result<String, RepoError> {
        Ok(self.head.clone())
    }

    fn tree_at(&self, revision: &str) -> Result<Tree, RepoError> {
        Ok(Tree {
            revision: revision.to_string(),
            entries: self.files.clone(),
        })
    }

    fn diff(&self, from_rev: &str, to_rev: &str) -> Result<Vec<ChangeRecord>, RepoError> {
        Ok(self
            .diffs
            .get(&(from_rev.to_string(), to_rev.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn history(&self, path: &str) -> Result<Vec<HistoryEvent>, RepoError> {
        Ok(self.histories.get(path).cloned().unwrap_or_default())
    }

    fn read_content(&self, source: &ContentSource) -> Result<Vec<u8>, RepoError> {
        match source {
            ContentSource::Repository(id) => self
                .contents
                .get(id)
                .cloned()
                .ok_or_else(|| RepoError::Unreadable(id.clone())),
            ContentSource::Filesystem(path) => std::fs::read(path)
                .map_err(|e| RepoError::Unreadable(format!("{}: {e}", path.display()))),
        }
    }
}

// =========================================================================
// RecordingRenderer
// =========================================================================

#[derive(Default)]
pub struct RecordingRenderer {
    calls: RefCell<Vec<(String, String, String)>>,
    fail_substrings: RefCell<Vec<String>>,
}

impl RecordingRenderer {
    /// Make every render whose source path contains `needle` fail.
    pub fn fail_on(&self, needle: &str) {
        self.fail_substrings.borrow_mut().push(needle.to_string());
    }

    /// Output paths of all successful and failed invocations, in order.
    pub fn output_paths(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .map(|(_, _, out)| out.clone())
            .collect()
    }
}

impl DocumentRenderer for RecordingRenderer {
    fn render(&self, source: &Path, template: &Path, output: &Path) -> Result<(), RenderError> {
        let source_str = source.display().to_string();
        self.calls.borrow_mut().push((
            source_str.clone(),
            template.display().to_string(),
            output.display().to_string(),
        ));
        if self
            .fail_substrings
            .borrow()
            .iter()
            .any(|n| source_str.contains(n.as_str()))
        {
            return Err(RenderError::Failed {
                status: 1,
                stderr: "simulated renderer failure".into(),
            });
        }
        let body = std::fs::read_to_string(source).unwrap_or_default();
        std::fs::write(output, format!("<rendered>{body}</rendered>"))
            .expect("write rendered output");
        Ok(())
    }
}
