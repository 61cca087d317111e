//! The incremental build driver.
//!
//! A build is one recursive, depth-first pass over the content tree. At each
//! directory the engine pops that directory's slice of the changeset, applies
//! deletions, applies modifications, recurses into child directories, and
//! finally (post-order, so children are already final) regenerates the
//! directory's listing page if its own entries changed.
//!
//! ```text
//! revision store ─┐
//!                 ├─> ChangeSet ─> traversal ─> renderer / output tree
//! repository ─────┘                    └─> listings (post-order)
//!                                              └─> revision store (on success)
//! ```
//!
//! ## Ordering
//!
//! Within a directory, deletions run before modifications: a renamed entry
//! contributes both, and the old output must be gone before the new one
//! lands, otherwise a rename whose old and new paths share an output name
//! would delete the fresh output.
//!
//! ## Theme changes
//!
//! The theme template wraps every rendered document, so a change to the
//! theme entry invalidates all previously rendered output. When the theme
//! appears in the changeset the engine discards the targeted set and
//! substitutes a full-snapshot changeset.
//!
//! ## Failure semantics
//!
//! Renderer failures are local: logged, counted, the stale output left in
//! place, the traversal unaffected. Repository access failures are fatal and
//! abort the build; the revision marker is only written after a fully
//! successful pass, so an aborted build recomputes the same changeset next
//! run.

use crate::changeset::{parent_dir, ChangeSet, ContentRef, EntryKind};
use crate::config::SiteConfig;
use crate::index::{self, IndexError, IndexOutcome};
use crate::render::{self, DocumentRenderer};
use crate::repo::{ContentRepository, RepoError, Tree};
use crate::staging::{StagingError, StagingStore};
use crate::state::{RevisionStore, StateError};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("repository error: {0}")]
    Repo(#[from] RepoError),
    #[error("staging error: {0}")]
    Staging(#[from] StagingError),
    #[error("state error: {0}")]
    State(#[from] StateError),
    #[error("listing error: {0}")]
    Index(#[from] IndexError),
    #[error("theme entry '{0}' not found in content tree")]
    MissingTheme(String),
}

/// How a build run is scoped.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Diff against the last built revision instead of compiling the full
    /// tree. Ignored when explicit bounds are given.
    pub incremental: bool,
    /// Explicit baseline revision (overrides the revision store).
    pub from_rev: Option<String>,
    /// Explicit target revision (defaults to head).
    pub to_rev: Option<String>,
}

/// Aggregate counts for one build run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BuildStats {
    /// Modified entries processed (rendered or copied).
    pub modified: u32,
    /// Deleted entries processed.
    pub deleted: u32,
    pub rendered: u32,
    pub copied: u32,
    pub render_failures: u32,
    /// Listing pages regenerated.
    pub listings: u32,
}

impl fmt::Display for BuildStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} compiled, {} copied, {} removed, {} listings",
            self.rendered, self.copied, self.deleted, self.listings
        )?;
        if self.render_failures > 0 {
            write!(f, ", {} failed", self.render_failures)?;
        }
        Ok(())
    }
}

/// Directory structure for one traversal: child directories and file
/// children per directory, covering the current tree **plus** the ancestors
/// of every changed path: a deletion inside a directory that no longer
/// exists must still be visited for its changes to be consumed.
struct TreeWalk {
    children: BTreeMap<String, BTreeSet<String>>,
    files: BTreeMap<String, Vec<ContentRef>>,
}

impl TreeWalk {
    fn new(tree: &Tree, changes: &ChangeSet) -> Self {
        let mut walk = Self {
            children: BTreeMap::new(),
            files: BTreeMap::new(),
        };
        walk.register_dir("");
        for entry in &tree.entries {
            match entry.kind {
                EntryKind::Directory => walk.register_dir(&entry.path),
                EntryKind::File => {
                    let parent = parent_dir(&entry.path).to_string();
                    walk.register_dir(&parent);
                    walk.files.entry(parent).or_default().push(entry.clone());
                }
            }
        }
        for entry in changes.modified().iter().chain(changes.deleted()) {
            walk.register_dir(parent_dir(&entry.path));
        }
        walk
    }

    fn register_dir(&mut self, dir: &str) {
        let mut current = dir.to_string();
        self.children.entry(current.clone()).or_default();
        while !current.is_empty() {
            let parent = parent_dir(&current).to_string();
            self.children
                .entry(parent.clone())
                .or_default()
                .insert(current);
            current = parent;
        }
    }

    fn children_of(&self, dir: &str) -> impl Iterator<Item = &str> {
        self.children
            .get(dir)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    fn files_of(&self, dir: &str) -> &[ContentRef] {
        self.files.get(dir).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// One build pass over the content tree.
pub struct BuildEngine<'a, R: ContentRepository, D: DocumentRenderer> {
    repo: &'a R,
    renderer: &'a D,
    config: &'a SiteConfig,
    staging: StagingStore,
    stats: BuildStats,
}

impl<'a, R: ContentRepository, D: DocumentRenderer> BuildEngine<'a, R, D> {
    pub fn new(repo: &'a R, renderer: &'a D, config: &'a SiteConfig, full: bool) -> Self {
        let staging = StagingStore::open(
            config.paths.meta.join("staging"),
            &config.paths.output,
            config.substitution_vars(),
            full,
        );
        Self {
            repo,
            renderer,
            config,
            staging,
            stats: BuildStats::default(),
        }
    }

    /// Apply a changeset against the given tree snapshot.
    pub fn build(mut self, changes: ChangeSet, tree: &Tree) -> Result<BuildStats, BuildError> {
        let theme_path = self.config.site.theme.as_str();
        let changes = if changes.contains_path(theme_path) {
            info!(theme = theme_path, "theme changed, forcing full rebuild");
            ChangeSet::from_snapshot(tree)
        } else {
            changes
        };

        let theme = tree
            .entries
            .iter()
            .find(|e| e.kind == EntryKind::File && e.path == theme_path)
            .ok_or_else(|| BuildError::MissingTheme(theme_path.to_string()))?;
        let template = self
            .staging
            .materialize(&theme.path, &theme.source, self.repo)?;

        let walk = TreeWalk::new(tree, &changes);
        let mut changes = changes;
        self.build_directory("", &mut changes, &walk, &template)?;
        self.staging.save_manifest()?;
        Ok(self.stats)
    }

    fn build_directory(
        &mut self,
        dir: &str,
        changes: &mut ChangeSet,
        walk: &TreeWalk,
        template: &Path,
    ) -> Result<(), BuildError> {
        let sub = changes.pop(dir);
        if !sub.is_empty() {
            debug!(dir, changed = sub.len(), "applying directory changes");
            // Deletions before modifications: a rename whose old and new
            // paths share an output name must not delete the fresh output.
            for entry in sub.deleted() {
                if self.skipped(dir, entry) {
                    continue;
                }
                self.delete_output(entry)?;
            }
            for entry in sub.modified() {
                if self.skipped(dir, entry) {
                    continue;
                }
                self.apply_modified(entry, template)?;
            }
        }

        for child in walk.children_of(dir) {
            self.build_directory(child, changes, walk, template)?;
        }

        // Post-order: children are final by the time the listing is built.
        // A listing only goes stale when the directory's own entries changed.
        if !sub.is_empty() && self.config.section_enabled(dir) {
            let files: Vec<ContentRef> = walk
                .files_of(dir)
                .iter()
                .filter(|f| f.path != self.config.site.theme)
                .cloned()
                .collect();
            let outcome = index::rebuild(
                dir,
                &files,
                self.repo,
                self.renderer,
                &mut self.staging,
                template,
                self.config,
            )?;
            match outcome {
                IndexOutcome::Generated => self.stats.listings += 1,
                IndexOutcome::RenderFailed => self.stats.render_failures += 1,
                IndexOutcome::Skipped => {}
            }
        }
        Ok(())
    }

    fn skipped(&self, dir: &str, entry: &ContentRef) -> bool {
        if entry.path == self.config.site.theme {
            // The theme is a template, not content.
            return true;
        }
        if self.config.ignored(dir, entry.name()) {
            debug!(path = %entry.path, "ignored");
            return true;
        }
        false
    }

    fn apply_modified(&mut self, entry: &ContentRef, template: &Path) -> Result<(), BuildError> {
        let staged = self
            .staging
            .materialize(&entry.path, &entry.source, self.repo)?;
        let output = self.staging.output_path(&render::output_name(&entry.path))?;
        if render::is_document_source(&entry.path) {
            match self.renderer.render(&staged, template, &output) {
                Ok(()) => {
                    self.stats.rendered += 1;
                    info!(path = %entry.path, output = %output.display(), "compiled");
                }
                Err(e) => {
                    warn!(path = %entry.path, error = %e, "render failed, output left stale");
                    self.stats.render_failures += 1;
                }
            }
        } else {
            std::fs::copy(&staged, &output)?;
            self.stats.copied += 1;
            info!(path = %entry.path, "copied");
        }
        self.stats.modified += 1;
        Ok(())
    }

    fn delete_output(&mut self, entry: &ContentRef) -> Result<(), BuildError> {
        let output = self
            .staging
            .existing_output_path(&render::output_name(&entry.path));
        match std::fs::remove_file(&output) {
            Ok(()) => info!(path = %entry.path, "removed output"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %entry.path, "output already absent")
            }
            Err(e) => return Err(e.into()),
        }
        self.stats.deleted += 1;
        Ok(())
    }
}

/// Compute the changeset a build would apply, without applying it.
///
/// Baseline resolution: an explicit `--from` wins, then the revision store
/// when running incrementally, else the full tree is compiled.
pub fn plan<R: ContentRepository>(
    repo: &R,
    config: &SiteConfig,
    options: &BuildOptions,
) -> Result<(ChangeSet, Tree, String), BuildError> {
    let store = RevisionStore::new(&config.paths.meta);
    let target = match &options.to_rev {
        Some(rev) => rev.clone(),
        None => repo.head()?,
    };
    let tree = repo.tree_at(&target)?;
    let baseline = match &options.from_rev {
        Some(rev) => Some(rev.clone()),
        None if options.incremental => store.read()?,
        None => None,
    };
    let changes = match baseline {
        Some(from) => {
            debug!(from = %from, to = %target, "diffing revisions");
            ChangeSet::from_revision_diff(&target, &repo.diff(&from, &target)?)
        }
        None => ChangeSet::from_snapshot(&tree),
    };
    Ok((changes, tree, target))
}

/// Run a complete build: plan, traverse, and, only on full success,
/// advance the revision marker.
pub fn run_build<R: ContentRepository, D: DocumentRenderer>(
    repo: &R,
    renderer: &D,
    config: &SiteConfig,
    options: &BuildOptions,
) -> Result<BuildStats, BuildError> {
    let (changes, tree, target) = plan(repo, config, options)?;
    info!(
        modified = changes.modified().len(),
        deleted = changes.deleted().len(),
        revision = %target,
        "starting build"
    );
    let engine = BuildEngine::new(repo, renderer, config, !options.incremental);
    let stats = engine.build(changes, &tree)?;
    RevisionStore::new(&config.paths.meta).write(&target)?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changeset::ContentSource;
    use crate::repo::{ChangeKind, ChangeRecord};
    use crate::test_helpers::{FakeRepository, RecordingRenderer};
    use std::fs;
    use tempfile::TempDir;

    fn config_in(tmp: &TempDir) -> SiteConfig {
        let mut config = SiteConfig::default();
        config.paths.repository = tmp.path().join("content");
        config.paths.output = tmp.path().join("dist");
        config.paths.meta = tmp.path().join("meta");
        config
    }

    fn repo_with(files: &[(&str, &str)]) -> FakeRepository {
        let mut repo = FakeRepository::new("rev1");
        repo.add_file("theme.html", "<html>$ROOT</html>", 1_600_000_000);
        for (path, content) in files {
            repo.add_file(path, content, 1_609_459_200); // 2021-01-01
        }
        repo
    }

    // =========================================================================
    // Mixed change: modify a/x.md, delete a/b/y.md
    // =========================================================================

    #[test]
    fn scenario_modify_and_delete_with_listing_rebuild() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(&tmp);
        let repo = repo_with(&[("a/x.md", "# First Post\n\nbody\n")]);
        let renderer = RecordingRenderer::default();

        // a/b/y.md existed at the baseline; its output is still around.
        let stale = config.paths.output.join("a/b/y.html");
        fs::create_dir_all(stale.parent().unwrap()).unwrap();
        fs::write(&stale, "old output").unwrap();

        let changes = ChangeSet::from_revision_diff(
            "rev1",
            &[
                ChangeRecord {
                    kind: ChangeKind::Modified,
                    before: Some(repo.file_ref("a/x.md")),
                    after: Some(repo.file_ref("a/x.md")),
                },
                ChangeRecord {
                    kind: ChangeKind::Deleted,
                    before: Some(ContentRef::file(
                        "a/b/y.md",
                        ContentSource::Repository("gone-blob".into()),
                    )),
                    after: None,
                },
            ],
        );

        let engine = BuildEngine::new(&repo, &renderer, &config, false);
        let stats = engine.build(changes, &repo.tree()).unwrap();

        // x.md compiled via the renderer to x.html.
        assert!(config.paths.output.join("a/x.html").exists());
        // Stale output of the deleted entry removed.
        assert!(!stale.exists());
        assert_eq!(stats.modified, 1);
        assert_eq!(stats.deleted, 1);
        assert_eq!(stats.rendered, 1);
        assert_eq!(stats.render_failures, 0);

        // Post-order: a/b's listing is rebuilt before a's.
        let outputs = renderer.output_paths();
        let b_index = outputs.iter().position(|p| p.ends_with("a/b/index.html"));
        let a_index = outputs.iter().position(|p| p.ends_with("a/index.html"));
        assert!(b_index.unwrap() < a_index.unwrap());

        // a's listing lists x with its title and first-commit date.
        let listing = fs::read_to_string(config.paths.output.join("a/index.html")).unwrap();
        assert!(listing.contains("[First Post](x.html)"));
        assert!(listing.contains("1 January 2021"));
    }

    // =========================================================================
    // Empty changeset / idempotence
    // =========================================================================

    #[test]
    fn empty_changeset_renders_nothing() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(&tmp);
        let repo = repo_with(&[("a/x.md", "# Post\n")]);
        let renderer = RecordingRenderer::default();

        let engine = BuildEngine::new(&repo, &renderer, &config, false);
        let stats = engine.build(ChangeSet::default(), &repo.tree()).unwrap();

        assert_eq!(stats, BuildStats::default());
        assert!(renderer.output_paths().is_empty());
    }

    #[test]
    fn second_build_without_changes_is_a_no_op() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(&tmp);
        let repo = repo_with(&[("a/x.md", "# Post\n")]);
        let renderer = RecordingRenderer::default();

        let engine = BuildEngine::new(&repo, &renderer, &config, false);
        engine
            .build(ChangeSet::from_snapshot(&repo.tree()), &repo.tree())
            .unwrap();
        let first_calls = renderer.output_paths().len();
        assert!(first_calls > 0);

        // No repository change: the next changeset is empty.
        let engine = BuildEngine::new(&repo, &renderer, &config, false);
        engine.build(ChangeSet::default(), &repo.tree()).unwrap();
        assert_eq!(renderer.output_paths().len(), first_calls);
    }

    // =========================================================================
    // Theme policy
    // =========================================================================

    #[test]
    fn theme_change_forces_full_rebuild() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(&tmp);
        let repo = repo_with(&[("a/x.md", "# A\n"), ("b/y.md", "# B\n"), ("note.md", "# N\n")]);
        let renderer = RecordingRenderer::default();

        // Only the theme changed, yet every document gets recompiled.
        let changes = ChangeSet::from_revision_diff(
            "rev1",
            &[ChangeRecord {
                kind: ChangeKind::Modified,
                before: Some(repo.file_ref("theme.html")),
                after: Some(repo.file_ref("theme.html")),
            }],
        );
        let engine = BuildEngine::new(&repo, &renderer, &config, false);
        let stats = engine.build(changes, &repo.tree()).unwrap();

        assert_eq!(stats.rendered, 3);
        assert!(config.paths.output.join("a/x.html").exists());
        assert!(config.paths.output.join("b/y.html").exists());
        assert!(config.paths.output.join("note.html").exists());
    }

    #[test]
    fn missing_theme_is_fatal_before_any_output() {
        let tmp = TempDir::new().unwrap();
        let mut config = config_in(&tmp);
        config.site.theme = "missing-theme.html".into();
        let repo = repo_with(&[("a/x.md", "# A\n")]);
        let renderer = RecordingRenderer::default();

        let engine = BuildEngine::new(&repo, &renderer, &config, false);
        let err = engine
            .build(ChangeSet::from_snapshot(&repo.tree()), &repo.tree())
            .unwrap_err();
        assert!(matches!(err, BuildError::MissingTheme(_)));
        assert!(renderer.output_paths().is_empty());
    }

    // =========================================================================
    // Failure semantics
    // =========================================================================

    #[test]
    fn render_failure_is_local_and_counted() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(&tmp);
        let repo = repo_with(&[("a/bad.md", "# Bad\n"), ("a/good.md", "# Good\n")]);
        let renderer = RecordingRenderer::default();
        renderer.fail_on("bad.md");

        let engine = BuildEngine::new(&repo, &renderer, &config, false);
        let stats = engine
            .build(ChangeSet::from_snapshot(&repo.tree()), &repo.tree())
            .unwrap();

        assert!(stats.render_failures >= 1);
        assert!(config.paths.output.join("a/good.html").exists());
        assert!(!config.paths.output.join("a/bad.html").exists());
    }

    #[test]
    fn unreadable_entry_aborts_the_build() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(&tmp);
        let repo = repo_with(&[]);
        let renderer = RecordingRenderer::default();

        let changes = ChangeSet::from_revision_diff(
            "rev1",
            &[ChangeRecord {
                kind: ChangeKind::Added,
                before: None,
                after: Some(ContentRef::file(
                    "ghost.md",
                    ContentSource::Repository("no-such-blob".into()),
                )),
            }],
        );

        let engine = BuildEngine::new(&repo, &renderer, &config, false);
        let err = engine.build(changes, &repo.tree()).unwrap_err();
        assert!(matches!(err, BuildError::Staging(_)));
    }

    #[test]
    fn deleting_absent_output_is_not_an_error() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(&tmp);
        let repo = repo_with(&[]);
        let renderer = RecordingRenderer::default();

        let changes = ChangeSet::from_revision_diff(
            "rev1",
            &[ChangeRecord {
                kind: ChangeKind::Deleted,
                before: Some(ContentRef::file(
                    "never-built.md",
                    ContentSource::Repository("old".into()),
                )),
                after: None,
            }],
        );
        let engine = BuildEngine::new(&repo, &renderer, &config, false);
        let stats = engine.build(changes, &repo.tree()).unwrap();
        assert_eq!(stats.deleted, 1);
    }

    // =========================================================================
    // Rename ordering
    // =========================================================================

    #[test]
    fn deletions_apply_before_modifications() {
        // x.markdown renamed to x.md: both map to x.html. If the deletion
        // ran second it would wipe the freshly rendered output.
        let tmp = TempDir::new().unwrap();
        let config = config_in(&tmp);
        let repo = repo_with(&[("a/x.md", "# Renamed\n")]);
        let renderer = RecordingRenderer::default();

        let stale = config.paths.output.join("a/x.html");
        fs::create_dir_all(stale.parent().unwrap()).unwrap();
        fs::write(&stale, "old output").unwrap();

        let changes = ChangeSet::from_revision_diff(
            "rev1",
            &[ChangeRecord {
                kind: ChangeKind::Renamed,
                before: Some(ContentRef::file(
                    "a/x.markdown",
                    ContentSource::Repository("old-blob".into()),
                )),
                after: Some(repo.file_ref("a/x.md")),
            }],
        );
        let engine = BuildEngine::new(&repo, &renderer, &config, false);
        engine.build(changes, &repo.tree()).unwrap();

        let content = fs::read_to_string(&stale).unwrap();
        assert_ne!(content, "old output");
    }

    // =========================================================================
    // Ignore lists and sections
    // =========================================================================

    #[test]
    fn ignored_entries_are_not_processed() {
        let tmp = TempDir::new().unwrap();
        let mut config = config_in(&tmp);
        config
            .ignores
            .insert("".into(), vec!["README.md".into()]);
        let repo = repo_with(&[("README.md", "# Readme\n"), ("post.md", "# Post\n")]);
        let renderer = RecordingRenderer::default();

        let engine = BuildEngine::new(&repo, &renderer, &config, false);
        let stats = engine
            .build(ChangeSet::from_snapshot(&repo.tree()), &repo.tree())
            .unwrap();

        assert_eq!(stats.modified, 1);
        assert!(!config.paths.output.join("README.html").exists());
        assert!(config.paths.output.join("post.html").exists());
    }

    #[test]
    fn listings_only_in_enabled_sections() {
        let tmp = TempDir::new().unwrap();
        let mut config = config_in(&tmp);
        config.sections = vec!["blog".into()];
        let repo = repo_with(&[("blog/p.md", "# P\n"), ("notes/n.md", "# N\n")]);
        let renderer = RecordingRenderer::default();

        let engine = BuildEngine::new(&repo, &renderer, &config, false);
        engine
            .build(ChangeSet::from_snapshot(&repo.tree()), &repo.tree())
            .unwrap();

        assert!(config.paths.output.join("blog/index.html").exists());
        assert!(!config.paths.output.join("notes/index.html").exists());
        assert!(!config.paths.output.join("index.html").exists());
    }

    #[test]
    fn explicit_index_never_overwritten() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(&tmp);
        let repo = repo_with(&[("blog/index.md", "# Hand-made\n"), ("blog/p.md", "# P\n")]);
        let renderer = RecordingRenderer::default();

        let engine = BuildEngine::new(&repo, &renderer, &config, false);
        let stats = engine
            .build(ChangeSet::from_snapshot(&repo.tree()), &repo.tree())
            .unwrap();

        // The explicit index is compiled as an ordinary document; no
        // generated listing replaces it.
        assert_eq!(stats.listings, 1); // root only
        let index = fs::read_to_string(config.paths.output.join("blog/index.html")).unwrap();
        assert!(index.contains("Hand-made"));
    }

    #[test]
    fn non_document_content_is_copied_verbatim() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(&tmp);
        let mut repo = repo_with(&[]);
        repo.add_file("css/site.css", "body { color: $ROOT; }", 1_600_000_000);
        let renderer = RecordingRenderer::default();

        let engine = BuildEngine::new(&repo, &renderer, &config, false);
        let stats = engine
            .build(ChangeSet::from_snapshot(&repo.tree()), &repo.tree())
            .unwrap();

        assert_eq!(stats.copied, 1);
        assert_eq!(stats.rendered, 0);
        // Copied through staging, so substitution applied.
        let css = fs::read_to_string(config.paths.output.join("css/site.css")).unwrap();
        assert!(css.contains("color: /"));
    }

    // =========================================================================
    // plan / run_build
    // =========================================================================

    #[test]
    fn plan_without_baseline_is_a_snapshot() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(&tmp);
        let repo = repo_with(&[("a/x.md", "# A\n")]);

        let options = BuildOptions {
            incremental: true,
            ..BuildOptions::default()
        };
        let (changes, _tree, target) = plan(&repo, &config, &options).unwrap();
        assert_eq!(target, "rev1");
        // theme.html + a/x.md
        assert_eq!(changes.modified().len(), 2);
    }

    #[test]
    fn run_build_advances_the_revision_marker() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(&tmp);
        let repo = repo_with(&[("a/x.md", "# A\n")]);
        let renderer = RecordingRenderer::default();

        let options = BuildOptions::default();
        run_build(&repo, &renderer, &config, &options).unwrap();

        let store = RevisionStore::new(&config.paths.meta);
        assert_eq!(store.read().unwrap().as_deref(), Some("rev1"));
    }

    #[test]
    fn incremental_build_uses_stored_baseline() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(&tmp);
        let mut repo = repo_with(&[("a/x.md", "# A\n"), ("a/y.md", "# B\n")]);
        repo.set_diff(
            "rev0",
            "rev1",
            vec![ChangeRecord {
                kind: ChangeKind::Modified,
                before: Some(repo.file_ref("a/x.md")),
                after: Some(repo.file_ref("a/x.md")),
            }],
        );
        RevisionStore::new(&config.paths.meta).write("rev0").unwrap();
        let renderer = RecordingRenderer::default();

        let options = BuildOptions {
            incremental: true,
            ..BuildOptions::default()
        };
        let stats = run_build(&repo, &renderer, &config, &options).unwrap();

        // Only the diffed entry compiled, not the full tree.
        assert_eq!(stats.rendered, 1);
    }

    #[test]
    fn failed_build_leaves_marker_untouched() {
        let tmp = TempDir::new().unwrap();
        let mut config = config_in(&tmp);
        config.site.theme = "missing.html".into();
        let repo = repo_with(&[("a/x.md", "# A\n")]);
        let renderer = RecordingRenderer::default();

        let options = BuildOptions::default();
        assert!(run_build(&repo, &renderer, &config, &options).is_err());
        let store = RevisionStore::new(&config.paths.meta);
        assert_eq!(store.read().unwrap(), None);
    }

    // =========================================================================
    // Stats display
    // =========================================================================

    #[test]
    fn stats_display_without_failures() {
        let stats = BuildStats {
            modified: 5,
            rendered: 4,
            copied: 1,
            deleted: 2,
            listings: 3,
            render_failures: 0,
        };
        assert_eq!(stats.to_string(), "4 compiled, 1 copied, 2 removed, 3 listings");
    }

    #[test]
    fn stats_display_mentions_failures() {
        let stats = BuildStats {
            render_failures: 2,
            ..BuildStats::default()
        };
        assert!(stats.to_string().ends_with("2 failed"));
    }
}
