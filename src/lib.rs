//! # pagemill
//!
//! An incremental static site builder driven by a git content repository.
//! Content lives in git; pagemill diffs the tree against the last built
//! revision, applies only what changed, and regenerates per-directory
//! listing pages that went stale. Rendering is delegated to pandoc.
//!
//! # Architecture: Plan, Apply, Record
//!
//! ```text
//! 1. Plan     revision marker + git diff  →  ChangeSet (modified / deleted)
//! 2. Apply    recursive walk: delete, compile, recurse, rebuild listings
//! 3. Record   revision marker advanced, only after a fully clean pass
//! ```
//!
//! The changeset is consumed directory by directory during the walk
//! ([`changeset::ChangeSet::pop`]), so every changed path is handled exactly
//! once. A failed build never advances the revision marker: the next run
//! recomputes the same changeset and retries.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`changeset`] | `ContentRef` and `ChangeSet`: path-keyed set algebra over changed entries |
//! | [`repo`] | `ContentRepository` trait and the git-CLI-backed implementation |
//! | [`metadata`] | Title and created/updated resolution with fallback chains |
//! | [`staging`] | Local materialization with `$KEY` substitution and skip-unchanged manifest |
//! | [`render`] | `DocumentRenderer` trait, pandoc subprocess, extension mapping |
//! | [`engine`] | The recursive build driver: pop, delete, compile, recurse, list |
//! | [`index`] | Generated listing pages (explicit indexes always win) |
//! | [`state`] | The persisted last-built revision marker |
//! | [`config`] | `pagemill.toml` loading, validation, stock config generation |
//! | [`output`] | CLI report formatting |
//!
//! # Design Decisions
//!
//! ## External collaborators stay external
//!
//! Both hard dependencies (version control and document conversion) are
//! consumed behind one-trait seams and invoked as subprocesses (`git`,
//! `pandoc`). pagemill owns only the incremental logic between them: set
//! algebra, traversal, staging, metadata. Tests swap both seams for
//! in-memory doubles.
//!
//! ## Deletions before modifications
//!
//! A rename contributes a deletion of the old path and a modification of the
//! new one. Within each directory deletions are applied first, so a rename
//! whose old and new paths map to the same output never removes the output
//! it just produced.
//!
//! ## Listings are regenerated, never merged
//!
//! A directory whose entries changed gets its listing rebuilt from scratch
//! out of current metadata: cheap, and always correct. Hand-written
//! `index.md`/`index.html` files win unconditionally; pagemill never touches
//! a directory that carries one.

pub mod changeset;
pub mod config;
pub mod engine;
pub mod index;
pub mod metadata;
pub mod output;
pub mod render;
pub mod repo;
pub mod staging;
pub mod state;

#[cfg(test)]
pub(crate) mod test_helpers;
