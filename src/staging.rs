//! Local staging of tracked content.
//!
//! Every entry touched by a build is first materialized into a staging tree
//! under the meta directory: the bytes are fetched from the content
//! repository (or the working filesystem), and text-like content gets
//! variable substitution applied in place. The renderer and the output copy
//! step both consume the staged copy, never the repository directly.
//!
//! The staging tree is a cache, not a source of truth: it can be deleted at
//! any time and the next build recreates it.
//!
//! ## Substitution
//!
//! `$KEY` placeholders are replaced from a fixed key→value table sourced
//! from configuration (`url_root` is always injected as `$ROOT`).
//! Substitution is safe: an unknown placeholder passes through unchanged
//! rather than failing the build.
//!
//! ## Skipping unchanged copies
//!
//! A JSON manifest (`.staging-manifest.json` in the staging root) maps each
//! logical path to a content key: the repository blob id, or a SHA-256 of
//! the bytes for filesystem sources, combined with a hash of the
//! substitution table. Re-materializing an entry whose key matches and whose
//! staged copy is still on disk is a no-op, which is what makes repeated
//! builds cheap. A missing or corrupt manifest simply means everything is
//! re-staged.

use crate::changeset::ContentSource;
use crate::repo::{ContentRepository, RepoError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Name of the staging manifest file within the staging root.
const MANIFEST_FILENAME: &str = ".staging-manifest.json";

/// Version of the manifest format. Bump to invalidate existing staging
/// trees when the key computation changes.
const MANIFEST_VERSION: u32 = 1;

/// Extensions that receive variable substitution when staged.
const TEXT_EXTENSIONS: &[&str] = &[
    "md", "markdown", "txt", "html", "htm", "css", "js", "xml", "svg", "json", "yml", "yaml",
    "toml", "csv",
];

#[derive(Error, Debug)]
pub enum StagingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("repository error: {0}")]
    Repo(#[from] RepoError),
    #[error("manifest error: {0}")]
    Json(#[from] serde_json::Error),
}

/// On-disk manifest mapping logical paths to content keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StagingManifest {
    version: u32,
    entries: HashMap<String, String>,
}

impl StagingManifest {
    fn empty() -> Self {
        Self {
            version: MANIFEST_VERSION,
            entries: HashMap::new(),
        }
    }

    /// Load from the staging root. Missing, corrupt, or version-mismatched
    /// manifests yield an empty one; everything gets re-staged.
    fn load(staging_root: &Path) -> Self {
        let path = staging_root.join(MANIFEST_FILENAME);
        let Ok(content) = std::fs::read_to_string(&path) else {
            return Self::empty();
        };
        match serde_json::from_str::<Self>(&content) {
            Ok(manifest) if manifest.version == MANIFEST_VERSION => manifest,
            _ => Self::empty(),
        }
    }

    fn save(&self, staging_root: &Path) -> Result<(), StagingError> {
        std::fs::create_dir_all(staging_root)?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(staging_root.join(MANIFEST_FILENAME), json)?;
        Ok(())
    }
}

/// Materializes tracked entries into the staging tree and resolves staged
/// and output locations.
pub struct StagingStore {
    staging_root: PathBuf,
    output_root: PathBuf,
    vars: BTreeMap<String, String>,
    vars_key: String,
    manifest: StagingManifest,
}

impl StagingStore {
    /// Open a staging store. `fresh` discards the persisted manifest so
    /// every entry is re-staged (forced full rebuilds).
    pub fn open(
        staging_root: impl Into<PathBuf>,
        output_root: impl Into<PathBuf>,
        vars: BTreeMap<String, String>,
        fresh: bool,
    ) -> Self {
        let staging_root = staging_root.into();
        let manifest = if fresh {
            StagingManifest::empty()
        } else {
            StagingManifest::load(&staging_root)
        };
        let vars_key = hash_vars(&vars);
        Self {
            staging_root,
            output_root: output_root.into(),
            vars,
            vars_key,
            manifest,
        }
    }

    /// Copy the referenced content into the staging tree, substituting
    /// variables in text-like content. Idempotent: an unchanged entry with
    /// an intact staged copy is skipped; a stale copy is overwritten.
    pub fn materialize<R: ContentRepository + ?Sized>(
        &mut self,
        path: &str,
        source: &ContentSource,
        repo: &R,
    ) -> Result<PathBuf, StagingError> {
        let staged = self.staged_path(path)?;

        let content_key = match source {
            ContentSource::Repository(id) => format!("git:{id}:{}", self.vars_key),
            ContentSource::Filesystem(fs_path) => {
                let bytes = repo.read_content(&ContentSource::Filesystem(fs_path.clone()))?;
                format!("fs:{}:{}", hash_bytes(&bytes), self.vars_key)
            }
        };
        if self.manifest.entries.get(path) == Some(&content_key) && staged.exists() {
            debug!(path, "staged copy up to date");
            return Ok(staged);
        }

        let bytes = repo.read_content(source)?;
        if is_text_like(path) {
            let text = String::from_utf8_lossy(&bytes);
            std::fs::write(&staged, substitute(&text, &self.vars))?;
        } else {
            std::fs::write(&staged, &bytes)?;
        }
        self.manifest.entries.insert(path.to_string(), content_key);
        debug!(path, "materialized into staging");
        Ok(staged)
    }

    /// Stage generated content (listing pages) under a logical path, with
    /// substitution applied. Generated content is always rewritten.
    pub fn stage_generated(&mut self, path: &str, content: &str) -> Result<PathBuf, StagingError> {
        let staged = self.staged_path(path)?;
        std::fs::write(&staged, substitute(content, &self.vars))?;
        self.manifest.entries.remove(path);
        Ok(staged)
    }

    /// Staged location for a logical path. Creates intermediate directories.
    pub fn staged_path(&self, path: &str) -> Result<PathBuf, StagingError> {
        join_creating_parents(&self.staging_root, path)
    }

    /// Output location for a logical path. Creates intermediate directories.
    pub fn output_path(&self, path: &str) -> Result<PathBuf, StagingError> {
        join_creating_parents(&self.output_root, path)
    }

    /// Output location without creating directories (deletion checks).
    pub fn existing_output_path(&self, path: &str) -> PathBuf {
        self.output_root.join(path)
    }

    pub fn save_manifest(&self) -> Result<(), StagingError> {
        self.manifest.save(&self.staging_root)
    }
}

fn join_creating_parents(root: &Path, path: &str) -> Result<PathBuf, StagingError> {
    let full = root.join(path);
    if let Some(parent) = full.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(full)
}

/// Whether staged content gets variable substitution.
pub fn is_text_like(path: &str) -> bool {
    path.rsplit('.')
        .next()
        .map(|ext| TEXT_EXTENSIONS.iter().any(|t| ext.eq_ignore_ascii_case(t)))
        .unwrap_or(false)
}

/// Replace `$KEY` placeholders from the table. Unknown placeholders are
/// left untouched.
pub fn substitute(input: &str, vars: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let key_len = after
            .char_indices()
            .take_while(|(i, c)| {
                if *i == 0 {
                    c.is_ascii_alphabetic() || *c == '_'
                } else {
                    c.is_ascii_alphanumeric() || *c == '_'
                }
            })
            .count();
        let key = &after[..key_len];
        match vars.get(key) {
            Some(value) if !key.is_empty() => {
                out.push_str(value);
                rest = &after[key_len..];
            }
            _ => {
                out.push('$');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Hash of the substitution table; part of every content key so a config
/// change re-stages all text content.
fn hash_vars(vars: &BTreeMap<String, String>) -> String {
    let mut hasher = Sha256::new();
    for (k, v) in vars {
        hasher.update(k.as_bytes());
        hasher.update(b"\0");
        hasher.update(v.as_bytes());
        hasher.update(b"\0");
    }
    format!("{:x}", hasher.finalize())
}
