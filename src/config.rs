//! Site configuration.
//!
//! Loaded from a single TOML file (`pagemill.toml` by default). Every option
//! has a sensible default; a missing config file means "all defaults", and
//! unknown keys are rejected to catch typos early.
//!
//! ```toml
//! [paths]
//! repository = "content"     # Git repository holding the source tree
//! output = "dist"            # Published output tree
//! meta = ".pagemill"         # Staging, logs, and the revision marker
//!
//! [site]
//! url_root = "/"             # Injected into content as $ROOT
//! theme = "theme.html"       # Template path inside the repository
//! index_order = "descending" # Numbering direction in generated listings
//! date_formats = ["%Y-%m-%d", "%d %B %Y", "%B %d, %Y", "%d/%m/%Y"]
//!
//! # Substitution variables, applied to text content as $KEY
//! [vars]
//! AUTHOR = "A. Writer"
//!
//! # Per-directory ignore lists, keyed by directory path ("" = top level)
//! [ignores]
//! "" = ["README.md"]
//! "notes" = ["scratch.md"]
//!
//! # Directories that receive generated listing pages (with their
//! # subdirectories). Empty = every directory.
//! sections = []
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    pub paths: PathsConfig,
    pub site: SiteSettings,
    /// Substitution variables applied to staged text content.
    pub vars: BTreeMap<String, String>,
    /// Names excluded from processing, keyed by directory path.
    pub ignores: BTreeMap<String, Vec<String>>,
    /// Directories (and their subtrees) that receive generated listings.
    /// Empty means every directory.
    pub sections: Vec<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            site: SiteSettings::default(),
            vars: BTreeMap::new(),
            ignores: BTreeMap::new(),
            sections: Vec::new(),
        }
    }
}

/// Filesystem layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub repository: PathBuf,
    pub output: PathBuf,
    pub meta: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            repository: "content".into(),
            output: "dist".into(),
            meta: ".pagemill".into(),
        }
    }
}

/// Rendering and listing behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteSettings {
    /// Site root URL, injected into substitution as `$ROOT`.
    pub url_root: String,
    /// Repository-relative path of the theme template.
    pub theme: String,
    /// Numbering direction for generated listings.
    pub index_order: IndexOrder,
    /// Date formats tried, in order, when parsing explicit date directives
    /// and dates embedded in titles (chrono strftime syntax).
    pub date_formats: Vec<String>,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            url_root: "/".into(),
            theme: "theme.html".into(),
            index_order: IndexOrder::Descending,
            date_formats: default_date_formats(),
        }
    }
}

fn default_date_formats() -> Vec<String> {
    ["%Y-%m-%d", "%d %B %Y", "%B %d, %Y", "%d/%m/%Y"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Numbering direction for generated listing pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IndexOrder {
    Ascending,
    #[default]
    Descending,
}

impl SiteConfig {
    /// Load from `path`, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate config values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.site.theme.trim().is_empty() {
            return Err(ConfigError::Validation("site.theme must not be empty".into()));
        }
        if self.site.date_formats.is_empty() {
            return Err(ConfigError::Validation(
                "site.date_formats must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Whether `name` inside `dir` is excluded from processing.
    pub fn ignored(&self, dir: &str, name: &str) -> bool {
        let dir = dir.trim_matches('/');
        self.ignores
            .get(dir)
            .map(|names| names.iter().any(|n| n == name))
            .unwrap_or(false)
    }

    /// Whether `dir` receives a generated listing page. A section covers
    /// its whole subtree.
    pub fn section_enabled(&self, dir: &str) -> bool {
        if self.sections.is_empty() {
            return true;
        }
        let dir = dir.trim_matches('/');
        self.sections.iter().any(|s| {
            let s = s.trim_matches('/');
            dir == s || (!s.is_empty() && dir.starts_with(s) && dir.as_bytes()[s.len()] == b'/')
        })
    }

    /// The substitution table with `$ROOT` injected from `site.url_root`.
    /// An explicit `ROOT` entry in `[vars]` wins.
    pub fn substitution_vars(&self) -> BTreeMap<String, String> {
        let mut vars = self.vars.clone();
        vars.entry("ROOT".into())
            .or_insert_with(|| self.site.url_root.clone());
        vars
    }
}

/// A stock config file with every option documented. Printed by the
/// `gen-config` subcommand.
pub fn stock_config_toml() -> String {
    let defaults = SiteSettings::default();
    format!(
        r#"# pagemill configuration

[paths]
# Git repository holding the source content tree.
repository = "content"
# Published output tree.
output = "dist"
# Staging area, logs, and the last-built revision marker.
meta = ".pagemill"

[site]
# Site root URL; available in content as $ROOT.
url_root = "/"
# Template path inside the repository, applied to every rendered document.
theme = "{theme}"
# Numbering direction in generated listings: "ascending" or "descending".
index_order = "descending"
# Date formats tried when parsing date directives and title dates.
date_formats = ["%Y-%m-%d", "%d %B %Y", "%B %d, %Y", "%d/%m/%Y"]

# Substitution variables, replaced in text content as $KEY.
# Unknown placeholders are left untouched.
[vars]

# Names excluded from processing, keyed by directory path ("" = top level).
# [ignores]
# "" = ["README.md"]

# Directories (and their subtrees) that receive generated listing pages.
# Empty = every directory.
sections = []
"#,
        theme = defaults.theme,
    )
}
