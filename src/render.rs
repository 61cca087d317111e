//! External document rendering.
//!
//! Rendering a document source into its published form is delegated to an
//! out-of-process converter behind the [`DocumentRenderer`] trait. The
//! production implementation ([`PandocRenderer`]) shells out to pandoc:
//!
//! ```text
//! pandoc -s --template <theme> -o <output> <source>
//! ```
//!
//! Each invocation is blocking; the engine waits for completion before the
//! next entry. A non-zero exit status signals failure; the engine logs it
//! and leaves that one output stale, the build continues.
//!
//! This module also owns the source→output extension mapping: document
//! sources (`.md`, `.markdown`) publish as `.html`, everything else keeps
//! its name verbatim.

use std::io;
use std::path::Path;
use std::process::Command;
use thiserror::Error;

/// Extensions recognized as document sources to be rendered.
pub const SOURCE_EXTENSIONS: &[&str] = &["md", "markdown"];

/// Extension of rendered output documents.
pub const OUTPUT_EXTENSION: &str = "html";

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("failed to invoke renderer '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("renderer exited with status {status}: {stderr}")]
    Failed { status: i32, stderr: String },
}

/// Converts one source document plus a template into one output document.
pub trait DocumentRenderer {
    fn render(&self, source: &Path, template: &Path, output: &Path) -> Result<(), RenderError>;
}

/// Pandoc invoked as a subprocess.
pub struct PandocRenderer {
    program: String,
}

impl PandocRenderer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for PandocRenderer {
    fn default() -> Self {
        Self::new("pandoc")
    }
}

impl DocumentRenderer for PandocRenderer {
    fn render(&self, source: &Path, template: &Path, output: &Path) -> Result<(), RenderError> {
        let result = Command::new(&self.program)
            .arg("-s")
            .arg("--template")
            .arg(template)
            .arg("-o")
            .arg(output)
            .arg(source)
            .output()
            .map_err(|source| RenderError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if result.status.success() {
            Ok(())
        } else {
            Err(RenderError::Failed {
                status: result.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            })
        }
    }
}

/// Whether a repository-relative path is a document source.
pub fn is_document_source(path: &str) -> bool {
    extension(path)
        .map(|ext| SOURCE_EXTENSIONS.iter().any(|s| ext.eq_ignore_ascii_case(s)))
        .unwrap_or(false)
}

/// Map a source path to its output path. Document sources swap their
/// extension for [`OUTPUT_EXTENSION`]; other files pass through unchanged.
pub fn output_name(path: &str) -> String {
    if is_document_source(path) {
        let stem_end = path.rfind('.').unwrap_or(path.len());
        format!("{}.{OUTPUT_EXTENSION}", &path[..stem_end])
    } else {
        path.to_string()
    }
}

fn extension(path: &str) -> Option<&str> {
    let name = match path.rfind('/') {
        Some(i) => &path[i + 1..],
        None => path,
    };
    name.rfind('.').map(|i| &name[i + 1..]).filter(|e| !e.is_empty())
}
