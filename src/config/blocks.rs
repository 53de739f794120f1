//! Named configuration blocks and their on-disk materialization.

use crate::errors::{LaunchError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One named chunk of configuration text.
///
/// Blocks are immutable once created and owned by the run that created
/// them. The order of blocks in the owning collection is significant:
/// a base block must render before an override block in the final
/// argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigBlock {
    name: String,
    lines: Vec<String>,
}

impl ConfigBlock {
    pub fn new(name: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            name: name.into(),
            lines,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// The block's lines joined by single spaces, for inline rendering.
    pub fn inline_text(&self) -> String {
        self.lines.join(" ")
    }
}

/// Write a block's lines (newline-joined) to
/// `<working_dir>/<name>.<ext>`, creating the directory tree as
/// needed. Re-running with the same block name replaces prior content.
///
/// Returns the absolute path written.
///
/// # Errors
///
/// Directory creation or write failure is a fatal
/// `LaunchError::Materialization`; a missing config file would corrupt
/// the downstream command, so this is never swallowed.
pub fn materialize(block: &ConfigBlock, working_dir: &Path, ext: &str) -> Result<PathBuf> {
    let materialization_err = |source: std::io::Error, path: PathBuf| LaunchError::Materialization {
        name: block.name.clone(),
        path,
        source,
    };

    fs::create_dir_all(working_dir)
        .map_err(|e| materialization_err(e, working_dir.to_path_buf()))?;

    let path = working_dir.join(format!("{}.{}", block.name, ext));
    let path = if path.is_absolute() {
        path
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut content = block.lines.join("\n");
    content.push('\n');
    fs::write(&path, content).map_err(|e| materialization_err(e, path.clone()))?;

    debug!(
        block = %block.name,
        path = %path.display(),
        lines = block.lines.len(),
        "Materialized config block"
    );

    Ok(path)
}
