//! Subcommand implementations

pub mod check;
pub mod run;

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// A program or input file that could not be read
#[derive(Debug, thiserror::Error)]
#[error("cannot read {}", path.display())]
pub struct UnreadableFile {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Read a whole file, tagging failures for the unreadable-file exit code
pub fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| {
        UnreadableFile {
            path: path.to_path_buf(),
            source,
        }
        .into()
    })
}
