//! Run settings resolved from ippvm.toml, the environment and CLI flags

use anyhow::{Context, Result};
use ippvm_config::{Config, ConfigLoader};
use std::env;
use std::path::PathBuf;

/// Flags of the `run` subcommand that override configuration
#[derive(Debug, Clone, Default)]
pub struct RunFlags {
    pub input: Option<PathBuf>,
    pub stats: bool,
    pub no_debug_output: bool,
    pub config: Option<PathBuf>,
}

/// Effective settings for one run
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub debug_output: bool,
    pub stats: bool,
    /// READ source; `None` reads stdin
    pub input: Option<PathBuf>,
}

impl Settings {
    /// Load configuration and apply CLI flags on top
    pub fn resolve(flags: &RunFlags) -> Result<Self> {
        let loader = ConfigLoader::new();
        let config = match &flags.config {
            Some(path) => loader
                .load_from_file(path)
                .with_context(|| format!("Failed to load config: {}", path.display()))?,
            None => {
                let cwd = env::current_dir().context("Failed to get current directory")?;
                loader
                    .load_from_directory(&cwd)
                    .context("Failed to load ippvm.toml")?
            }
        };
        tracing::debug!(project_root = ?config.project_root(), "configuration loaded");
        Ok(Self::from_config(&config, flags))
    }

    pub fn from_config(config: &Config, flags: &RunFlags) -> Self {
        Self {
            debug_output: config.debug_output() && !flags.no_debug_output,
            stats: config.stats() || flags.stats,
            input: flags.input.clone().or_else(|| config.input_path()),
        }
    }
}
