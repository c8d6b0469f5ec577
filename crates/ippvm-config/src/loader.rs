//! Configuration Loader
//!
//! Finds `ippvm.toml` and layers environment overrides on top of it.

use crate::project::{IoConfig, ProjectConfig, RuntimeConfig};
use crate::{ConfigError, ConfigResult, CONFIG_FILE_NAME};
use std::env;
use std::path::{Path, PathBuf};

/// Environment variable overriding `runtime.debug_output`
pub const ENV_DEBUG_OUTPUT: &str = "IPPVM_DEBUG_OUTPUT";
/// Environment variable overriding `runtime.stats`
pub const ENV_STATS: &str = "IPPVM_STATS";
/// Environment variable overriding `io.input`
pub const ENV_INPUT: &str = "IPPVM_INPUT";

/// Configuration loader
///
/// Precedence, lowest first: defaults, `ippvm.toml`, `IPPVM_*` environment
/// variables. CLI flags are applied by the caller on top of the result.
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    /// Skip `IPPVM_*` environment variables
    ignore_env: bool,
}

/// Effective configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub project: ProjectConfig,

    /// Directory containing the ippvm.toml that was loaded
    pub project_root: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader that ignores the environment
    pub fn without_env() -> Self {
        Self { ignore_env: true }
    }

    /// Walk up from `start_dir` to the nearest ippvm.toml, then apply
    /// environment overrides. No file found means defaults.
    pub fn load_from_directory(&self, start_dir: &Path) -> ConfigResult<Config> {
        let (project_root, project) = self.find_project_config(start_dir)?;
        let project = self.apply_env_overrides(project)?;
        Ok(Config {
            project,
            project_root,
        })
    }

    /// Load a specific config file, then apply environment overrides
    pub fn load_from_file(&self, config_path: &Path) -> ConfigResult<Config> {
        let project = ProjectConfig::load_from_file(config_path)?;
        let project = self.apply_env_overrides(project)?;
        Ok(Config {
            project,
            project_root: config_path.parent().map(Path::to_path_buf),
        })
    }

    fn find_project_config(
        &self,
        start_dir: &Path,
    ) -> ConfigResult<(Option<PathBuf>, ProjectConfig)> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);
            if config_path.is_file() {
                let project = ProjectConfig::load_from_file(&config_path)?;
                return Ok((Some(current), project));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok((None, ProjectConfig::default())),
            }
        }
    }

    /// Environment variables: IPPVM_DEBUG_OUTPUT, IPPVM_STATS, IPPVM_INPUT
    fn apply_env_overrides(&self, mut config: ProjectConfig) -> ConfigResult<ProjectConfig> {
        if self.ignore_env {
            return Ok(config);
        }

        let mut overrides = ProjectConfig::default();
        if let Ok(value) = env::var(ENV_DEBUG_OUTPUT) {
            overrides
                .runtime
                .get_or_insert_with(RuntimeConfig::default)
                .debug_output = Some(parse_bool(ENV_DEBUG_OUTPUT, &value)?);
        }
        if let Ok(value) = env::var(ENV_STATS) {
            overrides
                .runtime
                .get_or_insert_with(RuntimeConfig::default)
                .stats = Some(parse_bool(ENV_STATS, &value)?);
        }
        if let Some(value) = env::var_os(ENV_INPUT).filter(|v| !v.is_empty()) {
            // Relative to the working directory, not the project root.
            let input = env::current_dir()?.join(value);
            overrides.io = Some(IoConfig { input: Some(input) });
        }

        config.merge(&overrides);
        Ok(config)
    }
}

fn parse_bool(field: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("expected a boolean, got '{}'", other),
        }),
    }
}

impl Config {
    /// DPRINT and BREAK enabled (default: true)
    pub fn debug_output(&self) -> bool {
        self.project.debug_output().unwrap_or(true)
    }

    /// Report statistics on exit (default: false)
    pub fn stats(&self) -> bool {
        self.project.stats().unwrap_or(false)
    }

    /// Default READ source, resolved against the project root
    pub fn input_path(&self) -> Option<PathBuf> {
        let input = self.project.input()?;
        Some(match &self.project_root {
            Some(root) if input.is_relative() => root.join(input),
            _ => input.to_path_buf(),
        })
    }

    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }

    /// Whether an ippvm.toml was found
    pub fn is_project(&self) -> bool {
        self.project_root.is_some()
    }
}
