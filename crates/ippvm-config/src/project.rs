//! Project Configuration (ippvm.toml)

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Project configuration from ippvm.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Interpreter behaviour
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<RuntimeConfig>,

    /// Input and output streams
    #[serde(skip_serializing_if = "Option::is_none")]
    pub io: Option<IoConfig>,
}

/// `[runtime]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConfig {
    /// DPRINT and BREAK write to stderr (default: true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_output: Option<bool>,

    /// Report execution statistics on exit (default: false)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<bool>,
}

/// `[io]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct IoConfig {
    /// Default READ source, relative to the directory of ippvm.toml
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<PathBuf>,
}

impl ProjectConfig {
    /// Load project configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config = Self::from_toml(&content).map_err(|e| match e {
            ConfigError::TomlParseError { error, .. } => ConfigError::TomlParseError {
                file: path.to_path_buf(),
                error,
            },
            other => other,
        })?;
        Ok(config)
    }

    /// Parse and validate TOML text
    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::TomlParseError {
            file: PathBuf::new(),
            error: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(input) = self.io.as_ref().and_then(|io| io.input.as_ref()) {
            if input.as_os_str().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "io.input".to_string(),
                    reason: "path cannot be empty".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn debug_output(&self) -> Option<bool> {
        self.runtime.as_ref().and_then(|r| r.debug_output)
    }

    pub fn stats(&self) -> Option<bool> {
        self.runtime.as_ref().and_then(|r| r.stats)
    }

    pub fn input(&self) -> Option<&Path> {
        self.io.as_ref().and_then(|io| io.input.as_deref())
    }

    /// Merge another project config into this one.
    /// Values set in `other` win.
    pub fn merge(&mut self, other: &ProjectConfig) {
        if let Some(runtime) = &other.runtime {
            let ours = self.runtime.get_or_insert_with(Default::default);
            if runtime.debug_output.is_some() {
                ours.debug_output = runtime.debug_output;
            }
            if runtime.stats.is_some() {
                ours.stats = runtime.stats;
            }
        }
        if let Some(input) = other.io.as_ref().and_then(|io| io.input.clone()) {
            self.io.get_or_insert_with(Default::default).input = Some(input);
        }
    }
}
