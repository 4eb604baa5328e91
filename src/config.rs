//! Application configuration loaded from YAML.
//!
//! Every key is optional:
//!
//! ```yaml
//! default_output_dir: outputs
//! strict: true
//! lenient_fallback: true
//! pretty: false
//! ```
//!
//! `HL7_FHIR_OUTPUT_DIR` in the environment (or a `.env` file loaded by the
//! binary) overrides `default_output_dir`.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Environment variable overriding the output directory
pub const OUTPUT_DIR_ENV: &str = "HL7_FHIR_OUTPUT_DIR";

/// Error type for configuration loading
#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    /// The document parsed, but its top level is not a mapping
    NotAMapping { path: PathBuf, found: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "Failed to read config file {}: {}", path.display(), source)
            }
            ConfigError::Yaml { path, source } => {
                write!(f, "Failed to parse YAML in {}: {}", path.display(), source)
            }
            ConfigError::NotAMapping { path, found } => write!(
                f,
                "Config file must contain a mapping at top level, got {}. Config file: {}",
                found,
                path.display()
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Yaml { source, .. } => Some(source),
            ConfigError::NotAMapping { .. } => None,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory for one-file-per-record output
    pub default_output_dir: PathBuf,
    /// Parse input strictly first
    pub strict: bool,
    /// Retry a failed strict parse leniently, with group inference
    pub lenient_fallback: bool,
    /// Pretty-print JSON output by default
    pub pretty: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_output_dir: PathBuf::from("outputs"),
            strict: true,
            lenient_fallback: true,
            pretty: false,
        }
    }
}

impl AppConfig {
    /// Parse configuration from YAML text.
    ///
    /// An empty document gives the defaults.
    pub fn from_yaml_str(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        let yaml: serde_yaml::Value =
            serde_yaml::from_str(contents).map_err(|source| ConfigError::Yaml {
                path: path.to_path_buf(),
                source,
            })?;

        match yaml {
            serde_yaml::Value::Null => Ok(Self::default()),
            serde_yaml::Value::Mapping(_) => {
                serde_yaml::from_value(yaml).map_err(|source| ConfigError::Yaml {
                    path: path.to_path_buf(),
                    source,
                })
            }
            other => Err(ConfigError::NotAMapping {
                path: path.to_path_buf(),
                found: yaml_kind(&other),
            }),
        }
    }

    /// Apply overrides from a variable lookup (normally the process
    /// environment).
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(OUTPUT_DIR_ENV).filter(|d| !d.trim().is_empty()) {
            debug!(dir = %dir, "Output directory overridden from environment");
            self.default_output_dir = PathBuf::from(dir);
        }
        self
    }
}

fn yaml_kind(value: &serde_yaml::Value) -> &'static str {
    match value {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "bool",
        serde_yaml::Value::Number(_) => "number",
        serde_yaml::Value::String(_) => "string",
        serde_yaml::Value::Sequence(_) => "sequence",
        serde_yaml::Value::Mapping(_) => "mapping",
        serde_yaml::Value::Tagged(_) => "tagged value",
    }
}

/// Load configuration, falling back to defaults when no path is given.
///
/// Environment overrides are applied in both cases.
///
/// # Errors
/// Returns [`ConfigError`] if the file cannot be read, is not valid YAML, or
/// its top level is not a mapping.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let config = match path {
        None => AppConfig::default(),
        Some(path) => {
            let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            AppConfig::from_yaml_str(&contents, path)?
        }
    };
    Ok(config.with_overrides(|key| std::env::var(key).ok()))
}
