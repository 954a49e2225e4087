use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::resolve::ReferenceMode;
use crate::retry::RetryPolicy;

/// Access settings for one environment.
#[derive(Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    #[serde(rename = "NetworkID")]
    pub network_id: String,
    /// Snapshot file backing this environment, relative to the config file.
    pub snapshot: Option<PathBuf>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("region", &self.region)
            .field("network_id", &self.network_id)
            .field("snapshot", &self.snapshot)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SyncSettings {
    pub retry_attempts: u32,
    pub retry_backoff_ms: u64,
    pub strict_references: bool,
    pub skip_names: Vec<String>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            retry_backoff_ms: 200,
            strict_references: false,
            skip_names: Vec::new(),
        }
    }
}

impl SyncSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_attempts.max(1),
            initial_backoff: Duration::from_millis(self.retry_backoff_ms),
            ..RetryPolicy::default()
        }
    }

    pub fn reference_mode(&self) -> ReferenceMode {
        if self.strict_references {
            ReferenceMode::Strict
        } else {
            ReferenceMode::Lenient
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Config {
    pub source: Credentials,
    pub destination: Credentials,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub sync: SyncSettings,
}

/// Errors returned when loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid config file {path}: {reason}")]
    Invalid { path: String, reason: String },
}

/// Load and validate the configuration at `path`.
///
/// Relative snapshot paths are resolved against the directory holding the
/// config file.
pub fn load_config(path: &Path) -> Result<Config, ConfigLoadError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let mut config = parse_config(&raw, path.display().to_string())?;

    let base = path.parent().unwrap_or_else(|| Path::new(""));
    for creds in [&mut config.source, &mut config.destination] {
        if let Some(snapshot) = creds.snapshot.as_mut() {
            if snapshot.is_relative() {
                *snapshot = base.join(&*snapshot);
            }
        }
    }
    Ok(config)
}

fn parse_config(raw: &str, path: String) -> Result<Config, ConfigLoadError> {
    let config: Config = toml::from_str(raw).map_err(|source| ConfigLoadError::Parse {
        path: path.clone(),
        source,
    })?;
    validate(&config).map_err(|reason| ConfigLoadError::Invalid { path, reason })?;
    Ok(config)
}

fn validate(config: &Config) -> Result<(), String> {
    if config.source.region.trim().is_empty() {
        return Err("Source.Region must not be empty".to_string());
    }
    if config.destination.region.trim().is_empty() {
        return Err("Destination.Region must not be empty".to_string());
    }
    if config.destination.network_id.trim().is_empty() {
        return Err("Destination.NetworkID must not be empty".to_string());
    }
    Ok(())
}
