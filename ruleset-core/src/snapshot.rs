use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::memory::Environment;

/// Errors that can occur while reading or writing an environment snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Snapshot JSON could not be decoded or encoded.
    #[error("invalid snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// Failed to read or write the snapshot file.
    #[error("failed to access snapshot file: {0}")]
    Io(#[from] std::io::Error),
}

/// Parse snapshot JSON bytes into an [`Environment`].
pub fn parse_snapshot(bytes: &[u8]) -> Result<Environment, SnapshotError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Read an [`Environment`] from a snapshot file.
pub fn load_snapshot(path: &Path) -> Result<Environment, SnapshotError> {
    let bytes = fs::read(path)?;
    parse_snapshot(&bytes)
}

/// Write `env` to `path` as pretty-printed JSON.
pub fn save_snapshot(env: &Environment, path: &Path) -> Result<(), SnapshotError> {
    let mut json = serde_json::to_string_pretty(env)?;
    json.push('\n');
    fs::write(path, json)?;
    Ok(())
}
