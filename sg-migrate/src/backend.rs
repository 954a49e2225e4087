use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use ruleset_core::{load_snapshot, save_snapshot, Environment, MemoryProvider};
use sg_migrate::config::Credentials;

/// Snapshot path configured for `role`; no other backend ships.
pub fn snapshot_path<'a>(creds: &'a Credentials, role: &str) -> Result<&'a Path> {
    creds.snapshot.as_deref().ok_or_else(|| {
        anyhow!("{role}.Snapshot is not set; only snapshot-backed environments are supported")
    })
}

pub fn open_environment(creds: &Credentials, role: &str) -> Result<(MemoryProvider, PathBuf)> {
    let path = snapshot_path(creds, role)?;
    let env = load_snapshot(path)
        .with_context(|| format!("failed to load {role} snapshot {}", path.display()))?;
    Ok((MemoryProvider::new(env), path.to_path_buf()))
}

pub fn save_environment(env: &Environment, path: &Path) -> Result<()> {
    save_snapshot(env, path)
        .with_context(|| format!("failed to write snapshot {}", path.display()))
}
