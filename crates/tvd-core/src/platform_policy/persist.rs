//! Persist PlatformPolicy to disk (JSON under XDG state dir) so tuning survives restarts.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::{PlatformEntry, PlatformPolicy};

/// Snapshot of PlatformPolicy for JSON serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedPlatformPolicy {
    #[serde(default = "default_version")]
    pub version: u8,
    pub entries: BTreeMap<String, PlatformEntry>,
}

fn default_version() -> u8 {
    1
}

impl PlatformPolicy {
    /// Default path: `~/.local/state/tvd/platform_policy.json`.
    pub fn default_path() -> Result<PathBuf> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("tvd")?;
        Ok(xdg_dirs.get_state_home().join("platform_policy.json"))
    }

    pub fn to_snapshot(&self) -> PersistedPlatformPolicy {
        PersistedPlatformPolicy {
            version: 1,
            entries: self.entries.clone(),
        }
    }

    /// Restore from a snapshot. Bounds come from the caller so config always wins.
    pub fn from_snapshot(snapshot: PersistedPlatformPolicy, min_limit: usize, max_limit: usize) -> Self {
        let mut policy = PlatformPolicy::new(min_limit, max_limit);
        let (min, max) = (policy.min_limit, policy.max_limit);
        policy.entries = snapshot
            .entries
            .into_iter()
            .map(|(k, mut e)| {
                e.adaptive_limit = e.adaptive_limit.clamp(min, max);
                (k, e)
            })
            .collect();
        policy
    }

    /// Save current policy to the given path (creates parent dir if needed).
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| format!("create dir: {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(&self.to_snapshot()).context("serialize platform policy")?;
        std::fs::write(path, json).with_context(|| format!("write platform policy: {}", path.display()))?;
        Ok(())
    }

    /// Load from `path`; Ok(None) when the file does not exist.
    pub fn load_from_path(path: &Path, min_limit: usize, max_limit: usize) -> Result<Option<Self>> {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("read platform policy: {}", path.display())),
        };
        let snapshot: PersistedPlatformPolicy = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse platform policy: {}", path.display()))?;
        Ok(Some(Self::from_snapshot(snapshot, min_limit, max_limit)))
    }

    /// Load from `path`, falling back to a fresh policy when missing or unreadable.
    pub fn load_or_new(path: &Path, min_limit: usize, max_limit: usize) -> Self {
        match Self::load_from_path(path, min_limit, max_limit) {
            Ok(Some(p)) => p,
            Ok(None) => Self::new(min_limit, max_limit),
            Err(e) => {
                tracing::warn!("platform policy unreadable, starting fresh: {:#}", e);
                Self::new(min_limit, max_limit)
            }
        }
    }
}
