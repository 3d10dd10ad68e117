//! Flat snapshot persistence for configuration trees
//!
//! A snapshot lets a deployment skip the directory scan. Anything wrong
//! with a snapshot (missing, corrupt, other format or version, digest
//! mismatch) makes it count as absent, never as an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::ConfigError;
use crate::tree::ConfigTree;

/// Snapshot format identifier
pub const SNAPSHOT_FORMAT: &str = "kiln/config-snapshot";

/// Snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEnvelope {
    format: String,
    version: u32,
    created_at: DateTime<Utc>,
    /// SHA-256 of the canonical JSON form of `tree`
    digest: String,
    tree: ConfigTree,
}

/// Compute the digest of a tree's canonical JSON form
pub fn tree_digest(tree: &ConfigTree) -> Result<String, ConfigError> {
    let jcs_bytes = serde_json_canonicalizer::to_vec(tree)
        .map_err(|e| ConfigError::Serialize(e.to_string()))?;
    let mut hasher = Sha256::new();
    hasher.update(&jcs_bytes);
    Ok(hex::encode(hasher.finalize()))
}

/// Write `tree` to `target`, creating parent directories.
pub fn write_snapshot(tree: &ConfigTree, target: &Path) -> Result<(), ConfigError> {
    let envelope = SnapshotEnvelope {
        format: SNAPSHOT_FORMAT.to_string(),
        version: SNAPSHOT_VERSION,
        created_at: Utc::now(),
        digest: tree_digest(tree)?,
        tree: tree.clone(),
    };
    let json = serde_json::to_vec(&envelope).map_err(|e| ConfigError::Serialize(e.to_string()))?;

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(target, json).map_err(|source| ConfigError::Io {
        path: target.to_path_buf(),
        source,
    })?;

    info!(path = %target.display(), fragments = tree.len(), "Wrote configuration snapshot");
    Ok(())
}

/// Read a snapshot, `None` if it is missing or unusable.
pub fn load_snapshot(target: &Path) -> Option<ConfigTree> {
    let bytes = match fs::read(target) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(path = %target.display(), error = %e, "No configuration snapshot");
            return None;
        }
    };

    let envelope: SnapshotEnvelope = match serde_json::from_slice(&bytes) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(path = %target.display(), error = %e, "Ignoring unparseable configuration snapshot");
            return None;
        }
    };

    if envelope.format != SNAPSHOT_FORMAT || envelope.version != SNAPSHOT_VERSION {
        warn!(
            path = %target.display(),
            format = %envelope.format,
            version = envelope.version,
            "Ignoring configuration snapshot with foreign format"
        );
        return None;
    }

    match tree_digest(&envelope.tree) {
        Ok(digest) if digest == envelope.digest => Some(envelope.tree),
        _ => {
            warn!(path = %target.display(), "Ignoring configuration snapshot with digest mismatch");
            None
        }
    }
}

/// Use the snapshot when one is given and usable, otherwise scan `root`.
pub fn load_or_build(root: &Path, snapshot: Option<&Path>) -> Result<ConfigTree, ConfigError> {
    if let Some(tree) = snapshot.and_then(load_snapshot) {
        debug!(fragments = tree.len(), "Configuration restored from snapshot");
        return Ok(tree);
    }
    ConfigTree::build(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_tree(dir: &Path) -> ConfigTree {
        fs::write(dir.join("app.toml"), "name = \"demo\"\npaths = [\"lib\"]\nratio = 1.5\n").unwrap();
        fs::write(dir.join("widget.toml"), "kind = \"record\"\ntable = \"widgets\"\n").unwrap();
        ConfigTree::build(dir).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let tree = sample_tree(dir.path());
        let target = dir.path().join("cache/config.snapshot");

        write_snapshot(&tree, &target).unwrap();
        let loaded = load_snapshot(&target).unwrap();
        assert_eq!(loaded, tree);
    }

    #[test]
    fn test_missing_snapshot_is_absent() {
        let dir = TempDir::new().unwrap();
        assert!(load_snapshot(&dir.path().join("none")).is_none());
    }

    #[test]
    fn test_corrupt_snapshot_is_absent() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("config.snapshot");
        fs::write(&target, b"\x00\x01garbage").unwrap();
        assert!(load_snapshot(&target).is_none());
    }

    #[test]
    fn test_version_mismatch_is_absent() {
        let dir = TempDir::new().unwrap();
        let tree = sample_tree(dir.path());
        let target = dir.path().join("config.snapshot");
        write_snapshot(&tree, &target).unwrap();

        let mut value: serde_json::Value = serde_json::from_slice(&fs::read(&target).unwrap()).unwrap();
        value["version"] = serde_json::json!(SNAPSHOT_VERSION + 1);
        fs::write(&target, serde_json::to_vec(&value).unwrap()).unwrap();

        assert!(load_snapshot(&target).is_none());
    }

    #[test]
    fn test_tampered_tree_is_absent() {
        let dir = TempDir::new().unwrap();
        let tree = sample_tree(dir.path());
        let target = dir.path().join("config.snapshot");
        write_snapshot(&tree, &target).unwrap();

        let mut value: serde_json::Value = serde_json::from_slice(&fs::read(&target).unwrap()).unwrap();
        value["tree"]["fragments"]["app"]["name"] = serde_json::json!("tampered");
        fs::write(&target, serde_json::to_vec(&value).unwrap()).unwrap();

        assert!(load_snapshot(&target).is_none());
    }

    #[test]
    fn test_load_or_build_falls_back() {
        let dir = TempDir::new().unwrap();
        let expected = sample_tree(dir.path());
        let target = dir.path().join("broken.snapshot");
        fs::write(&target, "{}").unwrap();

        let tree = load_or_build(dir.path(), Some(&target)).unwrap();
        assert_eq!(tree, expected);
    }

    #[test]
    fn test_load_or_build_prefers_snapshot() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("config");
        fs::create_dir(&config).unwrap();
        let tree = sample_tree(&config);
        let target = dir.path().join("config.snapshot");
        write_snapshot(&tree, &target).unwrap();

        // The snapshot wins even once the directory is gone
        fs::remove_dir_all(&config).unwrap();
        let loaded = load_or_build(&config, Some(&target)).unwrap();
        assert_eq!(loaded, tree);
    }
}
