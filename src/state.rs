//! Per-worktree engine state documents.
//!
//! Each engine persists one JSON document under the worktree's private
//! control directory (`<git-worktree-dir>/grove/`). The document is written
//! after every observable step, so an interrupted engine always resumes from
//! a well-defined point. The state file doubles as the engine's mutex: an
//! engine refuses to start while its file exists.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::git::git_worktree_dir;
use crate::lockfile::{atomic_write, read_locked};

pub const CASCADE_STATE_FILE: &str = "cascade-state.json";
pub const MERGE_STATE_FILE: &str = "merge-state.json";
pub const SYNC_MERGE_STATE_FILE: &str = "sync-merge-state.json";

/// Path of a state document in the per-worktree control directory.
pub fn state_path(repo_root: &Path, filename: &str) -> anyhow::Result<PathBuf> {
    Ok(git_worktree_dir(repo_root)?.join("grove").join(filename))
}

/// Load a state document under a shared lock.
///
/// A document that exists but does not parse is corrupt persisted state;
/// the error surfaces so the caller refuses to proceed.
pub fn load_state<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = read_locked(path)?;
    serde_json::from_str(&content)
        .with_context(|| format!("Corrupt state file: {}", path.display()))
}

/// Persist a state document atomically under an exclusive lock.
pub fn save_state<T: Serialize>(path: &Path, state: &T) -> anyhow::Result<()> {
    let mut data = serde_json::to_string_pretty(state).context("Failed to serialize state")?;
    data.push('\n');
    atomic_write(path, &data)
}

/// Remove a state document. Missing files are fine (already removed).
pub fn remove_state(path: &Path) -> anyhow::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Doc {
        branch: String,
        count: u32,
    }

    #[test]
    fn round_trips_a_document() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("grove").join("merge-state.json");
        let doc = Doc {
            branch: "feature".into(),
            count: 3,
        };
        save_state(&path, &doc).unwrap();
        let loaded: Doc = load_state(&path).unwrap();
        assert_eq!(loaded, doc);
    }

    #[test]
    fn corrupt_state_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();
        let result: anyhow::Result<Doc> = load_state(&path);
        assert!(result.is_err());
    }

    #[test]
    fn remove_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state.json");
        std::fs::write(&path, "{}").unwrap();
        remove_state(&path).unwrap();
        remove_state(&path).unwrap();
        assert!(!path.exists());
    }
}
