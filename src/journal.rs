//! Append-only engine journals with monthly rotation.
//!
//! Journals live in the shared control directory
//! (`<git-common-dir>/grove/`), so one journal covers every worktree of a
//! repository. Each record is a single line:
//!
//! ```text
//! [2026-08-01T14:03:21] MERGE td: clean merge (1a2b3c4d -> 5e6f7a8b)
//! ```
//!
//! Writers take an exclusive lock per line; concurrent engines interleave
//! lines but never tear one. Nothing ever truncates or rewrites a journal.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::git::git_common_dir;
use crate::lockfile::locked_append;

/// A handle to one engine's journal for the current month.
#[derive(Debug, Clone)]
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    /// Journal for an engine (`"cascade"`, `"merge"`, `"sync"`), named
    /// `<engine>-journal-YYYY-MM.log` so files rotate monthly.
    pub fn for_engine(repo_root: &Path, engine: &str) -> anyhow::Result<Self> {
        let filename = format!("{engine}-journal-{}.log", Utc::now().format("%Y-%m"));
        Ok(Self {
            path: git_common_dir(repo_root)?.join("grove").join(filename),
        })
    }

    /// Journal at an explicit path (used by tests).
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one timestamped record.
    pub fn log(&self, message: impl AsRef<str>) -> anyhow::Result<()> {
        let ts = Utc::now().format("%Y-%m-%dT%H:%M:%S");
        locked_append(&self.path, &format!("[{ts}] {}", message.as_ref()))
    }
}
