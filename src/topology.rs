//! Topology snapshots of the submodule tree, cached by root commit.
//!
//! A snapshot captures the tree's structure - parent-child nesting, remote
//! URLs (absolute and, when the manifest used one, relative), and pinned
//! commits - keyed by the root repository's commit SHA. The worktree-merge
//! engine diffs snapshots across branches to warn about structural drift
//! before merging.
//!
//! The cache is a shared, bounded JSON log at
//! `<git-common-dir>/grove/topology.json`; entries are immutable per root
//! commit and pruned FIFO beyond [`DEFAULT_MAX_SNAPSHOTS`].

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::discovery::parse_gitmodules;
use crate::git::{Repo, git_common_dir, run_git};
use crate::lockfile::{atomic_write, read_locked};

pub const DEFAULT_MAX_SNAPSHOTS: usize = 500;

/// A single submodule in a topology snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmoduleEntry {
    pub rel_path: String,
    pub parent_rel_path: String,
    /// Absolute remote URL (relative manifest URLs are resolved).
    pub url: String,
    /// The raw relative URL from the manifest, when one was used.
    pub relative_url: Option<String>,
    /// Pinned commit (short form) at snapshot time.
    pub commit: String,
}

impl SubmoduleEntry {
    /// Key used for topology hashing. Excludes the commit: pins change on
    /// every cascade but do not alter structure.
    fn structure_key(&self) -> (&str, &str, &str) {
        (&self.rel_path, &self.parent_rel_path, &self.url)
    }
}

/// A point-in-time snapshot of the submodule tree structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologySnapshot {
    pub root_commit: String,
    pub timestamp: String,
    pub topology_hash: String,
    pub entries: Vec<SubmoduleEntry>,
}

/// Differences between two topology snapshots, indexed by rel_path.
#[derive(Debug, Default)]
pub struct TopologyDiff {
    pub added: Vec<SubmoduleEntry>,
    pub removed: Vec<SubmoduleEntry>,
    pub changed_url: Vec<(SubmoduleEntry, SubmoduleEntry)>,
    pub changed_relative_url: Vec<(SubmoduleEntry, SubmoduleEntry)>,
    pub changed_commit: Vec<(SubmoduleEntry, SubmoduleEntry)>,
    pub reparented: Vec<(SubmoduleEntry, SubmoduleEntry)>,
}

impl TopologyDiff {
    /// True if there are changes beyond commit-pin churn.
    pub fn has_structural_changes(&self) -> bool {
        !self.added.is_empty()
            || !self.removed.is_empty()
            || !self.changed_url.is_empty()
            || !self.changed_relative_url.is_empty()
            || !self.reparented.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_structural_changes() && self.changed_commit.is_empty()
    }
}

/// SHA-256 over the sorted `(rel_path, parent_rel_path, url)` triples.
///
/// Depends only on the set of triples, not their order, so two snapshots
/// share a hash iff they describe the same structure even when pins differ.
pub fn compute_topology_hash(entries: &[SubmoduleEntry]) -> String {
    let mut keys: Vec<_> = entries.iter().map(|e| e.structure_key()).collect();
    keys.sort();
    let raw = serde_json::to_string(&keys).expect("structure keys serialize");
    let digest = Sha256::digest(raw.as_bytes());
    format!("{digest:x}")
}

/// Compare two snapshots entry-by-entry.
pub fn diff_snapshots(old: &TopologySnapshot, new: &TopologySnapshot) -> TopologyDiff {
    use std::collections::BTreeMap;

    let old_by_path: BTreeMap<&str, &SubmoduleEntry> =
        old.entries.iter().map(|e| (e.rel_path.as_str(), e)).collect();
    let new_by_path: BTreeMap<&str, &SubmoduleEntry> =
        new.entries.iter().map(|e| (e.rel_path.as_str(), e)).collect();

    let mut diff = TopologyDiff::default();

    for (path, entry) in &new_by_path {
        if !old_by_path.contains_key(path) {
            diff.added.push((*entry).clone());
        }
    }
    for (path, entry) in &old_by_path {
        if !new_by_path.contains_key(path) {
            diff.removed.push((*entry).clone());
        }
    }
    for (path, o) in &old_by_path {
        let Some(n) = new_by_path.get(path) else {
            continue;
        };
        if o.url != n.url {
            diff.changed_url.push(((*o).clone(), (*n).clone()));
        }
        if o.relative_url != n.relative_url {
            diff.changed_relative_url.push(((*o).clone(), (*n).clone()));
        }
        if o.parent_rel_path != n.parent_rel_path {
            diff.reparented.push(((*o).clone(), (*n).clone()));
        }
        if o.commit != n.commit {
            diff.changed_commit.push(((*o).clone(), (*n).clone()));
        }
    }

    diff
}

/// Whether a manifest URL is relative (`./` or `../`).
pub fn is_relative_url(url: &str) -> bool {
    url.starts_with("./") || url.starts_with("../")
}

/// Resolve a relative submodule URL against the parent's remote URL.
///
/// Handles the three conventional URL families:
///
/// ```text
/// git@host:Org/parent.git + ../child.git  ->  git@host:Org/child.git
/// https://host/Org/parent + ../child      ->  https://host/Org/child
/// /srv/git/parent         + ../child      ->  /srv/git/child
/// ```
pub fn resolve_relative_url(parent_url: &str, relative: &str) -> String {
    let base = parent_url.strip_suffix(".git").unwrap_or(parent_url);

    // SSH-style URL: user@host:path/to/repo
    if base.contains(':') && !base.starts_with("http://") && !base.starts_with("https://") && !base.starts_with('/') {
        let (host_part, path_part) = base.split_once(':').expect("checked above");
        let mut parts: Vec<&str> = path_part
            .trim_end_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        for segment in relative.split('/') {
            match segment {
                ".." => {
                    parts.pop();
                }
                "" | "." => {}
                other => parts.push(other),
            }
        }
        return format!("{host_part}:{}", parts.join("/"));
    }

    // HTTP(S): same segment arithmetic as SSH, with the host pinned. The
    // first ".." cancels the repo name itself, per git's resolution rules.
    if base.starts_with("http://") || base.starts_with("https://") {
        let (scheme, rest) = base.split_once("://").expect("checked above");
        let mut parts: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
        for segment in relative.split('/') {
            match segment {
                ".." => {
                    // Never pop the host.
                    if parts.len() > 1 {
                        parts.pop();
                    }
                }
                "" | "." => {}
                other => parts.push(other),
            }
        }
        return format!("{scheme}://{}", parts.join("/"));
    }

    // Local path fallback.
    let mut resolved = PathBuf::from(base);
    resolved.pop();
    for segment in relative.split('/') {
        match segment {
            ".." => {
                resolved.pop();
            }
            "" | "." => {}
            other => resolved.push(other),
        }
    }
    resolved.to_string_lossy().into_owned()
}

/// Build snapshot entries from a discovery result.
///
/// For each non-root repo, the parent's `.gitmodules` supplies the URL
/// (resolving relative URLs against the parent's `origin`), and the repo's
/// current short commit supplies the pin.
pub fn build_entries(repos: &[Repo], repo_root: &Path) -> anyhow::Result<Vec<SubmoduleEntry>> {
    let mut entries = Vec::new();

    for repo in repos {
        if repo.path == repo_root {
            continue;
        }
        let Some(parent_idx) = repo.parent else {
            continue;
        };
        let parent = &repos[parent_idx];
        let parent_rel = parent.rel_path();

        let submodule_rel = repo
            .path
            .strip_prefix(&parent.path)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut url = String::new();
        let mut relative_url = None;
        for entry in parse_gitmodules(&parent.path.join(".gitmodules"), None) {
            if entry.path == submodule_rel {
                if is_relative_url(&entry.url) {
                    relative_url = Some(entry.url.clone());
                    let origin = run_git(&parent.path, ["remote", "get-url", "origin"])?;
                    url = if origin.success() {
                        resolve_relative_url(origin.out(), &entry.url)
                    } else {
                        entry.url.clone()
                    };
                } else {
                    url = entry.url.clone();
                }
                break;
            }
        }

        let commit = repo.commit_sha(true)?;

        entries.push(SubmoduleEntry {
            rel_path: repo.rel_path(),
            parent_rel_path: parent_rel,
            url,
            relative_url,
            commit,
        });
    }

    Ok(entries)
}

/// On-disk shape of the cache document.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    snapshots: Vec<TopologySnapshot>,
}

/// The shared topology cache.
#[derive(Debug)]
pub struct TopologyCache {
    cache_path: PathBuf,
    pub snapshots: Vec<TopologySnapshot>,
}

impl TopologyCache {
    pub fn new(cache_path: impl Into<PathBuf>) -> Self {
        Self {
            cache_path: cache_path.into(),
            snapshots: Vec::new(),
        }
    }

    /// Cache for a repository, resolved through the shared `.git` directory
    /// so every worktree sees the same file.
    pub fn for_repo(repo_root: &Path) -> anyhow::Result<Self> {
        Ok(Self::new(
            git_common_dir(repo_root)?.join("grove").join("topology.json"),
        ))
    }

    /// Load snapshots from disk under a shared lock.
    ///
    /// A missing file is an empty cache; a file missing the `snapshots` key
    /// is too. Malformed JSON is an error the caller surfaces as a warning.
    pub fn load(&mut self) -> anyhow::Result<()> {
        if !self.cache_path.exists() {
            self.snapshots = Vec::new();
            return Ok(());
        }
        let content = read_locked(&self.cache_path)?;
        let file: CacheFile = serde_json::from_str(&content)
            .with_context(|| format!("Malformed topology cache: {}", self.cache_path.display()))?;
        self.snapshots = file.snapshots;
        Ok(())
    }

    /// Persist snapshots atomically under an exclusive sibling lock.
    pub fn save(&self) -> anyhow::Result<()> {
        let file = CacheFile {
            snapshots: self.snapshots.clone(),
        };
        let mut data = serde_json::to_string_pretty(&file).context("Failed to serialize cache")?;
        data.push('\n');
        atomic_write(&self.cache_path, &data)
    }

    /// Record a snapshot for `root_commit` from discovered repos.
    ///
    /// The cache is immutable per key: an already-recorded root commit is
    /// left untouched.
    pub fn record(
        &mut self,
        root_commit: &str,
        repos: &[Repo],
        repo_root: &Path,
    ) -> anyhow::Result<()> {
        if self.get(root_commit).is_some() {
            return Ok(());
        }
        let entries = build_entries(repos, repo_root)?;
        let topology_hash = compute_topology_hash(&entries);
        self.snapshots.push(TopologySnapshot {
            root_commit: root_commit.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            topology_hash,
            entries,
        });
        Ok(())
    }

    /// Look up a snapshot by root commit.
    pub fn get(&self, commit: &str) -> Option<&TopologySnapshot> {
        self.snapshots.iter().find(|s| s.root_commit == commit)
    }

    /// Diff two snapshots by root commit; `None` when either is absent.
    pub fn compare(&self, sha1: &str, sha2: &str) -> Option<TopologyDiff> {
        Some(diff_snapshots(self.get(sha1)?, self.get(sha2)?))
    }

    /// Drop the oldest snapshots beyond the cap (FIFO).
    pub fn prune(&mut self, max_entries: usize) {
        if self.snapshots.len() > max_entries {
            let excess = self.snapshots.len() - max_entries;
            self.snapshots.drain(..excess);
        }
    }
}
