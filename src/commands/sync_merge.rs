//! Merging diverged sync-group instances.
//!
//! When the sync engine finds no linear tip among a group's instances, the
//! diverged commits are merged here, in a workspace (the group's standalone
//! clone when configured, otherwise the first instance). A clean merge
//! hands the merged revision straight back to the sync engine; a conflict
//! pauses with state on disk, following the same state-machine pattern as
//! the cascade and worktree-merge engines.

use std::path::{Path, PathBuf};

use color_print::cformat;
use serde::{Deserialize, Serialize};

use crate::config::SyncGroup;
use crate::git::{find_repo_root, run_git};
use crate::state::{SYNC_MERGE_STATE_FILE, load_state, remove_state, save_state, state_path};
use crate::styling::println;

use super::sync::Instance;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DivergedCommit {
    pub sha: String,
    pub source_path: String,
    pub status: String,
}

/// Persistent state for a sync-group divergence merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncMergeState {
    pub group_name: String,
    pub started_at: String,
    /// Where the merge happens.
    pub workspace_path: String,
    /// Merge-base of the first two diverged commits.
    pub base_commit: String,
    pub diverged_commits: Vec<DivergedCommit>,
    pub merged_sha: Option<String>,
    pub conflict_sha: Option<String>,
}

/// Attempt to merge diverged instances of a sync group.
///
/// Returns `(merged_sha, workspace_path, description)` on a clean merge, or
/// `None` when the merge paused on a conflict (state persisted) or could
/// not start.
pub fn attempt_divergence_merge(
    group: &SyncGroup,
    instances: &[Instance],
    repo_root: &Path,
    dry_run: bool,
) -> anyhow::Result<Option<(String, PathBuf, String)>> {
    let state_file = state_path(repo_root, SYNC_MERGE_STATE_FILE)?;
    if state_file.exists() {
        println!("{}", cformat!("<red>A sync merge is already in progress.</>"));
        println!(
            "Use {} to see current state.",
            cformat!("<blue>grove sync --status</>")
        );
        println!("Use {} to cancel it.", cformat!("<blue>grove sync --abort</>"));
        return Ok(None);
    }

    // Collect unique diverged commits, first occurrence wins.
    let mut commits: Vec<(String, PathBuf)> = Vec::new();
    for instance in instances {
        if let Some(sha) = instance.current_commit.clone()
            && !commits.iter().any(|(s, _)| *s == sha)
        {
            commits.push((sha, instance.path.clone()));
        }
    }

    if commits.len() < 2 {
        println!(
            "{}",
            cformat!("<red>Error: Expected diverged commits but found fewer than 2.</>")
        );
        return Ok(None);
    }

    // Workspace: standalone clone when configured, else the first instance.
    let (workspace, workspace_desc) = match &group.standalone_repo {
        Some(path) if path.exists() => (path.clone(), format!("standalone repo ({})", path.display())),
        _ => {
            let first = commits[0].1.clone();
            let desc = format!("instance ({})", first.display());
            (first, desc)
        }
    };

    let shas: Vec<String> = commits.iter().map(|(s, _)| s.clone()).collect();

    println!(
        "{}",
        cformat!(
            "<blue>Attempting to merge {} diverged commits...</>",
            shas.len()
        )
    );
    println!("Workspace: {workspace_desc}");
    for (sha, path) in &commits {
        let rel = path
            .strip_prefix(repo_root)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|_| path.display().to_string());
        println!("  {} from {rel}", &sha[..sha.len().min(8)]);
    }
    println!();

    if dry_run {
        println!(
            "{}",
            cformat!("<yellow>(dry-run) Would attempt merge in workspace.</>")
        );
        return Ok(Some((
            shas[0].clone(),
            workspace,
            format!("dry-run merge of {} diverged commits", shas.len()),
        )));
    }

    // Bring every diverged commit into the workspace.
    for (sha, source) in &commits {
        if source != &workspace {
            let source_str = source.display().to_string();
            let result = run_git(&workspace, ["fetch", source_str.as_str(), sha.as_str()])?;
            if !result.success() {
                println!(
                    "{}",
                    cformat!(
                        "  <yellow>Warning: Could not fetch {} from {}</>",
                        &sha[..sha.len().min(8)],
                        source.display()
                    )
                );
            }
        }
    }

    let mb = run_git(&workspace, ["merge-base", shas[0].as_str(), shas[1].as_str()])?;
    if !mb.success() {
        println!(
            "{}",
            cformat!("<red>Error: Could not find merge-base for diverged commits.</>")
        );
        return Ok(None);
    }
    let base_commit = mb.out().to_string();

    // Merge the remaining commits onto the first: two-way for one
    // remainder, octopus otherwise.
    run_git(&workspace, ["checkout", shas[0].as_str(), "--quiet"])?;

    let remaining = &shas[1..];
    let message = if remaining.len() == 1 {
        format!("grove sync: merge diverged instances of '{}'", group.name)
    } else {
        format!(
            "grove sync: merge {} diverged instances of '{}'",
            shas.len(),
            group.name
        )
    };
    let mut merge_args = vec!["merge".to_string()];
    merge_args.extend(remaining.iter().cloned());
    merge_args.push("-m".to_string());
    merge_args.push(message);
    let merge_result = run_git(&workspace, merge_args.iter().map(|s| s.as_str()))?;

    if merge_result.success() {
        let merged = run_git(&workspace, ["rev-parse", "HEAD"])?;
        let merged_sha = merged.out().to_string();
        println!(
            "{}",
            cformat!(
                "<green>Merge successful: {}</>",
                &merged_sha[..merged_sha.len().min(8)]
            )
        );
        return Ok(Some((
            merged_sha,
            workspace,
            format!("merged {} diverged instances", shas.len()),
        )));
    }

    // Conflict: persist state for --continue / --abort.
    println!("{}", cformat!("<yellow>Merge conflict detected.</>"));
    println!();

    let diverged_commits = commits
        .iter()
        .map(|(sha, path)| DivergedCommit {
            sha: sha.clone(),
            source_path: path.display().to_string(),
            status: "diverged".to_string(),
        })
        .collect();

    let state = SyncMergeState {
        group_name: group.name.clone(),
        started_at: chrono::Utc::now().to_rfc3339(),
        workspace_path: workspace.display().to_string(),
        base_commit,
        diverged_commits,
        merged_sha: None,
        conflict_sha: (remaining.len() == 1).then(|| remaining[0].clone()),
    };
    save_state(&state_file, &state)?;

    println!(
        "Resolve conflicts in: {}",
        cformat!("<blue>{}</>", workspace.display())
    );
    println!();
    println!("Then run: {}", cformat!("<blue>grove sync --continue</>"));
    println!("Or abort: {}", cformat!("<blue>grove sync --abort</>"));
    Ok(None)
}

/// Resume after the user resolved merge conflicts.
pub fn continue_sync_merge() -> anyhow::Result<i32> {
    let repo_root = find_repo_root(None)?;
    let state_file = state_path(&repo_root, SYNC_MERGE_STATE_FILE)?;

    if !state_file.exists() {
        println!("{}", cformat!("<red>No sync merge in progress.</>"));
        return Ok(1);
    }

    let state: SyncMergeState = load_state(&state_file)?;
    let workspace = PathBuf::from(&state.workspace_path);

    let unmerged = run_git(&workspace, ["diff", "--name-only", "--diff-filter=U"])?;
    if !unmerged.out().is_empty() {
        println!("{}", cformat!("<red>There are still unresolved conflicts:</>"));
        for f in unmerged.out().lines() {
            println!("  {f}");
        }
        println!();
        println!(
            "Resolve them in: {}",
            cformat!("<blue>{}</>", workspace.display())
        );
        println!("Then run: {}", cformat!("<blue>grove sync --continue</>"));
        return Ok(1);
    }

    // Commit the pending merge if the resolution was not committed yet.
    let pending = run_git(&workspace, ["status", "--porcelain"])?;
    if !pending.out().is_empty() {
        run_git(&workspace, ["commit", "--no-edit"])?;
    }

    let merged = run_git(&workspace, ["rev-parse", "HEAD"])?;
    let merged_sha = merged.out().to_string();

    remove_state(&state_file)?;

    println!(
        "{}",
        cformat!(
            "<green>Merge resolved: {}</>",
            &merged_sha[..merged_sha.len().min(8)]
        )
    );
    println!();
    println!(
        "Run {} to sync all instances to the merged commit.",
        cformat!("<blue>grove sync {} {merged_sha}</>", state.group_name)
    );
    Ok(0)
}

/// Abort the in-progress sync merge and restore the workspace.
pub fn abort_sync_merge() -> anyhow::Result<i32> {
    let repo_root = find_repo_root(None)?;
    let state_file = state_path(&repo_root, SYNC_MERGE_STATE_FILE)?;

    if !state_file.exists() {
        println!("{}", cformat!("<red>No sync merge in progress.</>"));
        return Ok(1);
    }

    let state: SyncMergeState = load_state(&state_file)?;
    let workspace = PathBuf::from(&state.workspace_path);

    run_git(&workspace, ["merge", "--abort"])?;
    if let Some(first) = state.diverged_commits.first() {
        run_git(&workspace, ["checkout", first.sha.as_str(), "--quiet"])?;
    }

    remove_state(&state_file)?;

    println!("{}", cformat!("<green>Sync merge aborted.</>"));
    Ok(0)
}

/// Display current sync-merge state.
pub fn status() -> anyhow::Result<i32> {
    let repo_root = find_repo_root(None)?;
    let state_file = state_path(&repo_root, SYNC_MERGE_STATE_FILE)?;

    if !state_file.exists() {
        println!("No sync merge in progress.");
        return Ok(0);
    }

    let state: SyncMergeState = load_state(&state_file)?;

    println!("{}", cformat!("<blue>Sync merge: {}</>", state.group_name));
    println!("Started: {}", state.started_at);
    println!("Workspace: {}", state.workspace_path);
    println!(
        "Base commit: {}",
        &state.base_commit[..state.base_commit.len().min(8)]
    );
    println!();
    println!("Diverged commits:");
    for entry in &state.diverged_commits {
        println!(
            "  {} from {}",
            &entry.sha[..entry.sha.len().min(8)],
            entry.source_path
        );
    }
    println!();

    if let Some(ref merged) = state.merged_sha {
        println!(
            "Merged to: {}",
            cformat!("<green>{}</>", &merged[..merged.len().min(8)])
        );
    } else {
        println!(
            "Status: {}",
            cformat!("<yellow>merge in progress (conflicts)</>")
        );
        println!();
        println!(
            "Resolve conflicts in: {}",
            cformat!("<blue>{}</>", state.workspace_path)
        );
        println!("Then run: {}", cformat!("<blue>grove sync --continue</>"));
        println!("Or abort: {}", cformat!("<blue>grove sync --abort</>"));
    }

    Ok(0)
}
