//! Bottom-up merge of a branch across every repository in the tree.
//!
//! Repos are processed leaves first so that by the time a parent merges,
//! its children's pointer bumps already exist - which is what makes
//! submodule-pointer conflicts auto-resolvable. Pauses on real conflicts
//! and test failures; `--continue` picks up after the user resolves,
//! `--abort` restores every merged repo to its pre-merge head.

use std::collections::HashSet;
use std::path::Path;

use color_print::cformat;
use serde::{Deserialize, Serialize};

use crate::config::{MergeConfig, load_config};
use crate::discovery::{discover_repos, parse_gitmodules, topological_order};
use crate::git::{Repo, find_repo_root, run_git};
use crate::journal::Journal;
use crate::shell_exec::run_test;
use crate::state::{MERGE_STATE_FILE, load_state, remove_state, save_state, state_path};
use crate::styling::println;
use crate::topology::{DEFAULT_MAX_SNAPSHOTS, TopologyCache};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum MergeStatus {
    Pending,
    Skipped,
    Merged,
    Paused,
}

/// Why a repo was skipped or paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Reason {
    AlreadyMerged,
    BranchNotFound,
    DetachedHead,
    Conflict,
    TestFailed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeEntry {
    pub rel_path: String,
    pub status: MergeStatus,
    pub pre_merge_head: Option<String>,
    pub post_merge_head: Option<String>,
    pub reason: Option<Reason>,
}

impl MergeEntry {
    fn pending(rel_path: String) -> Self {
        Self {
            rel_path,
            status: MergeStatus::Pending,
            pre_merge_head: None,
            post_merge_head: None,
            reason: None,
        }
    }

    fn skipped(rel_path: String, reason: Reason) -> Self {
        Self {
            rel_path,
            status: MergeStatus::Skipped,
            pre_merge_head: None,
            post_merge_head: None,
            reason: Some(reason),
        }
    }
}

/// Persistent merge state across CLI invocations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeState {
    pub branch: String,
    pub no_ff: bool,
    pub no_test: bool,
    pub started_at: String,
    pub repos: Vec<MergeEntry>,
}

/// Options for a new merge run.
#[derive(Debug, Clone, Copy)]
pub struct MergeOptions {
    pub dry_run: bool,
    pub no_recurse: bool,
    pub no_ff: bool,
    pub no_test: bool,
}

// ---------------------------------------------------------------------------
// Test command resolution
// ---------------------------------------------------------------------------

/// Resolve the test command for a repo during merge:
///
/// 1. Root config's `test-overrides[rel_path]` (empty string = skip)
/// 2. The repo's own `.grove.toml` `test-command`
/// 3. Root config's default `test-command`
/// 4. None (skip)
pub fn resolve_test_command(
    root_config: &MergeConfig,
    repo: &Repo,
) -> anyhow::Result<Option<String>> {
    let rel = repo.rel_path();

    if let Some(cmd) = root_config.test_overrides.get(&rel) {
        return Ok((!cmd.is_empty()).then(|| cmd.clone()));
    }

    if repo.path != repo.root {
        let local = load_config(&repo.path)?;
        if let Some(cmd) = local.merge.test_command {
            return Ok((!cmd.is_empty()).then_some(cmd));
        }
    }

    Ok(root_config.test_command.clone().filter(|c| !c.is_empty()))
}

// ---------------------------------------------------------------------------
// Submodule conflict auto-resolution
// ---------------------------------------------------------------------------

/// Stage the current pin for conflicting paths that are submodule entries
/// of already-merged children. Returns true when every conflict resolved.
fn auto_resolve_submodule_conflicts(
    repo: &Repo,
    merged_child_rel_paths: &HashSet<String>,
) -> anyhow::Result<bool> {
    let unmerged = repo.unmerged_files()?;
    if unmerged.is_empty() {
        return Ok(true);
    }

    let submodule_paths: HashSet<String> =
        parse_gitmodules(&repo.path.join(".gitmodules"), None)
            .into_iter()
            .map(|e| e.path)
            .collect();

    for conflict_path in &unmerged {
        if submodule_paths.contains(conflict_path) {
            let child_abs = repo.path.join(conflict_path);
            let child_rel = child_abs
                .strip_prefix(&repo.root)
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default();
            if merged_child_rel_paths.contains(&child_rel) {
                repo.add(conflict_path)?;
            }
        }
    }

    Ok(repo.unmerged_files()?.is_empty())
}

// ---------------------------------------------------------------------------
// Structural consistency
// ---------------------------------------------------------------------------

/// Warn when the submodule tree structure differs between HEAD and the
/// merge source. Never blocks the merge.
fn check_structural_consistency(repo_root: &Path, branch: &str, cache: &TopologyCache) {
    let Ok(current) = run_git(repo_root, ["rev-parse", "--short", "HEAD"]) else {
        return;
    };
    let Ok(branch_head) = run_git(repo_root, ["rev-parse", "--short", branch]) else {
        return;
    };
    if !current.success() || !branch_head.success() {
        return;
    }

    let Some(diff) = cache.compare(current.out(), branch_head.out()) else {
        // Cache miss: fall back to a plain manifest diff.
        let spec = format!("{branch}..HEAD");
        if let Ok(result) = run_git(repo_root, ["diff", spec.as_str(), "--", ".gitmodules"])
            && result.success()
            && !result.out().is_empty()
        {
            println!(
                "{}",
                cformat!(
                    "  <yellow>Warning: .gitmodules differs between branches \
                     (topology cache miss — cannot show detailed diff)</>"
                )
            );
        }
        return;
    };

    if diff.is_empty() || !diff.has_structural_changes() {
        return;
    }

    println!(
        "{}",
        cformat!("  <yellow>Warning: submodule structure differs between branches:</>")
    );
    for e in &diff.added {
        println!("    + {} (added)", cformat!("<green>{}</>", e.rel_path));
    }
    for e in &diff.removed {
        println!("    - {} (removed)", cformat!("<red>{}</>", e.rel_path));
    }
    for (o, n) in &diff.changed_url {
        println!("    ~ {}: URL changed ({} → {})", o.rel_path, o.url, n.url);
    }
    for (o, n) in &diff.changed_relative_url {
        println!(
            "    ~ {}: relative URL changed ({} → {})",
            o.rel_path,
            o.relative_url.as_deref().unwrap_or("-"),
            n.relative_url.as_deref().unwrap_or("-")
        );
    }
    for (o, n) in &diff.reparented {
        println!(
            "    ~ {}: reparented ({} → {})",
            o.rel_path, o.parent_rel_path, n.parent_rel_path
        );
    }
    println!();
}

// ---------------------------------------------------------------------------
// Per-repo merge
// ---------------------------------------------------------------------------

/// Merge one repo. Returns 0 on success, 1 when paused.
fn execute_merge_for_repo(
    repo: &Repo,
    entry_idx: usize,
    state: &mut MergeState,
    state_file: &Path,
    journal: &Journal,
    root_config: &MergeConfig,
    merged_child_rel_paths: &HashSet<String>,
) -> anyhow::Result<i32> {
    let branch = state.branch.clone();
    let rel = state.repos[entry_idx].rel_path.clone();

    // 1. Record the pre-merge head.
    state.repos[entry_idx].pre_merge_head = Some(repo.commit_sha(false)?);
    save_state(state_file, state)?;

    // 2. Merge the branch into HEAD.
    let result = if state.no_ff {
        repo.git(["merge", branch.as_str(), "--no-ff"])?
    } else {
        repo.git(["merge", branch.as_str()])?
    };

    if !result.success() {
        // 3. Submodule-pointer auto-resolution for already-merged children.
        if auto_resolve_submodule_conflicts(repo, merged_child_rel_paths)? {
            repo.git(["commit", "--no-edit"])?;
            journal.log(format!(
                "MERGE {rel}: clean merge (submodule pointers auto-resolved)"
            ))?;
        } else {
            let conflicting = repo.unmerged_files()?;
            journal.log(format!("MERGE {rel}: CONFLICT ({})", conflicting.join(", ")))?;
            state.repos[entry_idx].status = MergeStatus::Paused;
            state.repos[entry_idx].reason = Some(Reason::Conflict);
            save_state(state_file, state)?;
            journal.log(format!("PAUSED: conflict in {rel}"))?;
            println!("  {} in {rel}", cformat!("<red>CONFLICT</>"));
            println!("    Conflicting files: {}", conflicting.join(", "));
            println!();
            println!("  Resolve conflicts in: {}", repo.path.display());
            println!("  Then run: grove worktree merge --continue");
            return Ok(1);
        }
    } else {
        let pre = state.repos[entry_idx]
            .pre_merge_head
            .as_deref()
            .map(|h| &h[..h.len().min(8)])
            .unwrap_or("?");
        let post = repo.commit_sha(true)?;
        journal.log(format!("MERGE {rel}: clean merge ({pre} → {post})"))?;
        println!("  {} {rel}: merged", cformat!("<green>✓</>"));
    }

    // 4. Run tests.
    if !state.no_test
        && let Some(test_cmd) = resolve_test_command(root_config, repo)?
    {
        println!("    Running tests: {test_cmd}");
        let (passed, duration) = run_test(&repo.path, &test_cmd)?;
        let secs = duration.as_secs_f64();
        if passed {
            journal.log(format!("TEST {rel}: PASSED ({test_cmd}, {secs:.1}s)"))?;
        } else {
            journal.log(format!("TEST {rel}: FAILED ({test_cmd}, {secs:.1}s)"))?;
            state.repos[entry_idx].status = MergeStatus::Paused;
            state.repos[entry_idx].reason = Some(Reason::TestFailed);
            state.repos[entry_idx].post_merge_head = Some(repo.commit_sha(false)?);
            save_state(state_file, state)?;
            journal.log(format!("PAUSED: test failed in {rel}"))?;
            println!("    {} in {rel}", cformat!("<red>TEST FAILED</>"));
            println!("    Fix the issue, then run: grove worktree merge --continue");
            return Ok(1);
        }
    }

    state.repos[entry_idx].status = MergeStatus::Merged;
    state.repos[entry_idx].post_merge_head = Some(repo.commit_sha(false)?);
    save_state(state_file, state)?;
    Ok(0)
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Start a new merge of `branch` into the current branch of every repo.
pub fn start(branch: &str, opts: MergeOptions) -> anyhow::Result<i32> {
    let repo_root = find_repo_root(None)?;
    let state_file = state_path(&repo_root, MERGE_STATE_FILE)?;
    let journal = Journal::for_engine(&repo_root, "merge")?;

    // Phase 0: Guard
    if state_file.exists() {
        println!(
            "{}",
            cformat!("<red>A merge is already in progress. Use --continue, --abort, or --status.</>")
        );
        return Ok(1);
    }

    // Phase 1: Discovery
    println!("{}", cformat!("<blue>Discovering repositories...</>"));
    let config = load_config(&repo_root)?;
    let exclude = super::sync::sync_group_exclude_paths(&repo_root, &config);

    let repos = discover_repos(&repo_root, &exclude);

    // Record topology for this root commit so future merges can diff it.
    let mut cache = TopologyCache::for_repo(&repo_root)?;
    let mut cache_usable = true;
    if let Err(e) = cache.load() {
        println!("{}", cformat!("<yellow>Warning: {e}</>"));
        cache_usable = false;
    }
    if cache_usable {
        let head = run_git(&repo_root, ["rev-parse", "--short", "HEAD"])?;
        if head.success() {
            cache.record(head.out(), &repos, &repo_root)?;
            cache.prune(DEFAULT_MAX_SNAPSHOTS);
            cache.save()?;
        }
    }

    let mut order = topological_order(&repos);
    if opts.no_recurse {
        order.retain(|&i| repos[i].path == repo_root);
    }

    println!("  Found {} repositories", order.len());
    println!();

    // Phase 2: Structural verification
    println!("{}", cformat!("<blue>Checking structural consistency...</>"));
    check_structural_consistency(&repo_root, branch, &cache);
    println!();

    // Phase 3: Pre-flight
    println!("{}", cformat!("<blue>Pre-flight checks...</>"));
    let mut entries: Vec<MergeEntry> = Vec::new();
    let mut has_errors = false;
    // (repo index, entry index) pairs that actually need merging.
    let mut needs_merge: Vec<(usize, usize)> = Vec::new();

    for &repo_idx in &order {
        let repo = &repos[repo_idx];
        let rel = repo.rel_path();

        if repo.has_uncommitted_changes()? {
            println!("  {} {rel}: has uncommitted changes", cformat!("<red>✗</>"));
            has_errors = true;
            continue;
        }

        if repo.current_branch()?.is_none() {
            println!("  {} {rel}: skipped (detached HEAD)", cformat!("<yellow>·</>"));
            entries.push(MergeEntry::skipped(rel, Reason::DetachedHead));
            continue;
        }

        if !repo.has_local_branch(branch)? {
            println!(
                "  {} {rel}: skipped (branch '{branch}' not found)",
                cformat!("<yellow>·</>")
            );
            entries.push(MergeEntry::skipped(rel, Reason::BranchNotFound));
            continue;
        }

        if repo.is_ancestor(branch)? {
            println!(
                "  {} {rel}: skipped (already up-to-date)",
                cformat!("<yellow>·</>")
            );
            entries.push(MergeEntry::skipped(rel, Reason::AlreadyMerged));
            continue;
        }

        let (_, behind) = repo.count_divergent_commits(branch)?;
        println!(
            "  {} {rel}: needs merge ({behind} commits from {branch})",
            cformat!("<green>→</>")
        );
        entries.push(MergeEntry::pending(rel));
        needs_merge.push((repo_idx, entries.len() - 1));
    }

    if has_errors {
        println!();
        println!(
            "{}",
            cformat!("<red>Cannot proceed: fix uncommitted changes first.</>")
        );
        return Ok(1);
    }

    if needs_merge.is_empty() {
        println!();
        println!(
            "{}",
            cformat!("<green>Nothing to merge — all repositories are up-to-date.</>")
        );
        return Ok(0);
    }

    println!();

    // Phase 4: Conflict prediction
    println!("{}", cformat!("<blue>Predicting conflicts...</>"));
    for &(repo_idx, entry_idx) in &needs_merge {
        let (clean, conflicts) = repos[repo_idx].simulate_merge(branch)?;
        let rel = &entries[entry_idx].rel_path;
        if clean {
            println!("  {} {rel}: clean merge expected", cformat!("<green>✓</>"));
        } else {
            println!(
                "  {} {rel}: conflicts expected in {}",
                cformat!("<yellow>⚠</>"),
                conflicts.join(", ")
            );
        }
    }
    println!();

    if opts.dry_run {
        println!("{}", cformat!("<yellow>Dry run complete.</>"));
        return Ok(0);
    }

    // Phase 5: Execute
    let mut state = MergeState {
        branch: branch.to_string(),
        no_ff: opts.no_ff,
        no_test: opts.no_test,
        started_at: chrono::Utc::now().to_rfc3339(),
        repos: entries,
    };
    save_state(&state_file, &state)?;

    let current_branch = run_git(&repo_root, ["branch", "--show-current"])?;
    journal.log(format!("MERGE START: {branch} into {}", current_branch.out()))?;
    journal.log(format!(
        "DISCOVER: {} repos found, {} need merging",
        order.len(),
        needs_merge.len()
    ))?;

    println!(
        "{}",
        cformat!("<blue>Merging {} repositories...</>", needs_merge.len())
    );
    println!();

    let mut merged_child_rel_paths: HashSet<String> = HashSet::new();

    for &(repo_idx, entry_idx) in &needs_merge {
        let rc = execute_merge_for_repo(
            &repos[repo_idx],
            entry_idx,
            &mut state,
            &state_file,
            &journal,
            &config.merge,
            &merged_child_rel_paths,
        )?;
        if rc != 0 {
            return Ok(rc);
        }
        merged_child_rel_paths.insert(state.repos[entry_idx].rel_path.clone());
    }

    finish(&state, &state_file, &journal)
}

/// Resume a paused merge.
pub fn continue_merge() -> anyhow::Result<i32> {
    let repo_root = find_repo_root(None)?;
    let state_file = state_path(&repo_root, MERGE_STATE_FILE)?;
    let journal = Journal::for_engine(&repo_root, "merge")?;

    if !state_file.exists() {
        println!("{}", cformat!("<red>No merge in progress.</>"));
        return Ok(1);
    }

    let mut state: MergeState = load_state(&state_file)?;
    let config = load_config(&repo_root)?;
    journal.log("CONTINUE")?;

    let Some(paused_idx) = state
        .repos
        .iter()
        .position(|e| e.status == MergeStatus::Paused)
    else {
        println!(
            "{}",
            cformat!("<red>No paused repo found. State may be corrupt.</>")
        );
        return Ok(1);
    };

    let rel = state.repos[paused_idx].rel_path.clone();
    let repo_path = if rel == "." {
        repo_root.clone()
    } else {
        repo_root.join(&rel)
    };
    let repo = Repo::new(&repo_path, &repo_root);

    match state.repos[paused_idx].reason {
        Some(Reason::Conflict) => {
            // Verify the user actually resolved everything.
            let unmerged = repo.unmerged_files()?;
            if !unmerged.is_empty() {
                println!("{}", cformat!("<red>Unresolved conflicts in {rel}:</>"));
                for f in &unmerged {
                    println!("  - {f}");
                }
                println!();
                println!("Resolve conflicts, then run: grove worktree merge --continue");
                return Ok(1);
            }

            // A mid-flight merge still needs its commit.
            if repo.has_merge_in_progress()? {
                repo.git(["commit", "--no-edit"])?;
            }

            if !state.no_test
                && let Some(test_cmd) = resolve_test_command(&config.merge, &repo)?
            {
                println!("  Running tests: {test_cmd}");
                let (passed, duration) = run_test(&repo.path, &test_cmd)?;
                let secs = duration.as_secs_f64();
                if !passed {
                    journal.log(format!("TEST {rel}: FAILED ({test_cmd}, {secs:.1}s)"))?;
                    state.repos[paused_idx].reason = Some(Reason::TestFailed);
                    save_state(&state_file, &state)?;
                    println!("  {} in {rel}", cformat!("<red>TEST FAILED</>"));
                    return Ok(1);
                }
                journal.log(format!("TEST {rel}: PASSED ({test_cmd}, {secs:.1}s)"))?;
            }
        }
        Some(Reason::TestFailed) => {
            if let Some(test_cmd) = resolve_test_command(&config.merge, &repo)? {
                println!("  Re-running tests: {test_cmd}");
                let (passed, duration) = run_test(&repo.path, &test_cmd)?;
                let secs = duration.as_secs_f64();
                if !passed {
                    journal.log(format!("TEST {rel}: FAILED ({test_cmd}, {secs:.1}s)"))?;
                    save_state(&state_file, &state)?;
                    println!("  {} in {rel}", cformat!("<red>TEST STILL FAILING</>"));
                    return Ok(1);
                }
                journal.log(format!("TEST {rel}: PASSED ({test_cmd}, {secs:.1}s)"))?;
            }
        }
        _ => {}
    }

    state.repos[paused_idx].status = MergeStatus::Merged;
    state.repos[paused_idx].post_merge_head = Some(repo.commit_sha(false)?);
    save_state(&state_file, &state)?;
    println!("  {} {rel}: merged", cformat!("<green>✓</>"));

    let mut merged_child_rel_paths: HashSet<String> = state
        .repos
        .iter()
        .filter(|e| e.status == MergeStatus::Merged)
        .map(|e| e.rel_path.clone())
        .collect();

    // Continue with the remaining pending repos, re-discovering the tree.
    let exclude = super::sync::sync_group_exclude_paths(&repo_root, &config);
    let all_repos = discover_repos(&repo_root, &exclude);

    for entry_idx in 0..state.repos.len() {
        if state.repos[entry_idx].status != MergeStatus::Pending {
            continue;
        }
        let rel = state.repos[entry_idx].rel_path.clone();
        let path = if rel == "." {
            repo_root.clone()
        } else {
            repo_root.join(&rel)
        };
        let repo = match crate::discovery::find_repo(&all_repos, &path) {
            Some((_, r)) => r.clone(),
            None => Repo::new(&path, &repo_root),
        };

        let rc = execute_merge_for_repo(
            &repo,
            entry_idx,
            &mut state,
            &state_file,
            &journal,
            &config.merge,
            &merged_child_rel_paths,
        )?;
        if rc != 0 {
            return Ok(rc);
        }
        merged_child_rel_paths.insert(rel);
    }

    finish(&state, &state_file, &journal)
}

fn finish(state: &MergeState, state_file: &Path, journal: &Journal) -> anyhow::Result<i32> {
    remove_state(state_file)?;
    let merged = state
        .repos
        .iter()
        .filter(|e| e.status == MergeStatus::Merged)
        .count();
    let skipped = state
        .repos
        .iter()
        .filter(|e| e.status == MergeStatus::Skipped)
        .count();
    journal.log(format!(
        "MERGE COMPLETE: {merged} repos merged, {skipped} skipped"
    ))?;

    println!();
    println!(
        "{}",
        cformat!("<green>Merge complete: {merged} repos merged, {skipped} skipped.</>")
    );
    Ok(0)
}

/// Abort the in-progress merge and restore every repo.
pub fn abort() -> anyhow::Result<i32> {
    let repo_root = find_repo_root(None)?;
    let state_file = state_path(&repo_root, MERGE_STATE_FILE)?;
    let journal = Journal::for_engine(&repo_root, "merge")?;

    if !state_file.exists() {
        println!("{}", cformat!("<red>No merge in progress.</>"));
        return Ok(1);
    }

    let state: MergeState = load_state(&state_file)?;

    // A paused repo may be mid-merge; abort that first.
    if let Some(entry) = state.repos.iter().find(|e| e.status == MergeStatus::Paused) {
        let path = if entry.rel_path == "." {
            repo_root.clone()
        } else {
            repo_root.join(&entry.rel_path)
        };
        let repo = Repo::new(&path, &repo_root);
        if repo.has_merge_in_progress()? {
            repo.merge_abort()?;
        }
        if let Some(ref head) = entry.pre_merge_head {
            repo.reset_hard(head)?;
        }
    }

    // Unwind merged repos in reverse topological order (parents first).
    let merged: Vec<&MergeEntry> = state
        .repos
        .iter()
        .filter(|e| e.status == MergeStatus::Merged)
        .collect();
    for entry in merged.iter().rev() {
        let Some(ref head) = entry.pre_merge_head else {
            continue;
        };
        let path = if entry.rel_path == "." {
            repo_root.clone()
        } else {
            repo_root.join(&entry.rel_path)
        };
        let repo = Repo::new(&path, &repo_root);
        repo.reset_hard(head)?;
        println!(
            "  {} {}: restored to {}",
            cformat!("<yellow>↺</>"),
            entry.rel_path,
            &head[..head.len().min(8)]
        );
    }

    remove_state(&state_file)?;
    journal.log("MERGE ABORTED")?;

    println!();
    println!(
        "{}",
        cformat!("<green>Merge aborted. All repositories restored to pre-merge state.</>")
    );
    Ok(0)
}

/// Show current merge progress.
pub fn status() -> anyhow::Result<i32> {
    let repo_root = find_repo_root(None)?;
    let state_file = state_path(&repo_root, MERGE_STATE_FILE)?;

    if !state_file.exists() {
        println!("No merge in progress.");
        return Ok(0);
    }

    let state: MergeState = load_state(&state_file)?;

    println!("Merge in progress: {}", cformat!("<blue>{}</>", state.branch));
    println!("  Started: {}", state.started_at);
    if state.no_ff {
        println!("  Options: --no-ff");
    }
    if state.no_test {
        println!("  Options: --no-test");
    }
    println!();

    for entry in &state.repos {
        let (icon, detail) = match entry.status {
            MergeStatus::Merged => (cformat!("<green>✓</>"), "merged".to_string()),
            MergeStatus::Skipped => (
                cformat!("<yellow>·</>"),
                format!(
                    "skipped ({})",
                    entry.reason.map(|r| r.to_string()).unwrap_or_default()
                ),
            ),
            MergeStatus::Paused => (
                cformat!("<red>⚠</>"),
                format!(
                    "PAUSED ({})",
                    entry.reason.map(|r| r.to_string()).unwrap_or_default()
                ),
            ),
            MergeStatus::Pending => (" ".to_string(), "pending".to_string()),
        };

        let label = if entry.rel_path == "." {
            "(root)"
        } else {
            &entry.rel_path
        };
        println!("  {icon} {label}: {detail}");
    }

    println!();
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons_serialize_kebab_case() {
        let entry = MergeEntry::skipped("td".into(), Reason::BranchNotFound);
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"branch-not-found\""));
        assert!(json.contains("\"skipped\""));
    }

    #[test]
    fn state_round_trips_through_json() {
        let state = MergeState {
            branch: "feature".into(),
            no_ff: true,
            no_test: false,
            started_at: "2026-08-01T00:00:00Z".into(),
            repos: vec![
                MergeEntry::pending("td/common".into()),
                MergeEntry::skipped(".".into(), Reason::AlreadyMerged),
            ],
        };
        let json = serde_json::to_string_pretty(&state).unwrap();
        let back: MergeState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.branch, "feature");
        assert_eq!(back.repos.len(), 2);
        assert_eq!(back.repos[1].reason, Some(Reason::AlreadyMerged));
    }
}
