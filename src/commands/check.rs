//! Health check: submodule branch state and sync-group consistency.
//!
//! Verifies that project submodules sit on a branch or exact tag (not a
//! stray detached HEAD) and that every sync-group's instances share one
//! pinned commit. The push command runs the consistency half as a gate.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use color_print::cformat;

use crate::config::load_config;
use crate::discovery::parse_gitmodules;
use crate::git::{Repo, find_repo_root};
use crate::styling::println;

use super::sync::{discover_instances, sync_group_exclude_paths};

/// Current tag (when on an exact tag) or branch name; `None` when detached.
fn tag_or_branch(repo: &Repo) -> anyhow::Result<Option<String>> {
    let result = repo.git(["describe", "--exact-match", "--tags"])?;
    if result.success() {
        return Ok(Some(result.out().to_string()));
    }
    repo.current_branch()
}

/// Report one repo's branch state. Returns true when healthy.
fn check_repo_state(repo: &Repo, name: &str, verbose: bool) -> anyhow::Result<bool> {
    match tag_or_branch(repo)? {
        Some(current) => {
            let commit_info = if verbose {
                format!(" ({})", repo.commit_sha(true)?)
            } else {
                String::new()
            };
            println!(
                "  {} {name} is on: {current}{commit_info}",
                cformat!("<green>✓</>")
            );
            Ok(true)
        }
        None => {
            println!(
                "  {} {name} is in detached HEAD state",
                cformat!("<red>✗</>")
            );
            println!("      Current commit: {}", repo.commit_sha(true)?);
            Ok(false)
        }
    }
}

/// Recursively collect submodules that should be on a branch.
fn discover_branch_check_repos(
    repo_root: &Path,
    exclude_paths: &HashSet<PathBuf>,
) -> Vec<(String, Repo)> {
    let mut results = Vec::new();

    fn walk(
        parent: &Path,
        repo_root: &Path,
        exclude_paths: &HashSet<PathBuf>,
        results: &mut Vec<(String, Repo)>,
    ) {
        for entry in parse_gitmodules(&parent.join(".gitmodules"), None) {
            let full_path = parent.join(&entry.path);
            if !full_path.join(".git").exists() {
                continue;
            }
            if exclude_paths.contains(&full_path) {
                continue;
            }
            let rel = full_path
                .strip_prefix(repo_root)
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_else(|_| full_path.display().to_string());
            results.push((rel, Repo::new(&full_path, repo_root)));
            walk(&full_path, repo_root, exclude_paths, results);
        }
    }

    walk(repo_root, repo_root, exclude_paths, &mut results);
    results
}

/// Verify every sync group's instances share one commit.
///
/// Returns true when all groups are in sync. Allow-drift instances are
/// reported but never counted against the group.
pub fn check_sync_groups(repo_root: &Path, verbose: bool) -> anyhow::Result<bool> {
    let config = load_config(repo_root)?;
    if config.sync_groups.is_empty() {
        return Ok(true);
    }

    let mut all_ok = true;
    for group in config.sync_groups.values() {
        let instances = discover_instances(repo_root, &group.url_match)?;

        if instances.is_empty() {
            println!(
                "  {} No submodules found for group '{}'",
                cformat!("<yellow>⚠</>"),
                group.name
            );
            continue;
        }

        let allow_drift: HashSet<&str> = group.allow_drift.iter().map(String::as_str).collect();

        let mut commits: HashMap<String, String> = HashMap::new();
        let mut drifting: HashMap<String, String> = HashMap::new();
        for instance in &instances {
            let rel = instance.rel_path(repo_root);
            let sha = instance
                .current_commit
                .as_deref()
                .map(|c| c[..c.len().min(7)].to_string())
                .unwrap_or_else(|| "unknown".to_string());
            if allow_drift.contains(rel.as_str()) {
                drifting.insert(rel, sha);
            } else {
                commits.insert(rel, sha);
            }
        }

        let unique: HashSet<&String> = commits.values().collect();
        let mut sorted_rels: Vec<&String> = commits.keys().collect();
        sorted_rels.sort();
        let mut sorted_drift: Vec<&String> = drifting.keys().collect();
        sorted_drift.sort();

        if unique.len() <= 1 {
            let commit = unique.iter().next().map(|s| s.as_str()).unwrap_or("—");
            println!(
                "  {} All {} {} submodules at {commit}",
                cformat!("<green>✓</>"),
                commits.len(),
                group.name
            );
            if verbose {
                for rel in &sorted_rels {
                    println!("      {:<40} {}", rel, commits[*rel]);
                }
            }
            for rel in &sorted_drift {
                println!(
                    "      {:<40} {}  {}",
                    rel,
                    drifting[*rel],
                    cformat!("<yellow>(allow-drift)</>")
                );
            }
        } else {
            all_ok = false;
            // Highlight whichever commit most instances agree on.
            let mut counts: HashMap<&String, usize> = HashMap::new();
            for sha in commits.values() {
                *counts.entry(sha).or_default() += 1;
            }
            let majority = counts
                .into_iter()
                .max_by_key(|(_, n)| *n)
                .map(|(sha, _)| sha.clone())
                .unwrap_or_default();

            println!(
                "  {} {} submodules are NOT in sync ({} unique commits across {} locations)",
                cformat!("<red>✗</>"),
                group.name,
                unique.len(),
                commits.len()
            );
            for rel in &sorted_rels {
                let sha = &commits[*rel];
                if *sha != majority {
                    println!(
                        "      {:<40} {sha}  {}",
                        rel,
                        cformat!("<red>← differs</>")
                    );
                } else {
                    println!("      {:<40} {sha}", rel);
                }
            }
            for rel in &sorted_drift {
                println!(
                    "      {:<40} {}  {}",
                    rel,
                    drifting[*rel],
                    cformat!("<yellow>(allow-drift)</>")
                );
            }
        }
    }

    Ok(all_ok)
}

/// Run the full health check. Exit 0 when healthy, 1 otherwise.
pub fn run(verbose: bool) -> anyhow::Result<i32> {
    let repo_root = find_repo_root(None)?;
    let config = load_config(&repo_root)?;
    let has_sync_groups = !config.sync_groups.is_empty();

    let mut all_healthy = true;
    let mut issues: Vec<&str> = Vec::new();

    // Sync-group instances are expected to sit on a detached pin; they are
    // excluded from the branch checks.
    let sync_paths = sync_group_exclude_paths(&repo_root, &config);

    println!("{}", cformat!("<blue>Checking submodule branches...</>"));

    let branch_repos = discover_branch_check_repos(&repo_root, &sync_paths);
    if branch_repos.is_empty() {
        println!("  {} No submodules found", cformat!("<yellow>⚠</>"));
    } else {
        for (name, repo) in &branch_repos {
            if !check_repo_state(repo, name, verbose)? {
                all_healthy = false;
                if !issues.contains(&"detached-head") {
                    issues.push("detached-head");
                }
            }
        }
    }
    println!();

    println!("{}", cformat!("<blue>Checking sync group consistency...</>"));
    if !has_sync_groups {
        println!(
            "  {} No sync groups configured — skipping sync-group checks",
            cformat!("<yellow>⚠</>")
        );
    } else if !check_sync_groups(&repo_root, verbose)? {
        all_healthy = false;
        issues.push("sync-group-out-of-sync");
    }
    println!();

    if all_healthy {
        println!("{}", cformat!("<green>All checks passed.</>"));
    } else {
        println!("{}", cformat!("<red>Issues found:</>"));

        if issues.contains(&"detached-head") {
            println!();
            println!("  {}", cformat!("<yellow>Detached HEAD fix:</>"));
            println!("    cd <submodule>");
            println!("    git checkout <branch-or-tag>");
        }
        if issues.contains(&"sync-group-out-of-sync") {
            println!();
            println!("  {}", cformat!("<yellow>Sync group fix:</>"));
            println!("    grove sync");
        }
    }

    Ok(if all_healthy { 0 } else { 1 })
}
