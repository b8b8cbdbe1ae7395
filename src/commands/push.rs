//! Bottom-up push of committed changes through the submodule tree.
//!
//! Children push before the parents that pin them, so a parent's pointer
//! never references a commit the remote has not seen. Optional filters
//! (explicit paths, a sync group's parents, a cascade chain) compose by
//! union; with no filter, every repo with unpushed commits goes out.

use std::collections::HashSet;

use color_print::cformat;

use crate::config::load_config;
use crate::discovery::{discover_repos, topological_order};
use crate::git::{RepoStatus, ValidateOptions, find_repo_root};
use crate::styling::println;

use super::cascade::discover_chain;
use super::check::check_sync_groups;
use super::print_status_table;
use super::sync::{discover_instances, sync_group_exclude_paths};

/// Options for a push run.
#[derive(Debug, Clone, Default)]
pub struct PushOptions {
    pub dry_run: bool,
    pub skip_checks: bool,
    /// Exact rel_path filters.
    pub paths: Vec<String>,
    /// Restrict to the parents of this sync group's instances.
    pub sync_group: Option<String>,
    /// Restrict to the cascade chain from this leaf.
    pub cascade: Option<String>,
}

pub fn run(opts: PushOptions) -> anyhow::Result<i32> {
    let repo_root = find_repo_root(None)?;

    println!("{}", cformat!("<blue>Discovering repositories...</>"));
    println!();

    let config = load_config(&repo_root)?;
    let exclude = sync_group_exclude_paths(&repo_root, &config);
    let mut repos = discover_repos(&repo_root, &exclude);

    println!("Found {} repositories", cformat!("<green>{}</>", repos.len()));
    println!();

    // Build the union of requested rel_paths; empty means "no filter".
    let mut filter: HashSet<String> = opts.paths.iter().cloned().collect();

    if let Some(ref group_name) = opts.sync_group {
        let Some(group) = config.sync_groups.get(group_name) else {
            println!("{}", cformat!("<red>Unknown sync group: {group_name}</>"));
            return Ok(2);
        };
        for instance in discover_instances(&repo_root, &group.url_match)? {
            let rel = instance
                .parent_repo
                .strip_prefix(&repo_root)
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default();
            filter.insert(if rel.is_empty() { ".".to_string() } else { rel });
        }
    }

    if let Some(ref leaf) = opts.cascade {
        let target = match crate::git::canonical(&repo_root.join(leaf)) {
            Ok(p) => p,
            Err(_) => {
                println!(
                    "{}",
                    cformat!("<red>Error: Path '{leaf}' is not a recognized repository.</>")
                );
                return Ok(2);
            }
        };
        match discover_chain(&repos, &target) {
            Ok(chain) => {
                for idx in chain {
                    filter.insert(repos[idx].rel_path());
                }
            }
            Err(e) => {
                println!("{}", cformat!("<red>Error: {e}</>"));
                return Ok(2);
            }
        }
    }

    let has_filter =
        !opts.paths.is_empty() || opts.sync_group.is_some() || opts.cascade.is_some();

    // Validation phase.
    println!("{}", cformat!("<blue>Validating repositories...</>"));
    println!();

    let mut validation_failed = false;
    let mut push_indices: Vec<usize> = Vec::new();

    for (idx, repo) in repos.iter_mut().enumerate() {
        let valid = repo.validate(ValidateOptions {
            check_sync: false,
            allow_detached: true,
            allow_no_remote: true,
        })?;
        if valid {
            if repo.status == RepoStatus::Pending
                && (!has_filter || filter.contains(&repo.rel_path()))
            {
                push_indices.push(idx);
            }
        } else {
            println!("  {} {}", cformat!("<red>✗</>"), repo.rel_path());
            if let Some(ref msg) = repo.error_message {
                println!("    {}", cformat!("<red>{msg}</>"));
            }
            validation_failed = true;
        }
    }

    print_status_table(&repos, false);

    if validation_failed && !opts.skip_checks {
        println!(
            "{}",
            cformat!("<red>Validation failed. Fix the issues above or use --skip-checks.</>")
        );
        return Ok(1);
    }
    if validation_failed && opts.skip_checks {
        println!(
            "{}",
            cformat!("<yellow>Warning: Proceeding despite validation failures (--skip-checks)</>")
        );
        println!();
    }

    // Sync-group consistency gate.
    println!("{}", cformat!("<blue>Checking sync-group consistency...</>"));
    println!();
    let sync_ok = check_sync_groups(&repo_root, false)?;
    if !sync_ok && !opts.skip_checks {
        println!();
        println!(
            "{}",
            cformat!(
                "<red>Sync groups are out of sync. Run 'grove sync' first or use --skip-checks.</>"
            )
        );
        return Ok(1);
    }
    if !sync_ok && opts.skip_checks {
        println!();
        println!(
            "{}",
            cformat!(
                "<yellow>Warning: Proceeding despite sync-group inconsistency (--skip-checks)</>"
            )
        );
        println!();
    }

    if push_indices.is_empty() {
        println!(
            "{}",
            cformat!("<green>All repositories are up-to-date. Nothing to push.</>")
        );
        return Ok(0);
    }

    // Push children before parents.
    let order = topological_order(&repos);
    let push_set: HashSet<usize> = push_indices.iter().copied().collect();
    let sorted: Vec<usize> = order.into_iter().filter(|i| push_set.contains(i)).collect();

    println!(
        "{}",
        cformat!("<blue>Pushing {} repositories (bottom-up)...</>", sorted.len())
    );
    if opts.dry_run {
        println!("{}", cformat!("<yellow>(dry-run mode - no actual pushes)</>"));
    }
    println!();

    let mut push_failed = false;
    let mut pushed_count = 0usize;
    for idx in sorted {
        if repos[idx].push(opts.dry_run)? {
            pushed_count += 1;
        } else {
            push_failed = true;
            println!(
                "  {} {}",
                cformat!("<red>✗ Failed to push</>"),
                repos[idx].rel_path()
            );
        }
    }
    println!();

    if opts.dry_run {
        println!(
            "{} Would push {pushed_count} repositories.",
            cformat!("<yellow>Dry run complete.</>")
        );
        println!();
        println!("{}", cformat!("<blue>To execute:</>"));
        println!("  grove push");
    } else if push_failed {
        println!("{}", cformat!("<red>Some pushes failed.</>"));
        println!();
        println!("{}", cformat!("<blue>Troubleshooting:</>"));
        println!("  - Check remote connectivity: git remote -v");
        println!("  - Check authentication: ssh -T git@github.com");
        println!("  - Try pushing manually: cd <repo> && git push -v");
        return Ok(1);
    } else {
        println!(
            "{}",
            cformat!("<green>Successfully pushed {pushed_count} repositories.</>")
        );
        println!();
        println!("{}", cformat!("<blue>Next steps:</>"));
        println!("  1. Verify: grove check");
        println!("  2. Check CI status");
    }

    Ok(0)
}
