//! Command handlers: the coordination engines and their CLI entry points.
//!
//! Every handler returns an exit code as a value (`anyhow::Result<i32>`):
//! 0 success, 1 for validation failures, paused engines and runtime errors,
//! 2 for usage errors. Recoverable conditions never cross an engine
//! boundary as an `Err`; only infrastructure failures (spawn errors,
//! unwritable state) do.

pub mod cascade;
pub mod check;
pub mod push;
pub mod sync;
pub mod sync_merge;
pub mod worktree_merge;

use color_print::cformat;

use crate::git::{Repo, RepoStatus};
use crate::styling::println;

/// Print a formatted repository status table.
///
/// Used by push and sync validation so failures are readable at a glance.
pub fn print_status_table(repos: &[Repo], show_behind: bool) {
    println!();
    println!("{}", cformat!("<blue>Repository Status:</>"));
    println!("  {}", "─".repeat(70));

    if show_behind {
        println!(
            "  {:<40} {:<10} {:<8} {:<8} {:<12}",
            "Repository", "Branch", "Ahead", "Behind", "Status"
        );
    } else {
        println!(
            "  {:<45} {:<12} {:<10} {:<12}",
            "Repository", "Branch", "Ahead", "Status"
        );
    }
    println!("  {}", "─".repeat(70));

    for repo in repos {
        let status = repo.status.to_string();
        let status_colored = match repo.status {
            RepoStatus::Pending => cformat!("<yellow>{status}</>"),
            RepoStatus::UpToDate => cformat!("<green>{status}</>"),
            _ => cformat!("<red>{status}</>"),
        };
        let branch = repo.branch.as_deref().unwrap_or("?");
        let ahead = repo.ahead.as_deref().unwrap_or("-");
        let behind = repo.behind.as_deref().unwrap_or("-");

        if show_behind {
            println!(
                "  {:<40} {:<10} {:<8} {:<8} {status_colored}",
                repo.label(),
                branch,
                ahead,
                behind
            );
        } else {
            println!(
                "  {:<45} {:<12} {:<10} {status_colored}",
                repo.label(),
                branch,
                ahead
            );
        }
    }

    println!("  {}", "─".repeat(70));
    println!();
}
