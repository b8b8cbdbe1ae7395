//! Command-line definitions.
//!
//! Exit codes: 0 success; 1 runtime or validation error (including paused
//! engines); 2 usage error (clap's default for parse failures, and ours for
//! missing positionals).

use clap::builder::styling::{AnsiColor, Color, Styles};
use clap::{Args, Parser, Subcommand};

/// Help output styles matching grove's message colours.
fn help_styles() -> Styles {
    Styles::styled()
        .header(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .usage(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .literal(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Cyan))),
        )
        .placeholder(anstyle::Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan))))
        .error(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
}

#[derive(Debug, Parser)]
#[command(
    name = "grove",
    version,
    about = "Coordinated bottom-up workflows for trees of nested git submodules",
    styles = help_styles()
)]
pub struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Trace external git commands and state writes
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Propagate a leaf submodule's change upward with tiered testing
    Cascade(CascadeArgs),

    /// Synchronize sync-group submodules across all locations
    Sync(SyncArgs),

    /// Push committed changes through nested submodules bottom-up
    Push(PushArgs),

    /// Worktree-wide operations
    Worktree {
        #[command(subcommand)]
        command: WorktreeCommand,
    },

    /// Verify submodules are on branches and sync groups are consistent
    Check {
        /// Show additional details (commits)
        #[arg(short, long)]
        verbose: bool,
    },
}

#[derive(Debug, Args)]
pub struct CascadeArgs {
    /// Leaf submodule path, relative to the repository root
    pub path: Option<String>,

    /// Preview without staging, testing, or committing
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Run system-tests at every level of the chain
    #[arg(long, conflicts_with_all = ["no_system", "quick"])]
    pub system: bool,

    /// Never run system-tests, not even at the root
    #[arg(long, conflicts_with = "quick")]
    pub no_system: bool,

    /// Only the local and contract tiers, at every level
    #[arg(long)]
    pub quick: bool,

    /// Skip the uncommitted-changes check on parent repos
    #[arg(long)]
    pub skip_checks: bool,

    /// Resume a paused cascade
    #[arg(long = "continue")]
    pub continue_: bool,

    /// Cancel the cascade and roll back pointer commits
    #[arg(long)]
    pub abort: bool,

    /// Show current cascade progress
    #[arg(long)]
    pub status: bool,
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Sync group name (all groups when omitted); a 7-40 hex string is
    /// treated as a target revision for all groups
    pub group: Option<String>,

    /// Target revision (defaults to the most advanced local instance)
    #[arg(value_name = "SHA")]
    pub sha: Option<String>,

    /// Resolve the target from the remote instead of local instances
    #[arg(long)]
    pub remote: bool,

    /// Preview changes without making them
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Commit only, skip pushing
    #[arg(long)]
    pub no_push: bool,

    /// Skip remote-sync validation of parent repos
    #[arg(long)]
    pub skip_checks: bool,

    /// Resume a paused sync merge after resolving conflicts
    #[arg(long = "continue")]
    pub continue_: bool,

    /// Abort an in-progress sync merge
    #[arg(long)]
    pub abort: bool,

    /// Show current sync merge progress
    #[arg(long)]
    pub status: bool,
}

#[derive(Debug, Args)]
pub struct PushArgs {
    /// Specific repos to push (exact match on relative path)
    pub paths: Vec<String>,

    /// Show what would be pushed without pushing
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Skip validation (for recovery scenarios)
    #[arg(long)]
    pub skip_checks: bool,

    /// Push the parent repos of a sync group
    #[arg(long, value_name = "NAME")]
    pub sync_group: Option<String>,

    /// Push the cascade chain from a leaf submodule to the root
    #[arg(long, value_name = "PATH")]
    pub cascade: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum WorktreeCommand {
    /// Merge a branch across all submodules bottom-up
    Merge(WorktreeMergeArgs),
}

#[derive(Debug, Args)]
pub struct WorktreeMergeArgs {
    /// Branch to merge into the current branch of every repo
    pub branch: Option<String>,

    /// Resume after resolving a conflict or test failure
    #[arg(long = "continue")]
    pub continue_: bool,

    /// Undo all merges and restore pre-merge state
    #[arg(long)]
    pub abort: bool,

    /// Show current merge progress
    #[arg(long)]
    pub status: bool,

    /// Classify and predict only; make no changes
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Merge only the root repository
    #[arg(long)]
    pub no_recurse: bool,

    /// Force a merge commit even on fast-forwards
    #[arg(long)]
    pub no_ff: bool,

    /// Skip test execution after each merge
    #[arg(long)]
    pub no_test: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cascade_mode_flags_are_mutually_exclusive() {
        assert!(Cli::try_parse_from(["grove", "cascade", "td", "--system", "--quick"]).is_err());
        assert!(Cli::try_parse_from(["grove", "cascade", "td", "--system", "--no-system"]).is_err());
        assert!(Cli::try_parse_from(["grove", "cascade", "td", "--quick"]).is_ok());
    }

    #[test]
    fn sync_accepts_group_and_sha_positionals() {
        let cli = Cli::try_parse_from(["grove", "sync", "common", "abc1234"]).unwrap();
        match cli.command {
            Commands::Sync(args) => {
                assert_eq!(args.group.as_deref(), Some("common"));
                assert_eq!(args.sha.as_deref(), Some("abc1234"));
            }
            _ => panic!("expected sync"),
        }
    }

    #[test]
    fn worktree_merge_parses_continue() {
        let cli = Cli::try_parse_from(["grove", "worktree", "merge", "--continue"]).unwrap();
        match cli.command {
            Commands::Worktree {
                command: WorktreeCommand::Merge(args),
            } => {
                assert!(args.continue_);
                assert!(args.branch.is_none());
            }
            _ => panic!("expected worktree merge"),
        }
    }
}
