use clap::Parser;
use std::process;

use grove::commands::cascade::{self, CascadeOptions, SystemMode};
use grove::commands::push::{self, PushOptions};
use grove::commands::sync::{self, SyncOptions};
use grove::commands::worktree_merge::{self, MergeOptions};
use grove::commands::{check, sync_merge};
use grove::config::load_config;
use grove::git::find_repo_root;
use grove::styling::{self, error_message, eprintln};

mod cli;

use cli::{CascadeArgs, Cli, Commands, SyncArgs, WorktreeCommand, WorktreeMergeArgs};

/// Expand a configured alias at the first command token, before parsing.
///
/// `grove wm feature` with `[aliases] wm = "worktree merge"` becomes
/// `grove worktree merge feature`. Anything that fails here (not in a
/// repo, unreadable config) just leaves the arguments untouched.
fn expand_aliases(mut args: Vec<String>) -> Vec<String> {
    let Some(first) = args.get(1) else {
        return args;
    };
    if first.starts_with('-') {
        return args;
    }

    let Ok(repo_root) = find_repo_root(None) else {
        return args;
    };
    let Ok(config) = load_config(&repo_root) else {
        return args;
    };
    let Some(expansion) = config.aliases.get(first) else {
        return args;
    };

    let tokens: Vec<String> = expansion.split_whitespace().map(String::from).collect();
    args.splice(1..2, tokens);
    args
}

fn dispatch_cascade(args: CascadeArgs) -> anyhow::Result<i32> {
    if args.continue_ {
        return cascade::continue_cascade();
    }
    if args.abort {
        return cascade::abort();
    }
    if args.status {
        return cascade::status();
    }

    let Some(path) = args.path else {
        eprintln!("{}", error_message("Usage: grove cascade <path>"));
        eprintln!("  Or use --continue, --abort, or --status");
        return Ok(2);
    };

    let system_mode = if args.system {
        SystemMode::All
    } else if args.no_system {
        SystemMode::None
    } else {
        SystemMode::Default
    };

    cascade::run(
        &path,
        CascadeOptions {
            dry_run: args.dry_run,
            system_mode,
            quick: args.quick,
            skip_checks: args.skip_checks,
        },
    )
}

fn dispatch_sync(args: SyncArgs) -> anyhow::Result<i32> {
    // --continue/--abort/--status act on the sync-merge sub-engine, the
    // only pausable part of sync.
    if args.continue_ {
        return sync_merge::continue_sync_merge();
    }
    if args.abort {
        return sync_merge::abort_sync_merge();
    }
    if args.status {
        return sync_merge::status();
    }

    sync::run(
        args.group.as_deref(),
        args.sha.as_deref(),
        SyncOptions {
            dry_run: args.dry_run,
            no_push: args.no_push,
            skip_checks: args.skip_checks,
            remote: args.remote,
        },
    )
}

fn dispatch_worktree_merge(args: WorktreeMergeArgs) -> anyhow::Result<i32> {
    if args.continue_ {
        return worktree_merge::continue_merge();
    }
    if args.abort {
        return worktree_merge::abort();
    }
    if args.status {
        return worktree_merge::status();
    }

    let Some(branch) = args.branch else {
        eprintln!("{}", error_message("Usage: grove worktree merge <branch>"));
        eprintln!("  Or use --continue, --abort, or --status");
        return Ok(2);
    };

    worktree_merge::start(
        &branch,
        MergeOptions {
            dry_run: args.dry_run,
            no_recurse: args.no_recurse,
            no_ff: args.no_ff,
            no_test: args.no_test,
        },
    )
}

fn run() -> anyhow::Result<i32> {
    let args = expand_aliases(std::env::args().collect());
    let cli = Cli::parse_from(args);

    // anstream handles NO_COLOR and non-TTY stripping on its own; the flag
    // only needs the global override.
    if cli.no_color {
        styling::disable_color();
    }

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cli.debug { "debug" } else { "off" }),
    )
    .format_timestamp(None)
    .init();

    match cli.command {
        Commands::Cascade(args) => dispatch_cascade(args),
        Commands::Sync(args) => dispatch_sync(args),
        Commands::Push(args) => push::run(PushOptions {
            dry_run: args.dry_run,
            skip_checks: args.skip_checks,
            paths: args.paths,
            sync_group: args.sync_group,
            cascade: args.cascade,
        }),
        Commands::Worktree {
            command: WorktreeCommand::Merge(args),
        } => dispatch_worktree_merge(args),
        Commands::Check { verbose } => check::run(verbose),
    }
}

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", error_message(format!("Error: {e:#}")));
            1
        }
    };
    process::exit(code);
}
