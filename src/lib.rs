//! Grove library - coordinated workflows for nested git submodule trees.
//!
//! A grove is a repository whose submodules form a tree, usually with a
//! handful of shared leaf libraries checked out in several places. The
//! library provides the resumable, bottom-up engines that operate on that
//! tree as a single unit:
//!
//! - [`commands::cascade`] - propagate a leaf change upward with tiered tests
//! - [`commands::sync`] - align every instance of a shared submodule
//! - [`commands::worktree_merge`] - merge a branch across the whole tree
//! - [`topology`] - shared cache of structural snapshots keyed by root commit
//!
//! Everything drives git through its command line ([`git::run_git`]); no
//! libgit bindings. Engine state is persisted to per-worktree JSON documents
//! after every observable step so an interrupted run can always `--continue`
//! or `--abort`.

pub mod commands;
pub mod config;
pub mod discovery;
pub mod git;
pub mod journal;
pub mod lockfile;
pub mod shell_exec;
pub mod state;
pub mod styling;
pub mod topology;
