//! Git driver: typed queries and mutations over the `git` command line.
//!
//! Every interaction with a repository goes through [`run_git`], which never
//! treats a non-zero exit as an error - callers inspect the status. This
//! matters because most of the driver's queries (`merge-base --is-ancestor`,
//! `diff --quiet`, `rev-parse --verify`) use exit codes as boolean answers.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

use anyhow::{Context, bail};

mod repo;

pub use repo::{Repo, RepoStatus, ValidateOptions};

/// Result of a single git invocation.
#[derive(Debug)]
pub struct GitOutput {
    /// Exit code; `-1` when the process was killed by a signal.
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl GitOutput {
    /// Whether the command exited 0.
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Trimmed stdout, the common case for single-value queries.
    pub fn out(&self) -> &str {
        self.stdout.trim()
    }
}

/// Run `git -C <dir> <args...>` with captured output.
///
/// Errors only when git cannot be spawned at all; a failing git command is
/// a normal [`GitOutput`] with a non-zero `code`.
pub fn run_git<I, S>(dir: &Path, args: I) -> anyhow::Result<GitOutput>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let args: Vec<String> = args.into_iter().map(|a| a.as_ref().to_string()).collect();
    log::debug!("$ git {} [{}]", args.join(" "), dir.display());

    let start = Instant::now();
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(&args)
        .output()
        .with_context(|| format!("Failed to execute: git {}", args.join(" ")))?;
    let duration = start.elapsed();

    Ok(GitOutput {
        code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        duration,
    })
}

/// Find the repository root via `git rev-parse --show-toplevel`.
///
/// Resolves from `start` when given, otherwise the current directory.
pub fn find_repo_root(start: Option<&Path>) -> anyhow::Result<PathBuf> {
    let cwd = match start {
        Some(p) => p.to_path_buf(),
        None => std::env::current_dir().context("Failed to read current directory")?,
    };
    let output = run_git(&cwd, ["rev-parse", "--show-toplevel"])?;
    if !output.success() {
        bail!(
            "Could not find git repository root.\nSearched from: {}",
            cwd.display()
        );
    }
    canonical(Path::new(output.out()))
}

/// Resolve the shared `.git` directory (same across all worktrees).
///
/// Shared data (topology cache, engine journals) lives here so it persists
/// across worktrees and parallel engines.
pub fn git_common_dir(repo_root: &Path) -> anyhow::Result<PathBuf> {
    let output = run_git(repo_root, ["rev-parse", "--git-common-dir"])?;
    if !output.success() {
        return Ok(repo_root.join(".git"));
    }
    let path = PathBuf::from(output.out());
    if path.is_absolute() {
        Ok(path)
    } else {
        canonical(&repo_root.join(path))
    }
}

/// Resolve the per-worktree `.git` directory.
///
/// In a linked worktree this is `.git/worktrees/<name>`; in the main
/// worktree it is `.git` itself. Engine state files live here so two
/// worktrees never share a state document.
pub fn git_worktree_dir(repo_root: &Path) -> anyhow::Result<PathBuf> {
    let output = run_git(repo_root, ["rev-parse", "--absolute-git-dir"])?;
    if !output.success() {
        return Ok(repo_root.join(".git"));
    }
    Ok(PathBuf::from(output.out()))
}

/// Canonicalize a path, resolving symlinks (e.g. /var -> /private/var on
/// macOS) without producing Windows verbatim paths git cannot handle.
pub fn canonical(path: &Path) -> anyhow::Result<PathBuf> {
    dunce::canonicalize(path).with_context(|| format!("Failed to resolve path: {}", path.display()))
}
