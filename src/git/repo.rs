//! Repository nodes and their typed git operations.

use std::path::PathBuf;

use color_print::cformat;

use crate::styling::println;

use super::{GitOutput, run_git};

/// Validation status for a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum RepoStatus {
    Ok,
    Pending,
    UpToDate,
    Uncommitted,
    Detached,
    NoRemote,
    Behind,
    Diverged,
}

/// Options for [`Repo::validate`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidateOptions {
    /// Also require the repo not to be behind/diverged from its upstream.
    pub check_sync: bool,
    /// Treat detached HEAD as non-fatal (normal for pinned submodules).
    pub allow_detached: bool,
    /// Treat a missing `origin` remote as non-fatal.
    pub allow_no_remote: bool,
}

/// A repository node in the submodule tree.
///
/// Repos are stored by value and identified by their absolute path; the
/// parent relation is an index into the discovery result rather than an
/// owning pointer, keeping the graph a plain tree.
#[derive(Debug, Clone)]
pub struct Repo {
    /// Absolute path of this repository's working tree.
    pub path: PathBuf,
    /// Absolute path of the grove root repository.
    pub root: PathBuf,
    /// Index of the parent repo in the discovery result; `None` for the root.
    pub parent: Option<usize>,

    // Populated during validation
    pub branch: Option<String>,
    /// Commits ahead of upstream, or the sentinel `"new-branch"`.
    pub ahead: Option<String>,
    pub behind: Option<String>,
    pub status: RepoStatus,
    pub error_message: Option<String>,
}

impl Repo {
    pub fn new(path: impl Into<PathBuf>, root: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            root: root.into(),
            parent: None,
            branch: None,
            ahead: None,
            behind: None,
            status: RepoStatus::Ok,
            error_message: None,
        }
    }

    /// Root-relative path, `"."` for the root itself.
    ///
    /// This is the identity used in state documents, config overrides, and
    /// journal lines.
    pub fn rel_path(&self) -> String {
        if self.path == self.root {
            ".".to_string()
        } else {
            self.path
                .strip_prefix(&self.root)
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_else(|_| self.path.to_string_lossy().into_owned())
        }
    }

    /// Human-friendly label for tables: `"(root)"` for the root repo.
    pub fn label(&self) -> String {
        if self.path == self.root {
            "(root)".to_string()
        } else {
            self.rel_path()
        }
    }

    /// Directory depth, used for deepest-first ordering.
    pub fn depth(&self) -> usize {
        self.path.components().count()
    }

    /// Run a git command in this repository.
    pub fn git<I, S>(&self, args: I) -> anyhow::Result<GitOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        run_git(&self.path, args)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// True iff any of tracked diff, staged diff, or untracked-not-ignored
    /// files is non-empty.
    pub fn has_uncommitted_changes(&self) -> anyhow::Result<bool> {
        let unstaged = !self.git(["diff", "--quiet"])?.success();
        let staged = !self.git(["diff", "--cached", "--quiet"])?.success();
        let untracked = self.git(["ls-files", "--others", "--exclude-standard"])?;
        Ok(unstaged || staged || !untracked.out().is_empty())
    }

    /// Changed and untracked files in porcelain format (`M  x`, `?? y`).
    ///
    /// With `exclude_submodules`, paths that are submodule entries in this
    /// repo's manifest are omitted - a moved pointer is not "dirt" for
    /// operations that exist to commit pointers.
    pub fn changed_files(&self, exclude_submodules: bool) -> anyhow::Result<Vec<String>> {
        let output = self.git(["status", "--porcelain"])?;
        if !output.success() {
            return Ok(Vec::new());
        }

        let submodule_paths: Vec<String> = if exclude_submodules {
            crate::discovery::parse_gitmodules(&self.path.join(".gitmodules"), None)
                .into_iter()
                .map(|e| e.path)
                .collect()
        } else {
            Vec::new()
        };

        Ok(output
            .stdout
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter(|l| {
                let path = l.get(3..).unwrap_or("").trim();
                !submodule_paths.iter().any(|s| s == path)
            })
            .map(|l| l.trim().to_string())
            .collect())
    }

    /// Current branch name, or `None` when HEAD is detached.
    pub fn current_branch(&self) -> anyhow::Result<Option<String>> {
        let output = self.git(["branch", "--show-current"])?;
        let branch = output.out();
        Ok((!branch.is_empty()).then(|| branch.to_string()))
    }

    /// Current commit SHA; short form is at least 7 characters.
    pub fn commit_sha(&self, short: bool) -> anyhow::Result<String> {
        let output = if short {
            self.git(["rev-parse", "--short", "HEAD"])?
        } else {
            self.git(["rev-parse", "HEAD"])?
        };
        if output.success() {
            Ok(output.out().to_string())
        } else {
            Ok("unknown".to_string())
        }
    }

    /// Whether an `origin` remote is configured.
    pub fn has_remote(&self) -> anyhow::Result<bool> {
        Ok(self.git(["remote", "get-url", "origin"])?.success())
    }

    /// Commits ahead/behind the configured upstream, as strings.
    ///
    /// Returns `("new-branch", "0")` when no upstream is configured and no
    /// matching remote branch exists.
    pub fn ahead_behind(&self, branch: &str) -> anyhow::Result<(String, String)> {
        // Upstream configured: count against it directly.
        if self.git(["rev-parse", "--abbrev-ref", "@{upstream}"])?.success() {
            let count = self.git(["rev-list", "--count", "--left-right", "@{upstream}...HEAD"])?;
            if count.success()
                && let [behind, ahead] = count.out().split_whitespace().collect::<Vec<_>>()[..]
            {
                return Ok((ahead.to_string(), behind.to_string()));
            }
            return Ok(("0".to_string(), "0".to_string()));
        }

        // No upstream: does the remote branch exist at all?
        let ls = self.git(["ls-remote", "--heads", "origin", branch])?;
        if ls.stdout.contains(&format!("refs/heads/{branch}")) {
            let spec = format!("origin/{branch}...HEAD");
            let count = self.git(["rev-list", "--count", "--left-right", spec.as_str()])?;
            if count.success()
                && let [behind, ahead] = count.out().split_whitespace().collect::<Vec<_>>()[..]
            {
                return Ok((ahead.to_string(), behind.to_string()));
            }
            return Ok(("0".to_string(), "0".to_string()));
        }

        Ok(("new-branch".to_string(), "0".to_string()))
    }

    /// Whether a local branch of this name exists.
    pub fn has_local_branch(&self, branch: &str) -> anyhow::Result<bool> {
        let r = format!("refs/heads/{branch}");
        Ok(self.git(["rev-parse", "--verify", r.as_str()])?.success())
    }

    /// Whether `reference` is already an ancestor of HEAD (already merged).
    pub fn is_ancestor(&self, reference: &str) -> anyhow::Result<bool> {
        Ok(self
            .git(["merge-base", "--is-ancestor", reference, "HEAD"])?
            .success())
    }

    /// Count commits `(on_head_not_on_ref, on_ref_not_on_head)`.
    pub fn count_divergent_commits(&self, reference: &str) -> anyhow::Result<(usize, usize)> {
        let spec = format!("HEAD...{reference}");
        let output = self.git(["rev-list", "--count", "--left-right", spec.as_str()])?;
        if !output.success() {
            return Ok((0, 0));
        }
        let parts: Vec<_> = output.out().split_whitespace().collect();
        if let [left, right] = parts[..]
            && let (Ok(l), Ok(r)) = (left.parse::<usize>(), right.parse::<usize>())
        {
            return Ok((l, r));
        }
        Ok((0, 0))
    }

    /// Lexicographically sorted paths with unresolved merge conflicts.
    pub fn unmerged_files(&self) -> anyhow::Result<Vec<String>> {
        let output = self.git(["diff", "--name-only", "--diff-filter=U"])?;
        if !output.success() {
            return Ok(Vec::new());
        }
        let mut files: Vec<String> = output
            .out()
            .lines()
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();
        files.sort();
        Ok(files)
    }

    /// Whether a merge is mid-flight (MERGE_HEAD exists).
    pub fn has_merge_in_progress(&self) -> anyhow::Result<bool> {
        Ok(self.git(["rev-parse", "--verify", "MERGE_HEAD"])?.success())
    }

    /// Simulate merging `branch` to predict conflicts.
    ///
    /// Returns `(clean, conflicting_paths)`. The working tree is restored to
    /// exactly its pre-simulation state: a conflicted attempt leaves a merge
    /// head and is aborted; a clean attempt only staged changes and is reset.
    pub fn simulate_merge(&self, branch: &str) -> anyhow::Result<(bool, Vec<String>)> {
        let result = self.git(["merge", "--no-commit", "--no-ff", branch])?;
        let clean = result.success();
        let conflicting = if clean {
            Vec::new()
        } else {
            self.unmerged_files()?
        };

        if self.has_merge_in_progress()? {
            self.git(["merge", "--abort"])?;
        } else if clean {
            self.git(["reset", "--merge"])?;
        }
        Ok((clean, conflicting))
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Fetch from remotes. `all_remotes` adds `--all`.
    pub fn fetch(&self, all_remotes: bool) -> anyhow::Result<bool> {
        let output = if all_remotes {
            self.git(["fetch", "--all", "--quiet"])?
        } else {
            self.git(["fetch", "--quiet"])?
        };
        Ok(output.success())
    }

    /// Checkout a branch or revision. Returns `(success, stderr)`.
    pub fn checkout(&mut self, target: &str) -> anyhow::Result<(bool, String)> {
        let output = self.git(["checkout", target, "--quiet"])?;
        if output.success() {
            self.branch = Some(target.to_string());
            Ok((true, String::new()))
        } else {
            Ok((false, output.stderr.trim().to_string()))
        }
    }

    /// Stage a path.
    pub fn add(&self, pathspec: &str) -> anyhow::Result<bool> {
        Ok(self.git(["add", pathspec])?.success())
    }

    /// Commit staged changes with a message.
    pub fn commit(&self, message: &str) -> anyhow::Result<bool> {
        Ok(self.git(["commit", "-m", message])?.success())
    }

    /// Hard-reset to a revision.
    pub fn reset_hard(&self, revision: &str) -> anyhow::Result<bool> {
        Ok(self.git(["reset", "--hard", revision])?.success())
    }

    /// Abort an in-progress merge.
    pub fn merge_abort(&self) -> anyhow::Result<bool> {
        Ok(self.git(["merge", "--abort"])?.success())
    }

    /// Push to the remote; falls back to `push -u origin <branch>` for
    /// branches with no upstream yet. Returns success.
    pub fn push(&self, dry_run: bool) -> anyhow::Result<bool> {
        let branch = self
            .branch
            .clone()
            .ok_or_else(|| anyhow::anyhow!("Cannot push without a branch (validate first)"))?;

        let rel = self.label();
        match self.ahead.as_deref() {
            Some("new-branch") => {
                println!(
                    "  {} {rel} {}",
                    cformat!("<blue>Pushing</>"),
                    cformat!("<yellow>(new branch: {branch})</>")
                );
            }
            ahead => {
                let ahead = ahead.unwrap_or("?");
                println!(
                    "  {} {rel} {}",
                    cformat!("<blue>Pushing</>"),
                    cformat!("<green>({ahead} commits on {branch})</>")
                );
            }
        }

        if dry_run {
            return Ok(true);
        }

        if self.git(["push"])?.success() {
            return Ok(true);
        }
        Ok(self
            .git(["push", "-u", "origin", branch.as_str()])?
            .success())
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Validate repository state, populating `status` / `error_message`.
    ///
    /// Returns true when the repo is valid for the requested operation. The
    /// error message carries the exact command sequence the user would run
    /// to remediate.
    pub fn validate(&mut self, opts: ValidateOptions) -> anyhow::Result<bool> {
        if self.has_uncommitted_changes()? {
            self.status = RepoStatus::Uncommitted;
            self.error_message = Some(format!(
                "Has uncommitted changes. Run: cd {} && git status",
                self.rel_path()
            ));
            return Ok(false);
        }

        self.branch = self.current_branch()?;
        let Some(branch) = self.branch.clone() else {
            self.status = RepoStatus::Detached;
            self.error_message = Some(format!(
                "Detached HEAD state. Run: cd {} && git checkout <branch>",
                self.rel_path()
            ));
            // Detached HEAD is normal for submodules pinned to a commit; only
            // fatal when the caller intends to push from this repo.
            return Ok(opts.allow_detached);
        };

        if !self.has_remote()? {
            self.status = RepoStatus::NoRemote;
            self.error_message = Some("No remote 'origin' configured".to_string());
            return Ok(opts.allow_no_remote);
        }

        let (ahead, behind) = self.ahead_behind(&branch)?;
        self.ahead = Some(ahead.clone());
        self.behind = Some(behind.clone());

        if opts.check_sync && behind != "0" {
            if ahead != "0" && ahead != "new-branch" {
                self.status = RepoStatus::Diverged;
                self.error_message = Some(format!(
                    "Diverged from remote ({ahead} ahead, {behind} behind). \
                     Run: cd {} && git pull --rebase",
                    self.rel_path()
                ));
            } else {
                self.status = RepoStatus::Behind;
                self.error_message = Some(format!(
                    "Behind remote by {behind} commits. Run: cd {} && git pull",
                    self.rel_path()
                ));
            }
            return Ok(false);
        }

        self.status = if ahead == "0" {
            RepoStatus::UpToDate
        } else {
            RepoStatus::Pending
        };
        Ok(true)
    }
}
