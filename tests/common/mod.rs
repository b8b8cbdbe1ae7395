// Helpers are shared across test binaries; not every binary uses every one.
#![allow(dead_code)]

//! Test fixtures: real nested-submodule git trees in temp directories.
//!
//! Each fixture builds origin repositories first, then composes them with
//! `git submodule add` so the trees behave exactly like production groves
//! (gitlinks, manifests, per-worktree `.git` files). Git runs with an
//! isolated config so host settings never leak into tests.

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

/// Run a git command in `cwd`, panicking with full output on failure.
pub fn git(cwd: &Path, args: &[&str]) {
    let output = git_command(cwd, args)
        .output()
        .expect("failed to spawn git");
    assert!(
        output.status.success(),
        "git {:?} failed in {}:\nstdout: {}\nstderr: {}",
        args,
        cwd.display(),
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr),
    );
}

/// Run a git command and return trimmed stdout.
pub fn git_out(cwd: &Path, args: &[&str]) -> String {
    let output = git_command(cwd, args)
        .output()
        .expect("failed to spawn git");
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Run a git command, returning whether it succeeded.
pub fn git_ok(cwd: &Path, args: &[&str]) -> bool {
    git_command(cwd, args)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn git_command(cwd: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::new("git");
    cmd.arg("-C").arg(cwd);
    // Local-path submodule clones are blocked by default on modern git.
    cmd.args(["-c", "protocol.file.allow=always"]);
    cmd.args(args);
    isolate_git_env(&mut cmd);
    cmd
}

/// Strip host git config and pin a deterministic identity.
pub fn isolate_git_env(cmd: &mut Command) {
    cmd.env("GIT_CONFIG_GLOBAL", "/dev/null")
        .env("GIT_CONFIG_SYSTEM", "/dev/null")
        .env("GIT_AUTHOR_NAME", "Test User")
        .env("GIT_AUTHOR_EMAIL", "test@example.com")
        .env("GIT_COMMITTER_NAME", "Test User")
        .env("GIT_COMMITTER_EMAIL", "test@example.com")
        .env("GIT_MERGE_AUTOEDIT", "no")
        .env("GIT_ALLOW_PROTOCOL", "file");
}

/// The grove binary, pre-configured for a working directory with the same
/// isolated git environment the fixtures use.
pub fn grove_cmd(cwd: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::cargo_bin("grove").expect("grove binary builds");
    cmd.current_dir(cwd)
        .env("GIT_CONFIG_GLOBAL", "/dev/null")
        .env("GIT_CONFIG_SYSTEM", "/dev/null")
        .env("GIT_AUTHOR_NAME", "Test User")
        .env("GIT_AUTHOR_EMAIL", "test@example.com")
        .env("GIT_COMMITTER_NAME", "Test User")
        .env("GIT_COMMITTER_EMAIL", "test@example.com")
        .env("GIT_MERGE_AUTOEDIT", "no")
        .env("GIT_ALLOW_PROTOCOL", "file");
    cmd
}

/// Commit identity for repos so commits made by the grove binary (which
/// may not inherit our env in every shell) also succeed.
pub fn set_identity(path: &Path) {
    git(path, &["config", "user.email", "test@example.com"]);
    git(path, &["config", "user.name", "Test User"]);
}

/// Create a git repo at `path` with one initial commit on `main`.
pub fn init_repo(path: &Path) {
    std::fs::create_dir_all(path).unwrap();
    git(path, &["init", "-b", "main"]);
    set_identity(path);
    // These repos double as push targets; accept pushes to the checked-out
    // branch (the stale working tree does not matter for tests).
    git(path, &["config", "receive.denyCurrentBranch", "ignore"]);
    std::fs::write(
        path.join("README.md"),
        format!("# {}\n", path.file_name().unwrap().to_string_lossy()),
    )
    .unwrap();
    git(path, &["add", "README.md"]);
    git(path, &["commit", "-m", "Initial commit"]);
}

/// Write a file and commit it.
pub fn commit_file(repo: &Path, file: &str, content: &str, message: &str) {
    std::fs::write(repo.join(file), content).unwrap();
    git(repo, &["add", file]);
    git(repo, &["commit", "-m", message]);
}

/// A three-level grove: root -> td -> common, built from origin repos.
pub struct GroveTree {
    pub tmp: TempDir,
    /// The composed working tree (project root).
    pub root: PathBuf,
    /// td submodule worktree inside root.
    pub td: PathBuf,
    /// common submodule worktree inside td.
    pub common: PathBuf,
    /// Origin of the common repo (standalone clone location).
    pub common_origin: PathBuf,
    /// Origin of the td repo.
    pub td_origin: PathBuf,
}

impl GroveTree {
    /// Build the tree. `config` is written to the root as `.grove.toml`
    /// (pass "" for no config).
    pub fn new(config: &str) -> Self {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().to_path_buf();

        let common_origin = base.join("common_origin");
        init_repo(&common_origin);
        commit_file(&common_origin, "theme.txt", "theme content\n", "Add theme");

        let td_origin = base.join("td_origin");
        init_repo(&td_origin);
        commit_file(&td_origin, "index.rst", "index\n", "Add index");
        git(
            &td_origin,
            &[
                "submodule",
                "add",
                common_origin.to_str().unwrap(),
                "common",
            ],
        );
        git(&td_origin, &["commit", "-m", "Add common submodule"]);

        let root = base.join("root");
        init_repo(&root);
        if !config.is_empty() {
            std::fs::write(root.join(".grove.toml"), config).unwrap();
            git(&root, &["add", ".grove.toml"]);
            git(&root, &["commit", "-m", "Add grove config"]);
        }
        git(
            &root,
            &["submodule", "add", td_origin.to_str().unwrap(), "td"],
        );
        git(&root, &["commit", "-m", "Add td submodule"]);
        git(&root, &["submodule", "update", "--init", "--recursive"]);

        let td = root.join("td");
        let common = td.join("common");
        set_identity(&td);
        set_identity(&common);

        Self {
            tmp,
            root,
            td,
            common,
            common_origin,
            td_origin,
        }
    }

    /// Put the (detached) submodule worktrees on `main`.
    pub fn checkout_main_everywhere(&self) {
        for repo in [&self.common, &self.td] {
            if !git_ok(repo, &["checkout", "main"]) {
                git(repo, &["checkout", "-b", "main"]);
            }
        }
    }

    /// Create a `my-feature` branch with one extra commit in each repo,
    /// then return every repo to `main`.
    pub fn create_feature_branches(&self) {
        self.checkout_main_everywhere();
        for repo in [&self.common, &self.td, &self.root] {
            git(repo, &["checkout", "-b", "my-feature"]);
            let name = repo.file_name().unwrap().to_string_lossy();
            commit_file(
                repo,
                "feature.txt",
                &format!("{name} feature\n"),
                &format!("{name} feature commit"),
            );
            git(repo, &["checkout", "main"]);
        }
    }

    /// Current HEAD sha of a repo.
    pub fn head(&self, repo: &Path) -> String {
        git_out(repo, &["rev-parse", "HEAD"])
    }

    /// Subject line of the most recent commit.
    pub fn last_message(&self, repo: &Path) -> String {
        git_out(repo, &["log", "-1", "--format=%s"])
    }

    /// Per-worktree grove state directory of the root repo.
    pub fn state_dir(&self) -> PathBuf {
        self.root.join(".git").join("grove")
    }
}

/// A tree with two instances of a shared submodule:
/// root -> {frontend/libs/common, backend/libs/common}.
pub struct SyncTree {
    pub tmp: TempDir,
    pub root: PathBuf,
    pub frontend_instance: PathBuf,
    pub backend_instance: PathBuf,
    pub common_origin: PathBuf,
}

impl SyncTree {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().to_path_buf();

        let common_origin = base.join("common_origin");
        init_repo(&common_origin);
        commit_file(&common_origin, "lib.txt", "shared lib\n", "Add lib");

        let frontend_origin = base.join("frontend_origin");
        init_repo(&frontend_origin);
        git(
            &frontend_origin,
            &[
                "submodule",
                "add",
                common_origin.to_str().unwrap(),
                "libs/common",
            ],
        );
        git(&frontend_origin, &["commit", "-m", "Add common instance"]);

        let backend_origin = base.join("backend_origin");
        init_repo(&backend_origin);
        git(
            &backend_origin,
            &[
                "submodule",
                "add",
                common_origin.to_str().unwrap(),
                "libs/common",
            ],
        );
        git(&backend_origin, &["commit", "-m", "Add common instance"]);

        let root = base.join("root");
        init_repo(&root);
        std::fs::write(
            root.join(".grove.toml"),
            "[sync-groups.common]\nurl-match = \"common_origin\"\n",
        )
        .unwrap();
        git(&root, &["add", ".grove.toml"]);
        git(&root, &["commit", "-m", "Add grove config"]);
        git(
            &root,
            &[
                "submodule",
                "add",
                frontend_origin.to_str().unwrap(),
                "frontend",
            ],
        );
        git(
            &root,
            &[
                "submodule",
                "add",
                backend_origin.to_str().unwrap(),
                "backend",
            ],
        );
        git(&root, &["commit", "-m", "Add frontend and backend"]);
        git(&root, &["submodule", "update", "--init", "--recursive"]);

        let frontend_instance = root.join("frontend").join("libs").join("common");
        let backend_instance = root.join("backend").join("libs").join("common");
        for repo in [
            &root.join("frontend"),
            &root.join("backend"),
            &frontend_instance,
            &backend_instance,
        ] {
            set_identity(repo);
        }

        Self {
            tmp,
            root,
            frontend_instance,
            backend_instance,
            common_origin,
        }
    }

    pub fn head(&self, repo: &Path) -> String {
        git_out(repo, &["rev-parse", "HEAD"])
    }
}
