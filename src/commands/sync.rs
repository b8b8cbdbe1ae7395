//! Synchronize sync-group submodule instances across the tree.
//!
//! Local-first by default: every instance of the group is discovered, the
//! most advanced pin (the "tip") becomes the target, and the rest are
//! brought up to it. Diverged instances hand off to the sync-merge
//! sub-engine. `--remote` resolves the target from the remote instead, and
//! an explicit revision wins over both.
//!
//! After updating, pointer commits propagate bottom-up through every parent
//! repo, then everything that advanced is pushed (unless `--no-push`).

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use color_print::cformat;

use crate::config::{GroveConfig, SyncGroup, load_config};
use crate::discovery::parse_gitmodules;
use crate::git::{Repo, RepoStatus, ValidateOptions, find_repo_root, run_git};
use crate::styling::println;

use super::print_status_table;
use super::sync_merge::attempt_divergence_merge;

/// One physical checkout of a logically shared submodule.
#[derive(Debug, Clone)]
pub struct Instance {
    /// Absolute path of the checkout.
    pub path: PathBuf,
    /// Absolute path of the repo whose manifest declares it.
    pub parent_repo: PathBuf,
    /// Path relative to the parent repo (the manifest's `path` value).
    pub rel_path_in_parent: String,
    /// Pinned revision at discovery time.
    pub current_commit: Option<String>,
}

impl Instance {
    /// Root-relative display path.
    pub fn rel_path(&self, repo_root: &Path) -> String {
        self.path
            .strip_prefix(repo_root)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|_| self.path.display().to_string())
    }

    /// Update this instance to the target commit.
    ///
    /// Fetches from `source_path` when the target came from a local tip
    /// (the commit may exist nowhere else), otherwise from all remotes.
    pub fn update_to_commit(
        &self,
        commit: &str,
        dry_run: bool,
        source_path: Option<&Path>,
    ) -> anyhow::Result<bool> {
        if dry_run {
            return Ok(true);
        }

        match source_path {
            Some(source) => {
                let source = source.display().to_string();
                run_git(&self.path, ["fetch", source.as_str()])?;
            }
            None => {
                run_git(&self.path, ["fetch", "--all", "--quiet"])?;
            }
        }

        Ok(run_git(&self.path, ["checkout", commit, "--quiet"])?.success())
    }
}

/// Whether a string looks like a git revision (7-40 lowercase hex chars).
pub fn is_hex_sha(s: &str) -> bool {
    (7..=40).contains(&s.len()) && s.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

/// Recursively collect `.gitmodules` files, skipping `node_modules` and
/// git metadata directories. Sorted for deterministic discovery.
fn find_gitmodules(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    let mut paths: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
    paths.sort();
    for path in paths {
        let name = path.file_name().unwrap_or_default();
        if path.is_dir() {
            if name == "node_modules" || name == ".git" {
                continue;
            }
            find_gitmodules(&path, out);
        } else if name == ".gitmodules" {
            out.push(path);
        }
    }
}

/// Discover every instance matching `url_match` by parsing all manifests.
pub fn discover_instances(repo_root: &Path, url_match: &str) -> anyhow::Result<Vec<Instance>> {
    let mut manifests = Vec::new();
    find_gitmodules(repo_root, &mut manifests);

    let mut instances = Vec::new();
    for manifest in manifests {
        let parent_repo = manifest.parent().unwrap_or(repo_root).to_path_buf();
        for entry in parse_gitmodules(&manifest, Some(url_match)) {
            let full_path = parent_repo.join(&entry.path);
            if !full_path.join(".git").exists() {
                continue;
            }
            let head = run_git(&full_path, ["rev-parse", "HEAD"])?;
            instances.push(Instance {
                path: full_path,
                parent_repo: parent_repo.clone(),
                rel_path_in_parent: entry.path,
                current_commit: head.success().then(|| head.out().to_string()),
            });
        }
    }
    Ok(instances)
}

/// Instance paths of every configured sync group; engines exclude these
/// from general repo discovery (shared instances are synced, not merged or
/// pushed individually).
pub fn sync_group_exclude_paths(repo_root: &Path, config: &GroveConfig) -> HashSet<PathBuf> {
    let mut paths = HashSet::new();
    for group in config.sync_groups.values() {
        if let Ok(instances) = discover_instances(repo_root, &group.url_match) {
            for instance in instances {
                paths.insert(instance.path);
            }
        }
    }
    paths
}

/// First matching remote URL from the root manifest.
fn resolve_remote_url(repo_root: &Path, url_match: &str) -> Option<String> {
    parse_gitmodules(&repo_root.join(".gitmodules"), Some(url_match))
        .into_iter()
        .next()
        .map(|e| e.url)
}

/// Resolve the target commit for the explicit / remote modes.
///
/// Order: explicit revision, the group's standalone clone, then a
/// refs-listing query against the remote URL.
fn resolve_target_commit(
    commit_arg: Option<&str>,
    standalone_repo: Option<&Path>,
    remote_url: Option<&str>,
) -> anyhow::Result<(String, String)> {
    if let Some(commit) = commit_arg {
        if !is_hex_sha(commit) {
            anyhow::bail!("Invalid commit SHA: {commit}");
        }
        return Ok((commit.to_string(), "CLI argument".to_string()));
    }

    if let Some(standalone) = standalone_repo {
        if !standalone.exists() {
            anyhow::bail!(
                "Standalone repo not found at {}\nPlease specify a commit SHA explicitly.",
                standalone.display()
            );
        }

        if run_git(standalone, ["remote", "get-url", "origin"])?.success() {
            run_git(standalone, ["fetch", "origin", "main", "--quiet"])?;
            let result = run_git(standalone, ["rev-parse", "origin/main"])?;
            if result.success() {
                return Ok((
                    result.out().to_string(),
                    format!("origin/main from {}", standalone.display()),
                ));
            }
        }

        let result = run_git(standalone, ["rev-parse", "main"])?;
        if result.success() {
            return Ok((
                result.out().to_string(),
                format!("main from {}", standalone.display()),
            ));
        }

        anyhow::bail!("Could not resolve commit from {}", standalone.display());
    }

    if let Some(url) = remote_url {
        let output = std::process::Command::new("git")
            .args(["ls-remote", url, "refs/heads/main"])
            .output()
            .map_err(|e| anyhow::anyhow!("Failed to run git ls-remote: {e}"))?;
        if !output.status.success() {
            anyhow::bail!(
                "git ls-remote failed for {url}\n\
                 Check network connectivity or specify a commit SHA explicitly."
            );
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout.trim();
        if line.is_empty() {
            anyhow::bail!("No 'main' branch found at {url}\nSpecify a commit SHA explicitly.");
        }
        let sha = line.split_whitespace().next().unwrap_or_default();
        return Ok((sha.to_string(), format!("main from {url}")));
    }

    anyhow::bail!(
        "Cannot resolve target commit: no standalone-repo configured and no remote URL found.\n\
         Please specify a commit SHA explicitly."
    );
}

/// Find the most advanced commit among local instances.
///
/// Returns `(commit, source_path, description)` when a single tip exists -
/// the revision every other pin is an ancestor of - or `None` when the pins
/// have diverged.
pub fn resolve_local_tip(
    instances: &[Instance],
    repo_root: &Path,
) -> anyhow::Result<Option<(String, PathBuf, String)>> {
    // Distinct pins, first instance wins as the representative.
    let mut commits: Vec<(String, &Instance)> = Vec::new();
    for instance in instances {
        if let Some(ref sha) = instance.current_commit
            && !commits.iter().any(|(s, _)| s == sha)
        {
            commits.push((sha.clone(), instance));
        }
    }

    if commits.is_empty() {
        return Ok(None);
    }

    if commits.len() == 1 {
        let (sha, instance) = &commits[0];
        let rel = instance.rel_path(repo_root);
        return Ok(Some((
            sha.clone(),
            instance.path.clone(),
            format!("local tip from {rel}"),
        )));
    }

    let (mut tip_sha, mut tip_instance) = commits[0].clone();

    for (sha, instance) in &commits[1..] {
        // Tip an ancestor of sha? Then sha is more advanced.
        if run_git(
            &instance.path,
            ["merge-base", "--is-ancestor", tip_sha.as_str(), sha.as_str()],
        )?
        .success()
        {
            tip_sha = sha.clone();
            tip_instance = *instance;
            continue;
        }
        // Sha an ancestor of the tip? Then the tip stands.
        if run_git(
            &tip_instance.path,
            ["merge-base", "--is-ancestor", sha.as_str(), tip_sha.as_str()],
        )?
        .success()
        {
            continue;
        }
        // Mutually non-ancestral: diverged.
        return Ok(None);
    }

    // The pairwise scan is not transitive; confirm the winner dominates all.
    for (sha, _) in &commits {
        if sha == &tip_sha {
            continue;
        }
        if !run_git(
            &tip_instance.path,
            ["merge-base", "--is-ancestor", sha.as_str(), tip_sha.as_str()],
        )?
        .success()
        {
            return Ok(None);
        }
    }

    let rel = tip_instance.rel_path(repo_root);
    Ok(Some((
        tip_sha,
        tip_instance.path.clone(),
        format!("local tip from {rel}"),
    )))
}

/// Parent repos that will need pointer commits, deepest first.
fn parent_repos_for_instances(instances: &[Instance], repo_root: &Path) -> Vec<Repo> {
    let mut parent_paths: HashSet<PathBuf> = HashSet::new();

    for instance in instances {
        parent_paths.insert(instance.parent_repo.clone());

        // Every ancestor repo between the parent and the root also sees a
        // pointer change ripple through.
        let mut current = instance.parent_repo.clone();
        while current != *repo_root {
            let Some(parent) = current.parent() else {
                break;
            };
            let parent = parent.to_path_buf();
            if parent.join(".git").exists() {
                parent_paths.insert(parent.clone());
            }
            if parent == *repo_root {
                break;
            }
            current = parent;
        }
    }
    parent_paths.insert(repo_root.to_path_buf());

    let mut repos: Vec<Repo> = parent_paths
        .into_iter()
        .map(|p| Repo::new(p, repo_root))
        .collect();
    repos.sort_by(|a, b| b.depth().cmp(&a.depth()).then(a.path.cmp(&b.path)));
    repos
}

/// Commit pointer changes for `subpaths` in a parent repo.
///
/// Returns true when a commit was made (or would be, in dry-run).
fn commit_submodule_changes(
    parent: &Repo,
    subpaths: &[String],
    message: &str,
    dry_run: bool,
) -> anyhow::Result<bool> {
    let mut has_changes = false;
    for subpath in subpaths {
        if !parent.git(["diff", "--quiet", subpath.as_str()])?.success() {
            has_changes = true;
            break;
        }
    }
    if !has_changes {
        return Ok(false);
    }

    if dry_run {
        println!(
            "  {} in {}: {message}",
            cformat!("<yellow>Would commit</>"),
            parent.label()
        );
        return Ok(true);
    }

    for subpath in subpaths {
        parent.add(subpath)?;
    }
    if parent.git(["diff", "--cached", "--quiet"])?.success() {
        return Ok(false);
    }

    parent.commit(message)?;
    println!(
        "  {} in {}: {message}",
        cformat!("<green>Committed</>"),
        parent.label()
    );
    Ok(true)
}

/// Push any instance ahead of its own upstream, so the remote has the
/// content before other locations sync to it.
fn push_ahead_instances(instances: &[Instance], dry_run: bool) -> anyhow::Result<bool> {
    let mut pushed_any = false;

    for instance in instances {
        let branch_out = run_git(&instance.path, ["branch", "--show-current"])?;
        let branch = branch_out.out().to_string();
        if branch.is_empty() {
            continue;
        }

        run_git(&instance.path, ["fetch", "origin", "--quiet"])?;

        let spec = format!("origin/{branch}..HEAD");
        let ahead = run_git(&instance.path, ["rev-list", "--count", spec.as_str()])?;
        if !ahead.success() {
            continue;
        }
        let count = ahead.out();
        if count.is_empty() || count == "0" {
            continue;
        }

        let rel = &instance.rel_path_in_parent;
        if dry_run {
            println!(
                "  {} {rel} ({count} commits ahead)",
                cformat!("<yellow>Would push</>")
            );
        } else if run_git(&instance.path, ["push", "origin", branch.as_str()])?.success() {
            println!("  {} {rel} ({count} commits)", cformat!("<green>Pushed</>"));
            pushed_any = true;
        } else {
            println!("  {} {rel}", cformat!("<red>Failed to push</>"));
        }
    }

    Ok(pushed_any)
}

/// Options shared by every sync invocation.
#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    pub dry_run: bool,
    pub no_push: bool,
    pub skip_checks: bool,
    pub remote: bool,
}

/// Sync a single group. Returns 0 on success, 1 on failure/pause.
fn sync_group(
    group: &SyncGroup,
    repo_root: &Path,
    commit_arg: Option<&str>,
    opts: SyncOptions,
) -> anyhow::Result<i32> {
    println!("{}", cformat!("<blue>=== Syncing group: {} ===</>", group.name));
    println!();

    // Phase 1: discover instances.
    println!(
        "{}",
        cformat!("<blue>Discovering {} submodule locations...</>", group.name)
    );
    let all_instances = discover_instances(repo_root, &group.url_match)?;

    if all_instances.is_empty() {
        println!(
            "{}",
            cformat!(
                "<red>Error: No submodules found matching '{}'</>",
                group.url_match
            )
        );
        return Ok(1);
    }

    let allow_drift: HashSet<&str> = group.allow_drift.iter().map(String::as_str).collect();
    let instances: Vec<Instance> = all_instances
        .iter()
        .filter(|i| !allow_drift.contains(i.rel_path(repo_root).as_str()))
        .cloned()
        .collect();

    // Phase 2: resolve the target commit.
    let mut source_path: Option<PathBuf> = None;
    let (target_commit, commit_source) = if let Some(commit) = commit_arg {
        println!("{}", cformat!("<blue>Resolving target commit...</>"));
        match resolve_target_commit(Some(commit), None, None) {
            Ok(resolved) => resolved,
            Err(e) => {
                println!("{}", cformat!("<red>Error: {e}</>"));
                return Ok(1);
            }
        }
    } else if opts.remote {
        println!("{}", cformat!("<blue>Checking for ahead submodules...</>"));
        if push_ahead_instances(&instances, opts.dry_run)? {
            println!();
        }

        println!(
            "{}",
            cformat!("<blue>Resolving target commit from remote...</>")
        );
        let remote_url = resolve_remote_url(repo_root, &group.url_match);
        match resolve_target_commit(None, group.standalone_repo.as_deref(), remote_url.as_deref()) {
            Ok(resolved) => resolved,
            Err(e) => {
                println!("{}", cformat!("<red>Error: {e}</>"));
                return Ok(1);
            }
        }
    } else {
        println!(
            "{}",
            cformat!("<blue>Resolving target commit from local instances...</>")
        );
        match resolve_local_tip(&instances, repo_root)? {
            Some((sha, path, desc)) => {
                source_path = Some(path);
                (sha, desc)
            }
            None => {
                // Diverged: hand off to the sync-merge sub-engine.
                println!(
                    "{}",
                    cformat!(
                        "<yellow>Local instances have diverged (no single tip); \
                         attempting merge...</>"
                    )
                );
                println!();
                match attempt_divergence_merge(group, &instances, repo_root, opts.dry_run)? {
                    Some((sha, workspace, desc)) => {
                        source_path = Some(workspace);
                        (sha, desc)
                    }
                    None => return Ok(1),
                }
            }
        }
    };

    let target_short = &target_commit[..target_commit.len().min(7)];
    println!(
        "Target: {} ({commit_source})",
        cformat!("<green>{target_short}</>")
    );
    println!();

    println!(
        "Found {} submodule locations:",
        cformat!("<green>{}</>", all_instances.len())
    );
    for instance in &all_instances {
        let rel = instance.rel_path(repo_root);
        let current = instance
            .current_commit
            .as_deref()
            .map(|c| &c[..c.len().min(7)])
            .unwrap_or("unknown");

        if allow_drift.contains(rel.as_str()) {
            println!(
                "  {} {rel} ({current}) {}",
                cformat!("<yellow>~</>"),
                cformat!("<yellow>(allow-drift, skipped)</>")
            );
        } else if current == target_short {
            println!("  {} {rel} (already at {current})", cformat!("<green>✓</>"));
        } else {
            println!(
                "  {} {rel} ({current} → {target_short})",
                cformat!("<yellow>→</>")
            );
        }
    }
    println!();

    let to_update: Vec<&Instance> = instances
        .iter()
        .filter(|i| {
            i.current_commit
                .as_deref()
                .is_none_or(|c| !c.starts_with(target_short))
        })
        .collect();

    if to_update.is_empty() {
        println!(
            "{}",
            cformat!(
                "<green>All {} submodules already at target commit. Nothing to do.</>",
                group.name
            )
        );
        return Ok(0);
    }

    // Phase 3: validate parent repos before committing into them.
    println!("{}", cformat!("<blue>Validating parent repositories...</>"));
    let mut parent_repos = parent_repos_for_instances(&instances, repo_root);

    println!("  Fetching from remotes...");
    for repo in &parent_repos {
        repo.fetch(false)?;
    }

    let mut validation_failed = false;
    for repo in &mut parent_repos {
        let valid = repo.validate(ValidateOptions {
            check_sync: true,
            ..Default::default()
        })?;
        if !valid {
            println!("  {} {}", cformat!("<red>✗</>"), repo.rel_path());
            if let Some(ref msg) = repo.error_message {
                println!("    {}", cformat!("<red>{msg}</>"));
            }
            validation_failed = true;
        }
    }

    print_status_table(&parent_repos, true);

    if validation_failed && !opts.skip_checks {
        println!(
            "{}",
            cformat!("<red>Validation failed. Fix the issues above or use --skip-checks.</>")
        );
        println!();
        println!("{}", cformat!("<blue>Common fixes:</>"));
        println!("  - Pull latest: cd <repo> && git pull");
        println!("  - Checkout branch: cd <repo> && git checkout main");
        return Ok(1);
    }
    if validation_failed && opts.skip_checks {
        println!(
            "{}",
            cformat!("<yellow>Warning: Proceeding despite validation failures (--skip-checks)</>")
        );
        println!();
    }

    if opts.dry_run {
        println!("{}", cformat!("<yellow>Dry run mode - previewing changes:</>"));
        println!();
    }

    // Phase 4: update instances.
    println!(
        "{}",
        cformat!("<blue>Updating {} submodules...</>", group.name)
    );
    let mut updated: Vec<&Instance> = Vec::new();
    for &instance in &to_update {
        let rel = instance.rel_path(repo_root);
        if opts.dry_run {
            println!("  {} {rel}", cformat!("<yellow>Would update</>"));
            updated.push(instance);
        } else if instance.update_to_commit(&target_commit, false, source_path.as_deref())? {
            println!("  {} {rel}", cformat!("<green>Updated</>"));
            updated.push(instance);
        } else {
            println!("  {} {rel}", cformat!("<red>Failed to update</>"));
        }
    }
    println!();

    if updated.is_empty() {
        println!("{}", cformat!("<yellow>No submodules were updated.</>"));
        return Ok(0);
    }

    // Phase 5: commit bottom-up.
    let commit_message = group.format_commit_message(target_short);
    println!("{}", cformat!("<blue>Committing changes bottom-up...</>"));

    let mut committed_count = 0usize;
    for repo in &parent_repos {
        let mut subpaths: Vec<String> = updated
            .iter()
            .filter(|i| i.parent_repo == repo.path)
            .map(|i| i.rel_path_in_parent.clone())
            .collect();

        if subpaths.is_empty() {
            // Intermediate repo: pick up child pointer changes that appeared
            // when a nested instance moved.
            let diff = repo.git(["diff", "--name-only"])?;
            if diff.success() {
                subpaths = diff
                    .out()
                    .lines()
                    .filter(|l| !l.is_empty())
                    .map(String::from)
                    .collect();
            }
        }

        if !subpaths.is_empty()
            && commit_submodule_changes(repo, &subpaths, &commit_message, opts.dry_run)?
        {
            committed_count += 1;
        }
    }
    println!();

    // Phase 6: push.
    if opts.no_push {
        println!("{}", cformat!("<yellow>Skipping push (--no-push specified)</>"));
        println!();
        println!("{}", cformat!("<blue>Next steps:</>"));
        println!("  1. Verify: grove check");
        println!("  2. Push:   grove push");
        return Ok(0);
    }

    if committed_count == 0 && !opts.dry_run {
        println!("{}", cformat!("<green>No commits made - nothing to push.</>"));
        return Ok(0);
    }

    // Re-validate for accurate ahead counts before pushing.
    let mut repos_to_push: Vec<Repo> = Vec::new();
    for repo in &mut parent_repos {
        repo.ahead = None;
        repo.behind = None;
        repo.status = RepoStatus::Ok;
        if repo.validate(ValidateOptions::default())? && repo.status == RepoStatus::Pending {
            repos_to_push.push(repo.clone());
        }
    }

    if repos_to_push.is_empty() && !opts.dry_run {
        println!(
            "{}",
            cformat!("<green>All repositories up-to-date. Nothing to push.</>")
        );
        return Ok(0);
    }

    println!(
        "{}",
        cformat!("<blue>Pushing {} repositories...</>", repos_to_push.len())
    );
    if opts.dry_run {
        println!("{}", cformat!("<yellow>(dry-run mode - no actual pushes)</>"));
    }
    println!();

    // Deepest first: children must land before the parents that pin them.
    repos_to_push.sort_by(|a, b| b.depth().cmp(&a.depth()).then(a.path.cmp(&b.path)));

    let mut push_failed = false;
    let mut pushed_count = 0usize;
    for repo in &repos_to_push {
        if repo.push(opts.dry_run)? {
            pushed_count += 1;
        } else {
            push_failed = true;
            println!("  {} {}", cformat!("<red>✗ Failed to push</>"), repo.rel_path());
        }
    }
    println!();

    if opts.dry_run {
        println!("{}", cformat!("<yellow>Dry run complete.</>"));
        println!();
        println!("{}", cformat!("<blue>Summary:</>"));
        println!("  Target commit: {target_short}");
        println!("  Submodules to update: {}", updated.len());
        println!("  Commits to make: {committed_count}");
        println!("  Repos to push: {}", repos_to_push.len());
        println!();
        println!("{}", cformat!("<blue>To execute:</>"));
        println!("  grove sync {}", group.name);
    } else if push_failed {
        println!("{}", cformat!("<red>Some pushes failed.</>"));
        println!();
        println!("{}", cformat!("<blue>Troubleshooting:</>"));
        println!("  - Check remote connectivity: git remote -v");
        println!("  - Try pushing manually: grove push");
        return Ok(1);
    } else {
        println!("{}", cformat!("<green>Sync complete for {}!</>", group.name));
        println!();
        println!("{}", cformat!("<blue>Summary:</>"));
        println!("  Target commit: {target_short}");
        println!("  Submodules updated: {}", updated.len());
        println!("  Repos pushed: {pushed_count}");
        println!();
        println!("{}", cformat!("<blue>Next steps:</>"));
        println!("  1. Verify: grove check");
    }

    Ok(0)
}

/// Drive the sync engine from CLI arguments.
///
/// With no group, every configured group syncs. A `group` that is not a
/// known name but looks like a 7-40 hex SHA is treated as a revision for
/// all groups.
pub fn run(
    group_arg: Option<&str>,
    sha_arg: Option<&str>,
    opts: SyncOptions,
) -> anyhow::Result<i32> {
    let repo_root = find_repo_root(None)?;
    let config = load_config(&repo_root)?;

    if config.sync_groups.is_empty() {
        println!(
            "{}",
            cformat!("<yellow>No sync groups configured. Nothing to sync.</>")
        );
        return Ok(0);
    }

    let mut group_name = group_arg.map(String::from);
    let mut commit_arg = sha_arg.map(String::from);

    if let Some(ref name) = group_name
        && !config.sync_groups.contains_key(name)
    {
        if is_hex_sha(name) {
            commit_arg = Some(name.clone());
            group_name = None;
        } else {
            println!("{}", cformat!("<red>Unknown sync group: {name}</>"));
            let names: Vec<&str> = config.sync_groups.keys().map(String::as_str).collect();
            println!("Available groups: {}", names.join(", "));
            return Ok(2);
        }
    }

    if let Some(ref sha) = commit_arg
        && !is_hex_sha(sha)
    {
        println!("{}", cformat!("<red>Invalid commit SHA: {sha}</>"));
        return Ok(2);
    }

    let groups: Vec<&SyncGroup> = match group_name {
        Some(ref name) => vec![&config.sync_groups[name]],
        None => config.sync_groups.values().collect(),
    };

    let mut exit_code = 0;
    for group in groups {
        let result = sync_group(group, &repo_root, commit_arg.as_deref(), opts)?;
        if result != 0 {
            exit_code = result;
        }
    }
    Ok(exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_sha_validation() {
        assert!(is_hex_sha("abc1234"));
        assert!(is_hex_sha(&"a".repeat(40)));
        assert!(!is_hex_sha("abc123")); // too short
        assert!(!is_hex_sha(&"a".repeat(41))); // too long
        assert!(!is_hex_sha("ABC1234")); // uppercase
        assert!(!is_hex_sha("xyz1234")); // not hex
    }

    #[test]
    fn resolve_target_validates_explicit_revisions() {
        let (sha, source) = resolve_target_commit(Some("abc1234"), None, None).unwrap();
        assert_eq!(sha, "abc1234");
        assert_eq!(source, "CLI argument");

        assert!(resolve_target_commit(Some("not-a-sha"), None, None).is_err());
        // Nothing to resolve from at all.
        assert!(resolve_target_commit(None, None, None).is_err());
        // A configured standalone that is missing on disk is an error, not
        // a silent fallback.
        assert!(
            resolve_target_commit(None, Some(Path::new("/no/such/clone")), None).is_err()
        );
    }

    #[test]
    fn parent_repos_are_ordered_deepest_first() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().to_path_buf();
        // Fake nested git repos: root, root/frontend
        std::fs::create_dir_all(root.join("frontend/libs/common")).unwrap();
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::create_dir_all(root.join("frontend/.git")).unwrap();

        let instances = vec![Instance {
            path: root.join("frontend/libs/common"),
            parent_repo: root.join("frontend"),
            rel_path_in_parent: "libs/common".into(),
            current_commit: Some("abc".into()),
        }];

        let repos = parent_repos_for_instances(&instances, &root);
        assert_eq!(repos.len(), 2);
        assert_eq!(repos[0].path, root.join("frontend"));
        assert_eq!(repos[1].path, root);
    }
}
