//! Driver-level behaviour: discovery, ancestry queries, merge simulation.

mod common;

use std::collections::HashSet;

use common::{GroveTree, commit_file, git, git_ok, git_out, init_repo};
use grove::discovery::{discover_repos, topological_order};
use grove::git::{Repo, ValidateOptions};

#[test]
fn discovery_finds_the_tree_with_parent_pointers() {
    let tree = GroveTree::new("");
    let repos = discover_repos(&tree.root, &HashSet::new());

    assert_eq!(repos.len(), 3);
    assert_eq!(repos[0].rel_path(), ".");
    assert_eq!(repos[1].rel_path(), "td");
    assert_eq!(repos[2].rel_path(), "td/common");
    assert_eq!(repos[1].parent, Some(0));
    assert_eq!(repos[2].parent, Some(1));

    // Re-running discovery is idempotent.
    let again = discover_repos(&tree.root, &HashSet::new());
    let paths: Vec<_> = repos.iter().map(|r| r.path.clone()).collect();
    let paths_again: Vec<_> = again.iter().map(|r| r.path.clone()).collect();
    assert_eq!(paths, paths_again);
}

#[test]
fn exclusion_drops_a_subtree() {
    let tree = GroveTree::new("");
    let mut exclude = HashSet::new();
    exclude.insert(tree.common.clone());

    let repos = discover_repos(&tree.root, &exclude);
    assert_eq!(repos.len(), 2);
    assert!(repos.iter().all(|r| r.path != tree.common));
}

#[test]
fn topological_order_is_bottom_up() {
    let tree = GroveTree::new("");
    let repos = discover_repos(&tree.root, &HashSet::new());
    let order = topological_order(&repos);

    let rels: Vec<String> = order.iter().map(|&i| repos[i].rel_path()).collect();
    assert_eq!(rels, ["td/common", "td", "."]);
}

#[test]
fn simulate_merge_restores_tree_on_conflict() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("repo");
    init_repo(&path);
    commit_file(&path, "clash.txt", "base\n", "base");

    git(&path, &["checkout", "-b", "feature"]);
    std::fs::write(path.join("clash.txt"), "feature\n").unwrap();
    git(&path, &["commit", "-am", "feature side"]);
    git(&path, &["checkout", "main"]);
    std::fs::write(path.join("clash.txt"), "main\n").unwrap();
    git(&path, &["commit", "-am", "main side"]);

    let head_before = git_out(&path, &["rev-parse", "HEAD"]);
    let repo = Repo::new(&path, &path);
    let (clean, conflicts) = repo.simulate_merge("feature").unwrap();

    assert!(!clean);
    assert_eq!(conflicts, ["clash.txt"]);
    // Fully restored: same head, clean tree, no merge in progress.
    assert_eq!(git_out(&path, &["rev-parse", "HEAD"]), head_before);
    assert_eq!(git_out(&path, &["status", "--porcelain"]), "");
    assert!(!git_ok(&path, &["rev-parse", "--verify", "MERGE_HEAD"]));
    assert_eq!(std::fs::read_to_string(path.join("clash.txt")).unwrap(), "main\n");
}

#[test]
fn simulate_merge_restores_tree_when_clean() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("repo");
    init_repo(&path);

    git(&path, &["checkout", "-b", "feature"]);
    commit_file(&path, "new.txt", "new\n", "feature adds file");
    git(&path, &["checkout", "main"]);

    let head_before = git_out(&path, &["rev-parse", "HEAD"]);
    let repo = Repo::new(&path, &path);
    let (clean, conflicts) = repo.simulate_merge("feature").unwrap();

    assert!(clean);
    assert!(conflicts.is_empty());
    assert_eq!(git_out(&path, &["rev-parse", "HEAD"]), head_before);
    assert_eq!(git_out(&path, &["status", "--porcelain"]), "");
    assert!(!path.join("new.txt").exists());
}

#[test]
fn ahead_behind_reports_new_branch_without_upstream() {
    let tmp = tempfile::tempdir().unwrap();

    // A bare origin with an unrelated branch, so ls-remote finds nothing
    // for ours.
    let origin = tmp.path().join("origin.git");
    std::fs::create_dir_all(&origin).unwrap();
    git(&origin, &["init", "--bare", "-b", "other"]);

    let path = tmp.path().join("repo");
    init_repo(&path);
    git(&path, &["remote", "add", "origin", origin.to_str().unwrap()]);

    let repo = Repo::new(&path, &path);
    let (ahead, behind) = repo.ahead_behind("main").unwrap();
    assert_eq!(ahead, "new-branch");
    assert_eq!(behind, "0");

    // After pushing with an upstream, counts are plain zero.
    git(&path, &["push", "-u", "origin", "main"]);
    let (ahead, behind) = repo.ahead_behind("main").unwrap();
    assert_eq!(ahead, "0");
    assert_eq!(behind, "0");
}

#[test]
fn unmerged_files_are_sorted() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("repo");
    init_repo(&path);
    commit_file(&path, "b.txt", "base\n", "base b");
    commit_file(&path, "a.txt", "base\n", "base a");

    git(&path, &["checkout", "-b", "feature"]);
    std::fs::write(path.join("b.txt"), "feature\n").unwrap();
    std::fs::write(path.join("a.txt"), "feature\n").unwrap();
    git(&path, &["commit", "-am", "feature side"]);
    git(&path, &["checkout", "main"]);
    std::fs::write(path.join("b.txt"), "main\n").unwrap();
    std::fs::write(path.join("a.txt"), "main\n").unwrap();
    git(&path, &["commit", "-am", "main side"]);

    // Leave the conflict in place this time.
    let repo = Repo::new(&path, &path);
    let merge = repo.git(["merge", "feature"]).unwrap();
    assert!(!merge.success());

    assert_eq!(repo.unmerged_files().unwrap(), ["a.txt", "b.txt"]);
    assert!(repo.has_merge_in_progress().unwrap());
    repo.merge_abort().unwrap();
    assert!(!repo.has_merge_in_progress().unwrap());
}

#[test]
fn validate_flags_uncommitted_and_detached_states() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("repo");
    init_repo(&path);

    let mut repo = Repo::new(&path, &path);

    // Dirty tree.
    std::fs::write(path.join("wip.txt"), "wip\n").unwrap();
    assert!(!repo.validate(ValidateOptions::default()).unwrap());
    assert_eq!(repo.status.to_string(), "uncommitted");
    std::fs::remove_file(path.join("wip.txt")).unwrap();

    // Detached HEAD: fatal unless allowed.
    let head = git_out(&path, &["rev-parse", "HEAD"]);
    git(&path, &["checkout", &head]);
    assert!(!repo.validate(ValidateOptions::default()).unwrap());
    assert_eq!(repo.status.to_string(), "detached");
    assert!(
        repo.validate(ValidateOptions {
            allow_detached: true,
            ..Default::default()
        })
        .unwrap()
    );
    git(&path, &["checkout", "main"]);

    // No remote: fatal unless allowed.
    assert!(!repo.validate(ValidateOptions::default()).unwrap());
    assert_eq!(repo.status.to_string(), "no-remote");
    assert!(
        repo.validate(ValidateOptions {
            allow_no_remote: true,
            ..Default::default()
        })
        .unwrap()
    );
}

#[test]
fn changed_files_can_exclude_submodule_pointers() {
    let tree = GroveTree::new("");
    // Move the leaf so td's pointer is dirty.
    commit_file(&tree.common, "change.txt", "leaf change\n", "leaf change");

    let td = Repo::new(&tree.td, &tree.root);
    let with_subs = td.changed_files(false).unwrap();
    assert!(with_subs.iter().any(|l| l.ends_with("common")));

    let without_subs = td.changed_files(true).unwrap();
    assert!(without_subs.is_empty());
}
