//! Health checks and bottom-up push.

mod common;

use common::{GroveTree, SyncTree, commit_file, git, git_out, grove_cmd};

#[test]
fn check_passes_on_a_healthy_tree() {
    let tree = SyncTree::new();
    // Sync-group instances stay pinned (detached); the project submodules
    // must sit on a branch.
    for repo in [&tree.root.join("frontend"), &tree.root.join("backend")] {
        git(repo, &["checkout", "main"]);
    }

    grove_cmd(&tree.root)
        .arg("check")
        .assert()
        .success()
        .stdout(predicates::str::contains("All checks passed"));
}

#[test]
fn check_fails_when_instances_disagree() {
    let tree = SyncTree::new();
    for repo in [&tree.root.join("frontend"), &tree.root.join("backend")] {
        git(repo, &["checkout", "main"]);
    }
    commit_file(
        &tree.frontend_instance,
        "drift.txt",
        "drift\n",
        "frontend drifts",
    );

    grove_cmd(&tree.root)
        .arg("check")
        .assert()
        .code(1)
        .stdout(predicates::str::contains("NOT in sync"))
        .stdout(predicates::str::contains("grove sync"));
}

#[test]
fn check_flags_detached_project_submodules() {
    let tree = GroveTree::new("");
    // Submodules are detached right after init; that is exactly the
    // unhealthy state check reports.
    grove_cmd(&tree.root)
        .arg("check")
        .assert()
        .code(1)
        .stdout(predicates::str::contains("detached HEAD state"));

    tree.checkout_main_everywhere();
    grove_cmd(&tree.root)
        .arg("check")
        .assert()
        .success()
        .stdout(predicates::str::contains("All checks passed"));
}

#[test]
fn push_reports_nothing_to_do_on_a_fresh_tree() {
    let tree = GroveTree::new("");
    tree.checkout_main_everywhere();

    grove_cmd(&tree.root)
        .arg("push")
        .assert()
        .success()
        .stdout(predicates::str::contains("Nothing to push"));
}

#[test]
fn push_sends_pending_commits_bottom_up() {
    let tree = GroveTree::new("");
    tree.checkout_main_everywhere();

    // New commit in td, pointer recorded in root so nothing is "dirty".
    commit_file(&tree.td, "work.txt", "work\n", "td work");
    git(&tree.root, &["add", "td"]);
    git(&tree.root, &["commit", "-m", "bump td"]);

    let td_head = tree.head(&tree.td);

    grove_cmd(&tree.root)
        .arg("push")
        .assert()
        .success()
        .stdout(predicates::str::contains("Pushing"));

    // The origin received td's commit.
    assert_eq!(git_out(&tree.td_origin, &["rev-parse", "main"]), td_head);
}

#[test]
fn push_dry_run_pushes_nothing() {
    let tree = GroveTree::new("");
    tree.checkout_main_everywhere();

    commit_file(&tree.td, "work.txt", "work\n", "td work");
    git(&tree.root, &["add", "td"]);
    git(&tree.root, &["commit", "-m", "bump td"]);

    let origin_before = git_out(&tree.td_origin, &["rev-parse", "main"]);

    grove_cmd(&tree.root)
        .args(["push", "--dry-run"])
        .assert()
        .success()
        .stdout(predicates::str::contains("Dry run complete"));

    assert_eq!(git_out(&tree.td_origin, &["rev-parse", "main"]), origin_before);
}

#[test]
fn push_path_filter_limits_the_set() {
    let tree = GroveTree::new("");
    tree.checkout_main_everywhere();

    commit_file(&tree.common, "c.txt", "c\n", "common work");
    git(&tree.td, &["add", "common"]);
    git(&tree.td, &["commit", "-m", "bump common"]);
    git(&tree.root, &["add", "td"]);
    git(&tree.root, &["commit", "-m", "bump td"]);

    let td_origin_before = git_out(&tree.td_origin, &["rev-parse", "main"]);
    let common_head = tree.head(&tree.common);

    grove_cmd(&tree.root)
        .args(["push", "td/common"])
        .assert()
        .success();

    // Only the filtered repo was pushed.
    assert_eq!(
        git_out(&tree.common_origin, &["rev-parse", "main"]),
        common_head
    );
    assert_eq!(
        git_out(&tree.td_origin, &["rev-parse", "main"]),
        td_origin_before
    );
}

#[test]
fn push_with_uncommitted_changes_fails_validation() {
    let tree = GroveTree::new("");
    tree.checkout_main_everywhere();
    std::fs::write(tree.root.join("dirty.txt"), "dirt\n").unwrap();

    grove_cmd(&tree.root)
        .arg("push")
        .assert()
        .code(1)
        .stdout(predicates::str::contains("Validation failed"));
}
