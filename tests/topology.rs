//! Topology cache behaviour against real submodule trees.

mod common;

use std::collections::HashSet;

use common::{GroveTree, git, git_out};
use grove::discovery::discover_repos;
use grove::topology::TopologyCache;

#[test]
fn snapshot_diff_detects_an_added_submodule() {
    let tree = GroveTree::new("");

    let repos = discover_repos(&tree.root, &HashSet::new());
    let rev_a = git_out(&tree.root, &["rev-parse", "--short", "HEAD"]);

    let mut cache = TopologyCache::for_repo(&tree.root).unwrap();
    cache.load().unwrap();
    cache.record(&rev_a, &repos, &tree.root).unwrap();
    cache.save().unwrap();

    // Add a second submodule at the root and commit.
    git(
        &tree.root,
        &[
            "submodule",
            "add",
            tree.common_origin.to_str().unwrap(),
            "shared",
        ],
    );
    git(&tree.root, &["commit", "-m", "Add shared submodule"]);

    let repos = discover_repos(&tree.root, &HashSet::new());
    let rev_b = git_out(&tree.root, &["rev-parse", "--short", "HEAD"]);
    cache.record(&rev_b, &repos, &tree.root).unwrap();
    cache.save().unwrap();

    let diff = cache.compare(&rev_a, &rev_b).expect("both revs cached");
    assert_eq!(diff.added.len(), 1);
    assert_eq!(diff.added[0].rel_path, "shared");
    assert!(diff.removed.is_empty());
    assert!(diff.changed_url.is_empty());
    assert!(diff.changed_relative_url.is_empty());
    assert!(diff.reparented.is_empty());
    assert!(diff.has_structural_changes());

    let snap_a = cache.get(&rev_a).unwrap();
    let snap_b = cache.get(&rev_b).unwrap();
    assert_ne!(snap_a.topology_hash, snap_b.topology_hash);
}

#[test]
fn entries_carry_parents_and_urls() {
    let tree = GroveTree::new("");

    let repos = discover_repos(&tree.root, &HashSet::new());
    let rev = git_out(&tree.root, &["rev-parse", "--short", "HEAD"]);

    let mut cache = TopologyCache::for_repo(&tree.root).unwrap();
    cache.load().unwrap();
    cache.record(&rev, &repos, &tree.root).unwrap();

    let snap = cache.get(&rev).unwrap();
    assert_eq!(snap.entries.len(), 2);

    let td = snap.entries.iter().find(|e| e.rel_path == "td").unwrap();
    assert_eq!(td.parent_rel_path, ".");
    assert!(td.url.contains("td_origin"));

    let common = snap
        .entries
        .iter()
        .find(|e| e.rel_path == "td/common")
        .unwrap();
    assert_eq!(common.parent_rel_path, "td");
    assert!(common.url.contains("common_origin"));
    assert!(!common.commit.is_empty());
}

#[test]
fn cache_is_shared_and_deduplicated() {
    let tree = GroveTree::new("");
    let repos = discover_repos(&tree.root, &HashSet::new());
    let rev = git_out(&tree.root, &["rev-parse", "--short", "HEAD"]);

    let mut cache = TopologyCache::for_repo(&tree.root).unwrap();
    cache.load().unwrap();
    cache.record(&rev, &repos, &tree.root).unwrap();
    cache.record(&rev, &repos, &tree.root).unwrap();
    assert_eq!(cache.snapshots.len(), 1);
    cache.save().unwrap();

    // The cache lives in the shared .git directory, under grove/.
    let cache_file = tree.root.join(".git").join("grove").join("topology.json");
    assert!(cache_file.exists());
    assert!(cache_file.with_extension("json.lock").exists());

    // A fresh handle sees the persisted snapshot.
    let mut reopened = TopologyCache::for_repo(&tree.root).unwrap();
    reopened.load().unwrap();
    assert!(reopened.get(&rev).is_some());
}

#[test]
fn comparing_unknown_revisions_returns_none() {
    let tree = GroveTree::new("");
    let mut cache = TopologyCache::for_repo(&tree.root).unwrap();
    cache.load().unwrap();
    assert!(cache.compare("0000000", "1111111").is_none());
}
