//! Repository discovery over `.gitmodules` manifests.
//!
//! Discovery walks the manifest files depth-first from the root, building
//! [`Repo`] records with parent indices as it goes. Only initialised
//! submodules (a `.git` entry exists on disk) are included, and anything
//! under a `node_modules` segment is ignored. This is the single source of
//! truth for tree structure: every engine orders its work from the parent
//! relation established here.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::git::Repo;

/// One `[submodule "..."]` section from a `.gitmodules` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmoduleRef {
    pub name: String,
    /// Path relative to the parent repository.
    pub path: String,
    pub url: String,
}

/// Parse a `.gitmodules` file into submodule entries.
///
/// When `url_match` is given, only entries whose URL contains that substring
/// are returned. A missing or empty file yields an empty list.
pub fn parse_gitmodules(
    gitmodules_path: &Path,
    url_match: Option<&str>,
) -> Vec<SubmoduleRef> {
    let Ok(content) = std::fs::read_to_string(gitmodules_path) else {
        return Vec::new();
    };

    let mut results = Vec::new();
    let mut name: Option<String> = None;
    let mut path: Option<String> = None;
    let mut url: Option<String> = None;

    let mut flush = |name: &mut Option<String>, path: &mut Option<String>, url: &mut Option<String>| {
        if let (Some(n), Some(p), Some(u)) = (name.take(), path.take(), url.take())
            && url_match.is_none_or(|m| u.contains(m))
        {
            results.push(SubmoduleRef {
                name: n,
                path: p,
                url: u,
            });
        }
        *name = None;
        *path = None;
        *url = None;
    };

    for line in content.lines() {
        let line = line.trim();
        if line.starts_with("[submodule") {
            flush(&mut name, &mut path, &mut url);
            name = line
                .split_once('"')
                .and_then(|(_, rest)| rest.rsplit_once('"'))
                .map(|(n, _)| n.to_string());
        } else if let Some(rest) = line.strip_prefix("path = ") {
            path = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("url = ") {
            url = Some(rest.trim().to_string());
        }
    }
    flush(&mut name, &mut path, &mut url);

    results
}

/// Discover repos by recursively walking `.gitmodules` files from `root`.
///
/// Returns the root repo first, then children in depth-first order, each
/// with its `parent` index set. Paths in `exclude` (typically shared
/// sync-group instances) are dropped along with their subtrees.
pub fn discover_repos(root: &Path, exclude: &HashSet<PathBuf>) -> Vec<Repo> {
    let mut repos = vec![Repo::new(root, root)];
    walk(0, root, exclude, &mut repos);
    repos
}

fn walk(parent_idx: usize, root: &Path, exclude: &HashSet<PathBuf>, repos: &mut Vec<Repo>) {
    let parent_path = repos[parent_idx].path.clone();
    for entry in parse_gitmodules(&parent_path.join(".gitmodules"), None) {
        let full_path = parent_path.join(&entry.path);
        if full_path
            .components()
            .any(|c| c.as_os_str() == "node_modules")
        {
            continue;
        }
        if !full_path.join(".git").exists() {
            continue;
        }
        if exclude.contains(&full_path) {
            continue;
        }
        let mut child = Repo::new(&full_path, root);
        child.parent = Some(parent_idx);
        repos.push(child);
        let child_idx = repos.len() - 1;
        walk(child_idx, root, exclude, repos);
    }
}

/// Indices of `repos` in bottom-up order: every child before its parent,
/// siblings tie-broken by path so the order is deterministic.
pub fn topological_order(repos: &[Repo]) -> Vec<usize> {
    // Children lists, sorted by path for the tie-break.
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); repos.len()];
    let mut roots = Vec::new();
    for (i, repo) in repos.iter().enumerate() {
        match repo.parent {
            Some(p) => children[p].push(i),
            None => roots.push(i),
        }
    }
    for list in &mut children {
        list.sort_by(|&a, &b| repos[a].path.cmp(&repos[b].path));
    }
    roots.sort_by(|&a, &b| repos[a].path.cmp(&repos[b].path));

    // Iterative post-order: children emitted before their parent.
    let mut order = Vec::with_capacity(repos.len());
    let mut stack: Vec<(usize, bool)> = roots.into_iter().rev().map(|i| (i, false)).collect();
    while let Some((idx, expanded)) = stack.pop() {
        if expanded {
            order.push(idx);
        } else {
            stack.push((idx, true));
            for &child in children[idx].iter().rev() {
                stack.push((child, false));
            }
        }
    }
    order
}

/// Locate a repo by absolute path in a discovery result.
pub fn find_repo<'a>(repos: &'a [Repo], path: &Path) -> Option<(usize, &'a Repo)> {
    repos.iter().enumerate().find(|(_, r)| r.path == path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_gitmodules(dir: &Path, entries: &[(&str, &str, &str)]) {
        let mut content = String::new();
        for (name, path, url) in entries {
            content.push_str(&format!(
                "[submodule \"{name}\"]\n\tpath = {path}\n\turl = {url}\n"
            ));
        }
        std::fs::write(dir.join(".gitmodules"), content).unwrap();
    }

    #[test]
    fn parse_returns_all_entries() {
        let tmp = tempfile::tempdir().unwrap();
        write_gitmodules(
            tmp.path(),
            &[
                ("td", "td", "git@example.com:org/td.git"),
                ("common", "libs/common", "git@example.com:org/common.git"),
            ],
        );
        let entries = parse_gitmodules(&tmp.path().join(".gitmodules"), None);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "td");
        assert_eq!(entries[1].path, "libs/common");
    }

    #[test]
    fn parse_filters_by_url_substring() {
        let tmp = tempfile::tempdir().unwrap();
        write_gitmodules(
            tmp.path(),
            &[
                ("td", "td", "git@example.com:org/td.git"),
                ("common", "libs/common", "git@example.com:org/common.git"),
            ],
        );
        let entries = parse_gitmodules(&tmp.path().join(".gitmodules"), Some("common"));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "libs/common");
    }

    #[test]
    fn parse_missing_file_is_empty() {
        let entries = parse_gitmodules(Path::new("/nonexistent/.gitmodules"), None);
        assert!(entries.is_empty());
    }

    #[test]
    fn topological_order_puts_children_before_parents() {
        // Build a fake discovery result: root -> a, root -> b, a -> a/x
        let root = PathBuf::from("/g");
        let mut repos = vec![Repo::new("/g", &root)];
        let mut a = Repo::new("/g/a", &root);
        a.parent = Some(0);
        repos.push(a);
        let mut b = Repo::new("/g/b", &root);
        b.parent = Some(0);
        repos.push(b);
        let mut ax = Repo::new("/g/a/x", &root);
        ax.parent = Some(1);
        repos.push(ax);

        let order = topological_order(&repos);
        let pos = |idx: usize| order.iter().position(|&i| i == idx).unwrap();

        for (i, repo) in repos.iter().enumerate() {
            if let Some(p) = repo.parent {
                assert!(pos(i) < pos(p), "child {i} must precede parent {p}");
            }
        }
        // Root comes last, deepest leaf first among its chain.
        assert_eq!(*order.last().unwrap(), 0);
    }

    #[test]
    fn topological_order_breaks_sibling_ties_by_path() {
        let root = PathBuf::from("/g");
        let mut repos = vec![Repo::new("/g", &root)];
        for name in ["zeta", "alpha", "mid"] {
            let mut r = Repo::new(format!("/g/{name}"), &root);
            r.parent = Some(0);
            repos.push(r);
        }
        let order = topological_order(&repos);
        let names: Vec<String> = order
            .iter()
            .take(3)
            .map(|&i| repos[i].path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["alpha", "mid", "zeta"]);
    }
}
