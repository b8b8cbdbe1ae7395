//! `.grove.toml` configuration.
//!
//! A single TOML document at the repository root configures sync groups,
//! merge test commands, and the cascade test tiers. Submodule repos may
//! carry their own `.grove.toml`; the merge engine consults it for a
//! per-repo `test-command` (see the resolution order on
//! [`MergeConfig`]).
//!
//! Parsing is strict: unknown keys anywhere are an error, so a typo like
//! `test-comand` fails loudly instead of silently skipping tests.

use std::path::{Path, PathBuf};

use anyhow::Context;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub const CONFIG_FILENAME: &str = ".grove.toml";
pub const DEFAULT_COMMIT_MESSAGE: &str = "chore: sync {group} submodule to {sha}";

/// The four cascade test tiers, a progressive confidence ladder:
///
/// - **local-tests** - project-internal, all deps mocked
/// - **contract-tests** - interface boundaries, other side mocked
/// - **integration-tests** - direct deps real, transitive deps mocked
/// - **system-tests** - everything real, no mocking
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Tier {
    LocalTests,
    ContractTests,
    IntegrationTests,
    SystemTests,
}

/// Tiers in execution order.
pub const CASCADE_TIERS: [Tier; 4] = [
    Tier::LocalTests,
    Tier::ContractTests,
    Tier::IntegrationTests,
    Tier::SystemTests,
];

/// A group of submodule instances that should all be at the same commit.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncGroup {
    pub name: String,
    /// Substring matched against manifest URLs to find instances.
    pub url_match: String,
    /// Optional standalone clone of the shared library.
    pub standalone_repo: Option<PathBuf>,
    /// Commit template with `{group}` and `{sha}` tokens.
    pub commit_message: String,
    /// Instance rel_paths whose pin may differ from the group tip.
    pub allow_drift: Vec<String>,
}

impl SyncGroup {
    /// Expand the commit-message template.
    pub fn format_commit_message(&self, sha: &str) -> String {
        self.commit_message
            .replace("{group}", &self.name)
            .replace("{sha}", sha)
    }
}

/// Configuration for `grove worktree merge`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeConfig {
    pub test_command: Option<String>,
    /// Per-repo overrides keyed by rel_path; an empty string disables
    /// testing for that repo.
    pub test_overrides: IndexMap<String, String>,
}

/// Configuration for `grove worktree add`. Parsed for compatibility; the
/// coordination engines do not consume it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorktreeConfig {
    pub copy_venv: bool,
}

/// Configuration for `grove cascade`.
///
/// Each tier is optional; an unconfigured tier is skipped during cascade
/// execution. `local-tests` falls back to `[worktree-merge].test-command`
/// (applied at load time).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CascadeConfig {
    pub local_tests: Option<String>,
    pub contract_tests: Option<String>,
    pub integration_tests: Option<String>,
    pub system_tests: Option<String>,
    /// Per-repo tier overrides keyed by rel_path.
    pub overrides: IndexMap<String, IndexMap<Tier, String>>,
}

impl CascadeConfig {
    /// This config's own command for a tier, ignoring overrides.
    pub fn tier_default(&self, tier: Tier) -> Option<&str> {
        match tier {
            Tier::LocalTests => self.local_tests.as_deref(),
            Tier::ContractTests => self.contract_tests.as_deref(),
            Tier::IntegrationTests => self.integration_tests.as_deref(),
            Tier::SystemTests => self.system_tests.as_deref(),
        }
    }

    /// Resolve the command for a tier and repo within this config alone:
    /// the per-repo override wins, then the tier default.
    ///
    /// `Some("")` is an explicit skip at the override level; `None` means
    /// the tier is not configured here. The full four-level chain (which
    /// also consults the repo's own config file) lives in the cascade
    /// engine.
    pub fn command(&self, tier: Tier, repo_rel_path: &str) -> Option<&str> {
        if let Some(repo_overrides) = self.overrides.get(repo_rel_path)
            && let Some(cmd) = repo_overrides.get(&tier)
        {
            return Some(cmd.as_str());
        }
        self.tier_default(tier)
    }

    /// Whether any tier has a command configured anywhere.
    pub fn any_tier_configured(&self) -> bool {
        self.local_tests.is_some()
            || self.contract_tests.is_some()
            || self.integration_tests.is_some()
            || self.system_tests.is_some()
    }
}

/// Top-level configuration loaded from `.grove.toml`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroveConfig {
    pub sync_groups: IndexMap<String, SyncGroup>,
    pub merge: MergeConfig,
    pub worktree: WorktreeConfig,
    pub cascade: CascadeConfig,
    pub aliases: IndexMap<String, String>,
}

// ---------------------------------------------------------------------------
// Raw TOML shapes (strict)
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(rename = "sync-groups", default)]
    sync_groups: IndexMap<String, RawSyncGroup>,
    #[serde(rename = "worktree-merge", default)]
    worktree_merge: RawMerge,
    #[serde(default)]
    worktree: RawWorktree,
    #[serde(default)]
    cascade: RawCascade,
    #[serde(default)]
    aliases: IndexMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSyncGroup {
    #[serde(rename = "url-match")]
    url_match: String,
    #[serde(rename = "standalone-repo")]
    standalone_repo: Option<String>,
    #[serde(rename = "commit-message")]
    commit_message: Option<String>,
    #[serde(rename = "allow-drift", default)]
    allow_drift: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMerge {
    #[serde(rename = "test-command")]
    test_command: Option<String>,
    #[serde(rename = "test-overrides", default)]
    test_overrides: IndexMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawWorktree {
    #[serde(rename = "copy-venv", default)]
    copy_venv: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCascade {
    #[serde(rename = "local-tests")]
    local_tests: Option<String>,
    #[serde(rename = "contract-tests")]
    contract_tests: Option<String>,
    #[serde(rename = "integration-tests")]
    integration_tests: Option<String>,
    #[serde(rename = "system-tests")]
    system_tests: Option<String>,
    #[serde(default)]
    overrides: IndexMap<String, IndexMap<String, String>>,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load `.grove.toml` from `repo_root`.
///
/// A missing file yields the default (empty) configuration. Invalid TOML,
/// unknown keys, or an unknown cascade tier name are errors.
pub fn load_config(repo_root: &Path) -> anyhow::Result<GroveConfig> {
    let config_path = repo_root.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(GroveConfig::default());
    }

    let content = std::fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read {}", config_path.display()))?;
    let raw: RawConfig = toml::from_str(&content)
        .with_context(|| format!("Invalid TOML in {}", config_path.display()))?;

    let mut sync_groups = IndexMap::new();
    for (name, group) in raw.sync_groups {
        if group.url_match.is_empty() {
            anyhow::bail!("sync-groups.{name}: 'url-match' is required");
        }
        let standalone_repo = group
            .standalone_repo
            .map(|p| PathBuf::from(shellexpand::tilde(&p).into_owned()));
        sync_groups.insert(
            name.clone(),
            SyncGroup {
                name,
                url_match: group.url_match,
                standalone_repo,
                commit_message: group
                    .commit_message
                    .unwrap_or_else(|| DEFAULT_COMMIT_MESSAGE.to_string()),
                allow_drift: group.allow_drift,
            },
        );
    }

    let merge = MergeConfig {
        test_command: raw.worktree_merge.test_command,
        test_overrides: raw.worktree_merge.test_overrides,
    };

    let mut overrides = IndexMap::new();
    for (repo_path, tiers) in raw.cascade.overrides {
        let mut repo_overrides = IndexMap::new();
        for (key, cmd) in tiers {
            let tier: Tier = key.parse().map_err(|_| {
                anyhow::anyhow!(
                    "cascade.overrides.{repo_path}.{key}: unknown tier \
                     (expected one of local-tests, contract-tests, integration-tests, system-tests)"
                )
            })?;
            repo_overrides.insert(tier, cmd);
        }
        overrides.insert(repo_path, repo_overrides);
    }

    // local-tests inherits the worktree-merge default when not set.
    let local_tests = raw
        .cascade
        .local_tests
        .or_else(|| merge.test_command.clone());

    let cascade = CascadeConfig {
        local_tests,
        contract_tests: raw.cascade.contract_tests,
        integration_tests: raw.cascade.integration_tests,
        system_tests: raw.cascade.system_tests,
        overrides,
    };

    Ok(GroveConfig {
        sync_groups,
        merge,
        worktree: WorktreeConfig {
            copy_venv: raw.worktree.copy_venv,
        },
        cascade,
        aliases: raw.aliases,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_from(content: &str) -> anyhow::Result<GroveConfig> {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILENAME), content).unwrap();
        load_config(tmp.path())
    }

    #[test]
    fn missing_file_is_default() {
        let tmp = tempfile::tempdir().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert!(config.sync_groups.is_empty());
        assert!(config.merge.test_command.is_none());
    }

    #[test]
    fn parses_sync_groups_with_defaults() {
        let config = load_from(
            r#"
            [sync-groups.common]
            url-match = "org/common"
            allow-drift = ["vendor/common-fork"]

            [sync-groups.proto]
            url-match = "org/proto"
            commit-message = "chore: bump {group} to {sha}"
            standalone-repo = "~/src/proto"
            "#,
        )
        .unwrap();

        let common = &config.sync_groups["common"];
        assert_eq!(common.url_match, "org/common");
        assert_eq!(common.commit_message, DEFAULT_COMMIT_MESSAGE);
        assert_eq!(common.allow_drift, ["vendor/common-fork"]);
        assert_eq!(
            common.format_commit_message("abc1234"),
            "chore: sync common submodule to abc1234"
        );

        let proto = &config.sync_groups["proto"];
        assert_eq!(
            proto.format_commit_message("abc1234"),
            "chore: bump proto to abc1234"
        );
        // ~ was expanded to an absolute path
        assert!(proto.standalone_repo.as_ref().unwrap().is_absolute());
    }

    #[test]
    fn url_match_is_required() {
        let err = load_from("[sync-groups.common]\nallow-drift = []\n").unwrap_err();
        assert!(err.to_string().contains("Invalid TOML"));
    }

    #[test]
    fn unknown_keys_are_errors() {
        assert!(load_from("[worktree-merge]\ntest-comand = \"make test\"\n").is_err());
        assert!(load_from("[unknown-section]\nx = 1\n").is_err());
    }

    #[test]
    fn cascade_overrides_resolve_before_tier_defaults() {
        let config = load_from(
            r#"
            [cascade]
            local-tests = "make test"
            integration-tests = "make integration"

            [cascade.overrides."td"]
            local-tests = "pytest -x"

            [cascade.overrides."td/common"]
            integration-tests = ""
            "#,
        )
        .unwrap();

        let c = &config.cascade;
        assert_eq!(c.command(Tier::LocalTests, "td"), Some("pytest -x"));
        assert_eq!(c.command(Tier::LocalTests, "other"), Some("make test"));
        // Explicit empty override: present but empty (a skip for the caller).
        assert_eq!(c.command(Tier::IntegrationTests, "td/common"), Some(""));
        assert_eq!(c.command(Tier::ContractTests, "td"), None);
    }

    #[test]
    fn unknown_cascade_tier_is_an_error() {
        let err = load_from(
            r#"
            [cascade.overrides."td"]
            smoke-tests = "make smoke"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown tier"));
    }

    #[test]
    fn local_tests_inherits_merge_test_command() {
        let config = load_from(
            r#"
            [worktree-merge]
            test-command = "make check"
            "#,
        )
        .unwrap();
        assert_eq!(config.cascade.local_tests.as_deref(), Some("make check"));
        assert!(config.cascade.contract_tests.is_none());
    }

    #[test]
    fn explicit_local_tests_wins_over_inherited() {
        let config = load_from(
            r#"
            [worktree-merge]
            test-command = "make check"

            [cascade]
            local-tests = "make fast"
            "#,
        )
        .unwrap();
        assert_eq!(config.cascade.local_tests.as_deref(), Some("make fast"));
    }

    #[test]
    fn tier_names_round_trip() {
        for tier in CASCADE_TIERS {
            let name = tier.to_string();
            assert_eq!(name.parse::<Tier>().unwrap(), tier);
        }
        assert_eq!(Tier::LocalTests.to_string(), "local-tests");
    }

    #[test]
    fn aliases_and_worktree_parse() {
        let config = load_from(
            r#"
            [worktree]
            copy-venv = true

            [aliases]
            wm = "worktree merge"
            "#,
        )
        .unwrap();
        assert!(config.worktree.copy_venv);
        assert_eq!(config.aliases["wm"], "worktree merge");
    }
}
