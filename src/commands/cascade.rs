//! Bottom-up cascade integration with tiered testing.
//!
//! Propagates a change from a leaf submodule upward through its chain of
//! parents, running a progressive ladder of test tiers at each level and
//! committing the submodule pointer bump at each parent. A failing tier
//! pauses the cascade with state on disk; `--continue` resumes from the
//! failed tier and `--abort` rolls every pointer commit back.

use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use color_print::cformat;
use serde::{Deserialize, Serialize};

use crate::config::{CASCADE_TIERS, CascadeConfig, Tier, load_config};
use crate::discovery::discover_repos;
use crate::git::{Repo, find_repo_root, run_git};
use crate::journal::Journal;
use crate::shell_exec::run_test;
use crate::state::{CASCADE_STATE_FILE, load_state, remove_state, save_state, state_path};
use crate::styling::println;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Position of a repo in the cascade chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Role {
    Leaf,
    Intermediate,
    Root,
}

/// Per-repo cascade progress. Statuses advance strictly in this order;
/// `Paused` is the only off-ladder state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum CascadeStatus {
    Pending,
    LocalPassed,
    ContractPassed,
    IntegrationPassed,
    SystemPassed,
    Committed,
    Paused,
}

/// Which repos run system-tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SystemMode {
    /// Root only.
    Default,
    /// Every repo in the chain.
    All,
    /// Nowhere.
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisEntry {
    pub rel_path: String,
    pub tier: Tier,
    pub passed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeEntry {
    pub rel_path: String,
    pub role: Role,
    pub status: CascadeStatus,
    pub pre_cascade_head: Option<String>,
    pub failed_tier: Option<Tier>,
    pub diagnosis: Option<Vec<DiagnosisEntry>>,
}

impl CascadeEntry {
    fn new(rel_path: String, role: Role) -> Self {
        Self {
            rel_path,
            role,
            status: CascadeStatus::Pending,
            pre_cascade_head: None,
            failed_tier: None,
            diagnosis: None,
        }
    }
}

/// Persistent cascade state across CLI invocations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeState {
    pub submodule_path: String,
    pub started_at: String,
    pub system_mode: SystemMode,
    pub quick: bool,
    pub repos: Vec<CascadeEntry>,
}

/// Options for a new cascade run.
#[derive(Debug, Clone, Copy)]
pub struct CascadeOptions {
    pub dry_run: bool,
    pub system_mode: SystemMode,
    pub quick: bool,
    pub skip_checks: bool,
}

fn tier_status(tier: Tier) -> CascadeStatus {
    match tier {
        Tier::LocalTests => CascadeStatus::LocalPassed,
        Tier::ContractTests => CascadeStatus::ContractPassed,
        Tier::IntegrationTests => CascadeStatus::IntegrationPassed,
        Tier::SystemTests => CascadeStatus::SystemPassed,
    }
}

/// Which tiers run at a node, by role and invocation mode.
fn determine_tiers(role: Role, system_mode: SystemMode, quick: bool) -> Vec<Tier> {
    if quick {
        return vec![Tier::LocalTests, Tier::ContractTests];
    }

    let mut tiers = vec![Tier::LocalTests, Tier::ContractTests];
    if matches!(role, Role::Intermediate | Role::Root) {
        tiers.push(Tier::IntegrationTests);
    }
    match system_mode {
        SystemMode::All => tiers.push(Tier::SystemTests),
        SystemMode::Default if role == Role::Root => tiers.push(Tier::SystemTests),
        _ => {}
    }
    tiers
}

// ---------------------------------------------------------------------------
// Chain discovery
// ---------------------------------------------------------------------------

/// Build the chain [leaf, parent, ..., root] by following parent indices.
pub fn discover_chain(repos: &[Repo], leaf_path: &Path) -> anyhow::Result<Vec<usize>> {
    let Some((leaf_idx, _)) = crate::discovery::find_repo(repos, leaf_path) else {
        anyhow::bail!(
            "Path '{}' is not a recognized repository in this grove.",
            leaf_path.display()
        );
    };

    let mut chain = vec![leaf_idx];
    let mut current = leaf_idx;
    while let Some(parent) = repos[current].parent {
        chain.push(parent);
        current = parent;
    }
    Ok(chain)
}

// ---------------------------------------------------------------------------
// Tier execution
// ---------------------------------------------------------------------------

/// Resolve the command for a (tier, repo) pair through the full chain:
///
/// 1. Root config's per-repo override, keyed by tier name (empty = skip)
/// 2. The repo's own `.grove.toml` value for the tier
/// 3. Root config's tier default
/// 4. None (skip)
///
/// An empty string at any level is an explicit skip, folded into `None`.
fn resolve_tier_command(
    root_config: &CascadeConfig,
    repo_root: &Path,
    rel_path: &str,
    tier: Tier,
) -> anyhow::Result<Option<String>> {
    if let Some(repo_overrides) = root_config.overrides.get(rel_path)
        && let Some(cmd) = repo_overrides.get(&tier)
    {
        return Ok((!cmd.is_empty()).then(|| cmd.clone()));
    }

    if rel_path != "." {
        let local = load_config(&repo_root.join(rel_path))?;
        if let Some(cmd) = local.cascade.tier_default(tier) {
            return Ok((!cmd.is_empty()).then(|| cmd.to_string()));
        }
    }

    Ok(root_config
        .tier_default(tier)
        .filter(|c| !c.is_empty())
        .map(String::from))
}

/// Run one tier for a repo. Returns true when it passed or was skipped.
///
/// A missing or empty command is a skip, distinct from a failure. Failure
/// pauses the cascade: status, failed tier, and state are persisted before
/// returning.
fn run_tier(
    repo: &Repo,
    entry_idx: usize,
    tier: Tier,
    config: &CascadeConfig,
    journal: &Journal,
    state: &mut CascadeState,
    state_file: &Path,
) -> anyhow::Result<bool> {
    let rel = state.repos[entry_idx].rel_path.clone();
    let Some(cmd) = resolve_tier_command(config, &repo.root, &rel, tier)? else {
        return Ok(true);
    };

    println!("    Running {tier}...");
    let (passed, duration) = run_test(&repo.path, &cmd)?;
    let secs = duration.as_secs_f64();

    if passed {
        journal.log(format!("PASS {rel} {tier} ({secs:.1}s)"))?;
        println!("    {} {tier} passed ({secs:.1}s)", cformat!("<green>✓</>"));
        return Ok(true);
    }

    journal.log(format!("FAIL {rel} {tier} ({secs:.1}s)"))?;
    println!("    {} {tier} FAILED ({secs:.1}s)", cformat!("<red>✗</>"));
    state.repos[entry_idx].status = CascadeStatus::Paused;
    state.repos[entry_idx].failed_tier = Some(tier);
    save_state(state_file, state)?;
    Ok(false)
}

// ---------------------------------------------------------------------------
// Auto-diagnosis
// ---------------------------------------------------------------------------

/// Run one diagnosis tier of the changed child; returns the entry recorded.
fn diagnose_child_tier(
    child_rel: &str,
    tier: Tier,
    config: &CascadeConfig,
    repo_root: &Path,
    journal: &Journal,
) -> anyhow::Result<Option<DiagnosisEntry>> {
    let child_path = repo_root.join(child_rel);
    if !child_path.exists() {
        return Ok(None);
    }
    let Some(cmd) = resolve_tier_command(config, repo_root, child_rel, tier)? else {
        return Ok(None);
    };

    println!("    Running {tier} of {child_rel}...");
    let (passed, duration) = run_test(&child_path, &cmd)?;
    let secs = duration.as_secs_f64();
    let verdict = if passed { "PASS" } else { "FAIL" };
    journal.log(format!("DIAG {child_rel} {tier} {verdict} ({secs:.1}s)"))?;

    Ok(Some(DiagnosisEntry {
        rel_path: child_rel.to_string(),
        tier,
        passed,
    }))
}

/// Single-phase diagnosis for an integration-tier failure: run the child's
/// local tests. A pass points at the interface; a fail points inside the
/// child.
fn diagnose_integration(
    entry: &mut CascadeEntry,
    child_rel: &str,
    config: &CascadeConfig,
    repo_root: &Path,
    journal: &Journal,
) -> anyhow::Result<()> {
    println!();
    println!("  Auto-diagnosis:");
    let mut results = Vec::new();
    if let Some(diag) = diagnose_child_tier(child_rel, Tier::LocalTests, config, repo_root, journal)?
    {
        if diag.passed {
            println!(
                "    {} {child_rel} — local-tests passed (problem is likely at the interface)",
                cformat!("<green>✓</>")
            );
        } else {
            println!(
                "    {} {child_rel} — local-tests FAILED (problem may be inside this dependency)",
                cformat!("<red>✗</>")
            );
        }
        results.push(diag);
    }
    if !results.is_empty() {
        entry.diagnosis = Some(results);
    }
    Ok(())
}

/// Two-phase diagnosis for a system-tier failure: the child's local tests
/// first, then its integration tests - unless phase 1 already localised
/// the culprit inside the child.
fn diagnose_system(
    entry: &mut CascadeEntry,
    child_rel: &str,
    config: &CascadeConfig,
    repo_root: &Path,
    journal: &Journal,
) -> anyhow::Result<()> {
    let mut results = Vec::new();

    println!();
    println!("  Auto-diagnosis (phase 1 — direct submodules):");
    if let Some(diag) = diagnose_child_tier(child_rel, Tier::LocalTests, config, repo_root, journal)?
    {
        let passed = diag.passed;
        results.push(diag);
        if passed {
            println!("    {} {child_rel} — local-tests passed", cformat!("<green>✓</>"));
        } else {
            println!(
                "    {} {child_rel} — local-tests FAILED (problem may be inside this dependency)",
                cformat!("<red>✗</>")
            );
            entry.diagnosis = Some(results);
            return Ok(());
        }
    }

    println!();
    println!("  Auto-diagnosis (phase 2 — deeper):");
    if let Some(diag) =
        diagnose_child_tier(child_rel, Tier::IntegrationTests, config, repo_root, journal)?
    {
        if diag.passed {
            println!(
                "    {} {child_rel} — integration-tests passed",
                cformat!("<green>✓</>")
            );
        } else {
            println!(
                "    {} {child_rel} — integration-tests FAILED",
                cformat!("<red>✗</>")
            );
            println!("      → Problem may be in a transitive dependency of {child_rel}");
        }
        results.push(diag);
    }

    if !results.is_empty() {
        entry.diagnosis = Some(results);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Per-node protocol
// ---------------------------------------------------------------------------

/// Process one repo in the chain. Returns 0 on success, 1 when paused.
#[allow(clippy::too_many_arguments)]
fn process_repo(
    repo: &Repo,
    entry_idx: usize,
    child: Option<&Repo>,
    config: &CascadeConfig,
    state: &mut CascadeState,
    state_file: &Path,
    journal: &Journal,
    repo_root: &Path,
    dry_run: bool,
) -> anyhow::Result<i32> {
    let rel = state.repos[entry_idx].rel_path.clone();
    let role = state.repos[entry_idx].role;
    println!("  {} ({role})", cformat!("<blue>{rel}</>"));

    // 1. Record the pre-cascade head before anything else mutates.
    state.repos[entry_idx].pre_cascade_head = Some(repo.commit_sha(false)?);
    save_state(state_file, state)?;

    // 2. Stage the just-committed pointer of the child (parent-relative path).
    let child_in_repo = child.map(|c| {
        c.path
            .strip_prefix(&repo.path)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|_| c.rel_path())
    });
    if let Some(ref pointer) = child_in_repo {
        if dry_run {
            println!("    Would stage submodule pointer: {pointer}");
        } else {
            repo.add(pointer)?;
        }
    }

    // 3. Run scheduled tiers, resuming past any already passed.
    let tiers = determine_tiers(role, state.system_mode, state.quick);
    let mut start_from = 0;
    if state.repos[entry_idx].status != CascadeStatus::Pending {
        for (i, tier) in tiers.iter().enumerate() {
            if state.repos[entry_idx].status == tier_status(*tier) {
                start_from = i + 1;
                break;
            }
        }
    }

    for &tier in &tiers[start_from..] {
        if dry_run {
            if let Some(cmd) = resolve_tier_command(config, repo_root, &rel, tier)? {
                println!("    Would run {tier}: {cmd}");
            }
            continue;
        }

        if !run_tier(repo, entry_idx, tier, config, journal, state, state_file)? {
            // Failed with a child pointer staged: diagnose before pausing.
            if let Some(child_rel) = child.map(|c| c.rel_path()) {
                match tier {
                    Tier::IntegrationTests => diagnose_integration(
                        &mut state.repos[entry_idx],
                        &child_rel,
                        config,
                        repo_root,
                        journal,
                    )?,
                    Tier::SystemTests => diagnose_system(
                        &mut state.repos[entry_idx],
                        &child_rel,
                        config,
                        repo_root,
                        journal,
                    )?,
                    _ => {}
                }
            }
            save_state(state_file, state)?;
            println!();
            println!("  Paused. Fix the issue, then run: grove cascade --continue");
            return Ok(1);
        }

        state.repos[entry_idx].status = tier_status(tier);
        save_state(state_file, state)?;
    }

    // 4. Commit the pointer bump iff anything is staged.
    if let (Some(pointer), Some(child)) = (child_in_repo, child) {
        let child_sha = run_git(&child.path, ["rev-parse", "--short", "HEAD"])?;
        let message = format!(
            "chore(cascade): update {pointer} submodule to {}",
            child_sha.out()
        );

        if dry_run {
            println!("    Would commit: {message}");
        } else {
            let staged = !repo.git(["diff", "--cached", "--quiet"])?.success();
            if staged {
                if !repo.commit(&message)? {
                    // A VCS failure here is fatal; state stays for inspection.
                    anyhow::bail!("git commit failed in {rel} — cascade state left in place");
                }
                journal.log(format!("COMMIT {rel}: {message}"))?;
                println!("    {} Committed: {message}", cformat!("<green>✓</>"));
            } else {
                journal.log(format!("SKIP {rel}: no staged changes"))?;
                println!("    {} No changes to commit", cformat!("<yellow>⊘</>"));
            }
        }
    }

    state.repos[entry_idx].status = CascadeStatus::Committed;
    save_state(state_file, state)?;
    println!();
    Ok(0)
}

/// Walk the chain, skipping already-committed nodes (resume).
#[allow(clippy::too_many_arguments)]
fn execute_cascade(
    repos: &[Repo],
    chain: &[usize],
    state: &mut CascadeState,
    state_file: &Path,
    journal: &Journal,
    config: &CascadeConfig,
    repo_root: &Path,
    dry_run: bool,
) -> anyhow::Result<i32> {
    let mut child: Option<&Repo> = None;

    for (entry_idx, &repo_idx) in chain.iter().enumerate() {
        let repo = &repos[repo_idx];
        if state.repos[entry_idx].status == CascadeStatus::Committed {
            child = Some(repo);
            continue;
        }

        let rc = process_repo(
            repo, entry_idx, child, config, state, state_file, journal, repo_root, dry_run,
        )?;
        if rc != 0 {
            return Ok(rc);
        }
        child = Some(repo);
    }

    Ok(0)
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Start a new cascade from the given submodule path.
pub fn run(submodule_path: &str, opts: CascadeOptions) -> anyhow::Result<i32> {
    let repo_root = find_repo_root(None)?;
    let state_file = state_path(&repo_root, CASCADE_STATE_FILE)?;
    let journal = Journal::for_engine(&repo_root, "cascade")?;

    if state_file.exists() {
        println!("{}", cformat!("<red>A cascade is already in progress.</>"));
        println!(
            "Use {} to see current state.",
            cformat!("<blue>grove cascade --status</>")
        );
        println!(
            "Use {} to cancel it.",
            cformat!("<blue>grove cascade --abort</>")
        );
        return Ok(1);
    }

    let config = load_config(&repo_root)?;
    if !config.cascade.any_tier_configured() {
        println!(
            "{}",
            cformat!(
                "<yellow>Warning: No cascade test tiers configured. \
                 Cascade will commit without testing.</>"
            )
        );
        println!("Configure tests in .grove.toml under [cascade].");
        println!();
    }

    let repos = discover_repos(&repo_root, &HashSet::new());

    let target = match crate::git::canonical(&repo_root.join(submodule_path)) {
        Ok(p) => p,
        Err(_) => {
            println!(
                "{}",
                cformat!(
                    "<red>Error: Path '{submodule_path}' is not a recognized repository in this grove.</>"
                )
            );
            return Ok(2);
        }
    };

    let chain = match discover_chain(&repos, &target) {
        Ok(c) => c,
        Err(e) => {
            println!("{}", cformat!("<red>Error: {e}</>"));
            return Ok(2);
        }
    };

    if chain.len() < 2 {
        println!(
            "{}",
            cformat!("<red>Error: Cascade requires at least a leaf and one parent.</>")
        );
        println!("The given path appears to be the root repository itself.");
        return Ok(1);
    }

    // Parents receive pointer commits; refuse to mix in unrelated local
    // changes unless the user opts out. Moved submodule pointers are not
    // dirt here - committing them is the whole point.
    if !opts.skip_checks {
        let mut dirty = Vec::new();
        for &idx in &chain[1..] {
            if !repos[idx].changed_files(true)?.is_empty() {
                dirty.push(repos[idx].rel_path());
            }
        }
        if !dirty.is_empty() {
            for rel in &dirty {
                println!(
                    "  {} {rel}: has uncommitted changes",
                    cformat!("<red>✗</>")
                );
            }
            println!(
                "{}",
                cformat!(
                    "<red>Cannot cascade: commit or stash changes first (or use --skip-checks).</>"
                )
            );
            return Ok(1);
        }
    }

    // Assign roles along the chain.
    let entries: Vec<CascadeEntry> = chain
        .iter()
        .enumerate()
        .map(|(i, &idx)| {
            let role = if i == 0 {
                Role::Leaf
            } else if i == chain.len() - 1 {
                Role::Root
            } else {
                Role::Intermediate
            };
            CascadeEntry::new(repos[idx].rel_path(), role)
        })
        .collect();

    let mut state = CascadeState {
        submodule_path: submodule_path.to_string(),
        started_at: chrono::Utc::now().to_rfc3339(),
        system_mode: opts.system_mode,
        quick: opts.quick,
        repos: entries,
    };
    save_state(&state_file, &state)?;
    journal.log(format!("START cascade from {submodule_path}"))?;

    println!("{}", cformat!("<blue>Cascade: {submodule_path} → root</>"));
    let chain_desc: Vec<String> = state.repos.iter().map(|e| e.rel_path.clone()).collect();
    println!("Chain: {}", chain_desc.join(" → "));
    if opts.dry_run {
        println!(
            "{}",
            cformat!("<yellow>(dry-run mode — no changes will be made)</>")
        );
    }
    println!();

    let result = execute_cascade(
        &repos,
        &chain,
        &mut state,
        &state_file,
        &journal,
        &config.cascade,
        &repo_root,
        opts.dry_run,
    )?;

    if result == 0 {
        remove_state(&state_file)?;
        journal.log("DONE cascade completed successfully")?;
        println!("{}", cformat!("<green>Cascade complete.</>"));
        println!(
            "Run {} to distribute changes.",
            cformat!("<blue>grove push</>")
        );
    }

    Ok(result)
}

/// Resume a paused cascade.
pub fn continue_cascade() -> anyhow::Result<i32> {
    let repo_root = find_repo_root(None)?;
    let state_file = state_path(&repo_root, CASCADE_STATE_FILE)?;
    let journal = Journal::for_engine(&repo_root, "cascade")?;

    if !state_file.exists() {
        println!("{}", cformat!("<red>No cascade in progress.</>"));
        return Ok(1);
    }

    let mut state: CascadeState = load_state(&state_file)?;
    let config = load_config(&repo_root)?;
    journal.log("CONTINUE")?;

    let Some(paused_idx) = state
        .repos
        .iter()
        .position(|e| e.status == CascadeStatus::Paused)
    else {
        println!(
            "{}",
            cformat!("<red>No paused repo found. State may be corrupt.</>")
        );
        return Ok(1);
    };

    println!(
        "{}",
        cformat!(
            "<blue>Resuming cascade from {}</>",
            state.repos[paused_idx].rel_path
        )
    );
    if let Some(tier) = state.repos[paused_idx].failed_tier {
        println!("Previously failed tier: {tier}");
    }
    println!();

    // Roll the paused entry back to the last tier it passed so the failed
    // tier re-runs.
    if let Some(failed) = state.repos[paused_idx].failed_tier {
        let idx = CASCADE_TIERS.iter().position(|&t| t == failed).unwrap_or(0);
        state.repos[paused_idx].status = if idx > 0 {
            tier_status(CASCADE_TIERS[idx - 1])
        } else {
            CascadeStatus::Pending
        };
    }
    state.repos[paused_idx].failed_tier = None;
    state.repos[paused_idx].diagnosis = None;
    save_state(&state_file, &state)?;

    // Rebuild the chain from the live tree.
    let repos = discover_repos(&repo_root, &HashSet::new());
    let target = crate::git::canonical(&repo_root.join(&state.submodule_path))?;
    let chain = discover_chain(&repos, &target)
        .with_context(|| "Error rebuilding cascade chain".to_string())?;

    let result = execute_cascade(
        &repos,
        &chain,
        &mut state,
        &state_file,
        &journal,
        &config.cascade,
        &repo_root,
        false,
    )?;

    if result == 0 {
        remove_state(&state_file)?;
        journal.log("DONE cascade completed successfully")?;
        println!("{}", cformat!("<green>Cascade complete.</>"));
        println!(
            "Run {} to distribute changes.",
            cformat!("<blue>grove push</>")
        );
    }

    Ok(result)
}

/// Abort the in-progress cascade and roll back every pointer commit.
///
/// Walks the chain in reverse; the leaf is never touched (the cascade never
/// committed to it).
pub fn abort() -> anyhow::Result<i32> {
    let repo_root = find_repo_root(None)?;
    let state_file = state_path(&repo_root, CASCADE_STATE_FILE)?;
    let journal = Journal::for_engine(&repo_root, "cascade")?;

    if !state_file.exists() {
        println!("{}", cformat!("<red>No cascade in progress.</>"));
        return Ok(1);
    }

    let state: CascadeState = load_state(&state_file)?;
    journal.log("ABORT")?;
    println!("{}", cformat!("<blue>Aborting cascade...</>"));

    for entry in state.repos.iter().rev() {
        if !matches!(entry.status, CascadeStatus::Committed | CascadeStatus::Paused) {
            continue;
        }
        let Some(ref head) = entry.pre_cascade_head else {
            continue;
        };
        if entry.role == Role::Leaf {
            continue;
        }
        let path = if entry.rel_path == "." {
            repo_root.clone()
        } else {
            repo_root.join(&entry.rel_path)
        };
        if path.exists() {
            let repo = Repo::new(&path, &repo_root);
            repo.reset_hard(head)?;
            println!(
                "  {} {}: restored to {}",
                cformat!("<yellow>↺</>"),
                entry.rel_path,
                &head[..head.len().min(8)]
            );
        }
    }

    remove_state(&state_file)?;
    journal.log("DONE cascade aborted")?;
    println!();
    println!(
        "{}",
        cformat!("<green>Cascade aborted. All pointer commits have been rolled back.</>")
    );
    Ok(0)
}

/// Display the current cascade state.
pub fn status() -> anyhow::Result<i32> {
    let repo_root = find_repo_root(None)?;
    let state_file = state_path(&repo_root, CASCADE_STATE_FILE)?;

    if !state_file.exists() {
        println!("No cascade in progress.");
        return Ok(0);
    }

    let state: CascadeState = load_state(&state_file)?;

    println!("{}", cformat!("<blue>Cascade: {}</>", state.submodule_path));
    println!("Started: {}", state.started_at);
    let mode = match state.system_mode {
        SystemMode::Default => "default",
        SystemMode::All => "all",
        SystemMode::None => "none",
    };
    println!("Mode: system={mode}, quick={}", state.quick);
    println!();

    for entry in &state.repos {
        let icon = match entry.status {
            CascadeStatus::Pending => cformat!("<yellow>○</>"),
            CascadeStatus::LocalPassed => cformat!("<green>◔</>"),
            CascadeStatus::ContractPassed => cformat!("<green>◑</>"),
            CascadeStatus::IntegrationPassed => cformat!("<green>◕</>"),
            CascadeStatus::SystemPassed => cformat!("<green>●</>"),
            CascadeStatus::Committed => cformat!("<green>✓</>"),
            CascadeStatus::Paused => cformat!("<red>⏸</>"),
        };
        println!(
            "  {icon} {} ({}): {}",
            entry.rel_path, entry.role, entry.status
        );

        if entry.status == CascadeStatus::Paused
            && let Some(tier) = entry.failed_tier
        {
            println!("      Failed at: {tier}");
        }
        if let Some(ref diagnosis) = entry.diagnosis {
            for diag in diagnosis {
                let icon = if diag.passed {
                    cformat!("<green>✓</>")
                } else {
                    cformat!("<red>✗</>")
                };
                println!("      {icon} {} {}", diag.rel_path, diag.tier);
            }
        }
    }

    println!();
    if state
        .repos
        .iter()
        .any(|e| e.status == CascadeStatus::Paused)
    {
        println!(
            "Fix the issue, then run: {}",
            cformat!("<blue>grove cascade --continue</>")
        );
        println!("Or abort with: {}", cformat!("<blue>grove cascade --abort</>"));
    }

    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_schedule_matches_role_and_mode() {
        use Tier::*;

        // default
        assert_eq!(
            determine_tiers(Role::Leaf, SystemMode::Default, false),
            vec![LocalTests, ContractTests]
        );
        assert_eq!(
            determine_tiers(Role::Intermediate, SystemMode::Default, false),
            vec![LocalTests, ContractTests, IntegrationTests]
        );
        assert_eq!(
            determine_tiers(Role::Root, SystemMode::Default, false),
            vec![LocalTests, ContractTests, IntegrationTests, SystemTests]
        );

        // --system: everyone runs the full ladder
        for role in [Role::Leaf, Role::Intermediate, Role::Root] {
            assert_eq!(
                determine_tiers(role, SystemMode::All, false),
                vec![LocalTests, ContractTests, IntegrationTests, SystemTests]
            );
        }

        // --no-system: system-tests nowhere
        assert_eq!(
            determine_tiers(Role::Root, SystemMode::None, false),
            vec![LocalTests, ContractTests, IntegrationTests]
        );

        // --quick: first two tiers only, regardless of role
        for role in [Role::Leaf, Role::Intermediate, Role::Root] {
            assert_eq!(
                determine_tiers(role, SystemMode::Default, true),
                vec![LocalTests, ContractTests]
            );
        }
    }

    #[test]
    fn tier_resolution_consults_repo_own_config() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        std::fs::create_dir_all(root.join("td")).unwrap();
        std::fs::write(
            root.join("td").join(".grove.toml"),
            "[cascade]\nlocal-tests = \"make local\"\n",
        )
        .unwrap();

        let mut root_config = CascadeConfig {
            contract_tests: Some("make contract".into()),
            ..Default::default()
        };

        // The repo's own config wins over the root default.
        assert_eq!(
            resolve_tier_command(&root_config, root, "td", Tier::LocalTests)
                .unwrap()
                .as_deref(),
            Some("make local")
        );
        // Tiers the repo does not configure fall back to the root default.
        assert_eq!(
            resolve_tier_command(&root_config, root, "td", Tier::ContractTests)
                .unwrap()
                .as_deref(),
            Some("make contract")
        );
        // Unconfigured everywhere is a skip.
        assert_eq!(
            resolve_tier_command(&root_config, root, "td", Tier::SystemTests).unwrap(),
            None
        );

        // An empty root override is an explicit skip beating both.
        let mut overrides = indexmap::IndexMap::new();
        overrides.insert(Tier::LocalTests, String::new());
        root_config.overrides.insert("td".into(), overrides);
        assert_eq!(
            resolve_tier_command(&root_config, root, "td", Tier::LocalTests).unwrap(),
            None
        );
    }

    #[test]
    fn statuses_serialize_kebab_case() {
        let entry = CascadeEntry::new("td".into(), Role::Intermediate);
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"status\":\"pending\""));
        assert!(json.contains("\"role\":\"intermediate\""));

        let mut entry = entry;
        entry.status = CascadeStatus::IntegrationPassed;
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"integration-passed\""));
    }

    #[test]
    fn tier_status_ladder_is_ordered() {
        assert_eq!(tier_status(Tier::LocalTests), CascadeStatus::LocalPassed);
        assert_eq!(tier_status(Tier::SystemTests), CascadeStatus::SystemPassed);
    }
}
