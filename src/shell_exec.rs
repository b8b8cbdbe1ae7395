//! Cross-platform shell execution for configured test commands.
//!
//! Test commands from `.grove.toml` are interpreted by the platform shell:
//! - Unix: `/bin/sh -c`
//! - Windows: PowerShell (`-NoProfile -Command`)
//!
//! Commands run in the target repository's working directory with captured
//! output; callers only observe the exit status and wall-clock duration.

use std::path::Path;
use std::process::Command;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::Context;

/// Cached shell configuration for the current platform.
static SHELL_CONFIG: OnceLock<ShellConfig> = OnceLock::new();

/// Shell configuration for command execution.
#[derive(Debug, Clone)]
pub struct ShellConfig {
    /// Shell executable name or path.
    pub executable: String,
    /// Arguments passed before the command string (e.g. `["-c"]` for sh).
    pub args: Vec<String>,
}

impl ShellConfig {
    /// Get the shell configuration for the current platform.
    pub fn get() -> &'static ShellConfig {
        SHELL_CONFIG.get_or_init(detect_shell)
    }

    /// Create a [`Command`] that runs `shell_command` through this shell.
    pub fn command(&self, shell_command: &str) -> Command {
        let mut cmd = Command::new(&self.executable);
        for arg in &self.args {
            cmd.arg(arg);
        }
        cmd.arg(shell_command);
        cmd
    }
}

fn detect_shell() -> ShellConfig {
    #[cfg(unix)]
    {
        ShellConfig {
            executable: "sh".to_string(),
            args: vec!["-c".to_string()],
        }
    }

    #[cfg(windows)]
    {
        ShellConfig {
            executable: "powershell.exe".to_string(),
            args: vec!["-NoProfile".to_string(), "-Command".to_string()],
        }
    }
}

/// Run a test command in `dir`. Returns `(passed, duration)`.
///
/// Output is captured, not streamed; a failing command is a normal result,
/// not an error. Only a spawn failure (shell missing, directory gone)
/// surfaces as `Err`.
pub fn run_test(dir: &Path, test_cmd: &str) -> anyhow::Result<(bool, Duration)> {
    log::debug!("$ {} [{}]", test_cmd, dir.display());
    let start = Instant::now();
    let output = ShellConfig::get()
        .command(test_cmd)
        .current_dir(dir)
        .output()
        .with_context(|| format!("Failed to execute test command: {test_cmd}"))?;
    let duration = start.elapsed();
    Ok((output.status.success(), duration))
}
