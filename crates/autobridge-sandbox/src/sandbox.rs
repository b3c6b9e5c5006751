//! Allowlisted command execution.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use autobridge_config::SandboxConfig;
use regex::Regex;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::SandboxError;

/// Chaining, redirection, substitution and grouping.
static UNSAFE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"[;&|<>`()\n\r]|\$\(|\$\{").ok());

/// Git subcommands that only read repository state.
const GIT_SUBCOMMANDS: &[&str] = &["status", "log", "diff", "show", "branch", "rev-parse", "ls-files"];

/// Git options that load configuration, relocate the repository, run
/// helpers or write files.
const GIT_FORBIDDEN_OPTIONS: &[&str] = &[
    "-c",
    "-C",
    "--config-env",
    "--exec-path",
    "--git-dir",
    "--work-tree",
    "--namespace",
    "--output",
    "--ext-diff",
    "--textconv",
    "--upload-pack",
    "--receive-pack",
    "--open-files-in-pager",
];

/// Runs allowlisted programs in a fixed working directory.
#[derive(Debug, Clone)]
pub struct CommandSandbox {
    allowed: BTreeSet<String>,
    timeout: Duration,
    work_dir: PathBuf,
}

impl CommandSandbox {
    pub fn new(config: &SandboxConfig, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            allowed: config.allowed_commands.iter().cloned().collect(),
            timeout: Duration::from_millis(config.timeout_ms),
            work_dir: work_dir.into(),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn is_allowed(&self, program: &str) -> bool {
        self.allowed.contains(program)
    }

    /// Check a command line and split it into program and arguments.
    ///
    /// The program must be allowlisted, and the raw line must be free of
    /// unsafe characters even when it is.
    pub fn validate(&self, command: &str) -> Result<Vec<String>, SandboxError> {
        let tokens: Vec<String> = command.split_whitespace().map(str::to_string).collect();
        let Some(program) = tokens.first() else {
            return Err(SandboxError::Empty);
        };

        if !self.is_allowed(program) {
            return Err(SandboxError::NotAllowed(program.clone()));
        }

        // Fail closed if the pattern could not be built.
        let unsafe_chars = UNSAFE.as_ref().is_none_or(|re| re.is_match(command));
        if unsafe_chars {
            return Err(SandboxError::Unsafe);
        }

        check_arguments(program, &tokens[1..])?;
        Ok(tokens)
    }

    /// Run a command and return its stdout.
    ///
    /// Non-zero exit is always an error carrying stderr, or stdout when
    /// stderr is empty.
    pub async fn run(&self, command: &str) -> Result<String, SandboxError> {
        let tokens = match self.validate(command) {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!("Rejected command {:?}: {}", command, e);
                return Err(e);
            }
        };

        info!("Running command: {}", command);
        let mut cmd = Command::new(&tokens[0]);
        cmd.args(&tokens[1..])
            .current_dir(&self.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| SandboxError::Timeout(self.timeout.as_millis() as u64))??;

        let stdout = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();

        if output.status.success() {
            debug!("Command produced {} bytes", stdout.len());
            Ok(stdout)
        } else {
            let code = output.status.code().unwrap_or(-1);
            let message = if stderr.is_empty() { stdout } else { stderr };
            Err(SandboxError::Failed { code, message })
        }
    }
}

/// Per-program argument rules for allowlisted programs that can otherwise
/// run arbitrary code.
fn check_arguments(program: &str, args: &[String]) -> Result<(), SandboxError> {
    match program {
        "git" => check_git_arguments(args),
        _ => Ok(()),
    }
}

fn check_git_arguments(args: &[String]) -> Result<(), SandboxError> {
    let rejected = |argument: &str| SandboxError::ArgumentNotAllowed {
        program: "git".to_string(),
        argument: argument.to_string(),
    };

    // The subcommand comes first: no global options, so no `-c alias.x=!cmd`.
    let Some(subcommand) = args.first() else {
        return Err(rejected(""));
    };
    if !GIT_SUBCOMMANDS.contains(&subcommand.as_str()) {
        return Err(rejected(subcommand));
    }

    for arg in args {
        let forbidden = GIT_FORBIDDEN_OPTIONS.iter().any(|option| {
            let option = *option;
            arg == option
                || arg.starts_with(&format!("{}=", option))
                // Short options accept an attached value: `-calias.x=...`, `-C/tmp`.
                || (option.len() == 2 && arg.starts_with(option))
        });
        if forbidden {
            return Err(rejected(arg));
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "sandbox_tests.rs"]
mod tests;
