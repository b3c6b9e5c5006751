//! Sandbox errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("command is empty")]
    Empty,

    /// Leading program is not on the allowlist.
    #[error("command not allowed: {0}")]
    NotAllowed(String),

    /// Allowlisted program given a subcommand or option outside its rules.
    #[error("argument not allowed for {program}: {argument:?}")]
    ArgumentNotAllowed { program: String, argument: String },

    /// Shell metacharacters, chaining or substitution.
    #[error("command contains unsafe characters")]
    Unsafe,

    #[error("command timed out after {0} ms")]
    Timeout(u64),

    #[error("failed to start command: {0}")]
    Spawn(#[from] std::io::Error),

    /// Non-zero exit.
    #[error("Command failed with exit code {code}: {message}")]
    Failed { code: i32, message: String },
}
