//! Command sandbox for AutoBridge.
//!
//! Runs a short list of pre-approved utilities in the target directory,
//! without a shell, rejecting anything that looks like chaining,
//! redirection or substitution.

mod error;
mod sandbox;

pub use error::SandboxError;
pub use sandbox::CommandSandbox;
