//! Surface error types.

use thiserror::Error;

/// Errors raised while touching the target surface.
#[derive(Debug, Error)]
pub enum SurfaceError {
    /// The node does not expose the requested member.
    #[error("{type_name} has no member {member}")]
    MemberNotFound { type_name: String, member: String },

    /// The member exists but raised when accessed.
    #[error("Access to {member} failed: {reason}")]
    AccessFailed { member: String, reason: String },

    /// The node's child collection could not be enumerated.
    #[error("Children of {0} are not accessible")]
    ChildrenUnavailable(String),

    /// The target surface (or its chat panel) is not present.
    #[error("Target surface unavailable: {0}")]
    Unavailable(String),

    /// A job on the confinement context panicked.
    #[error("Surface call panicked: {0}")]
    Panicked(String),

    /// The confinement context is no longer accepting jobs.
    #[error("UI execution context is closed")]
    ContextClosed,
}

impl SurfaceError {
    /// Build an access failure for a member.
    pub fn access(member: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AccessFailed {
            member: member.into(),
            reason: reason.into(),
        }
    }
}
