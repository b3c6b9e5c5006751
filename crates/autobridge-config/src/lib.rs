//! # AutoBridge Config
//!
//! Configuration management for the AutoBridge automation bridge.
//!
//! Two documents are handled here:
//! - [`BridgeConfig`]: bridge settings (TOML), shared by every instance on a host.
//! - [`AgentDescriptor`]: the per-target instance descriptor (JSON) pushed to
//!   every client on connect.

mod descriptor;
mod error;
mod loader;
mod schema;
mod validator;

pub use descriptor::{AgentDescriptor, DESCRIPTOR_DIR, DESCRIPTOR_FILE};
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
pub use validator::{ConfigValidator, ValidationError, ValidationResult, ValidationWarning};
