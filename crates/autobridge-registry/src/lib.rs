//! # AutoBridge Registry
//!
//! A host-wide table of running bridge instances, so several bridges can
//! coexist without port collisions and external tools can find them.
//!
//! The table is a single JSON file shared by every instance on the host.
//! Every read-modify-write happens under an exclusive file lock and lands
//! through an atomic rename.

mod error;
mod process;
mod record;
mod registry;

pub use error::RegistryError;
pub use process::is_process_running;
pub use record::InstanceRecord;
pub use registry::{InstanceRegistry, RegistryTable};
