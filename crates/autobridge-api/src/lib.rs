//! # AutoBridge API
//!
//! The protocol side of a bridge instance.
//!
//! ```text
//!  clients ──ws──▶ BridgeServer ──▶ Session ──┬─▶ immediate handlers ──▶ ChatSurface
//!                       │                     ├─▶ CommandSandbox
//!                       │                     └─▶ TaskQueue ──▶ Worker ──▶ ChatSurface
//!                       └──▶ InstanceRegistry (register, heartbeat, release)
//! ```
//!
//! Every reply carries the instance's port so that clients talking to
//! several instances can tell the replies apart.

pub mod error;
pub mod server;
pub mod state;
pub mod websocket;

pub use error::BridgeError;
pub use server::BridgeServer;
pub use state::{BridgeState, descriptor_or_default};
pub use websocket::{
    BridgeRequest, ConnectionManager, IncomingMessage, ModelChoice, Outbound, ReplyStatus,
    Session, WsReply, ws_handler,
};

#[cfg(test)]
pub(crate) mod test_support;
