//! WebSocket protocol sessions.
//!
//! Every connection gets its own outbound queue in the
//! [`ConnectionManager`]; results of queued prompts find their way back to
//! the submitting connection through it.

mod connection;
mod handler;
mod message;

pub use connection::ConnectionManager;
pub use handler::{Session, ws_handler};
pub use message::{BridgeRequest, IncomingMessage, ModelChoice, Outbound, ReplyStatus, WsReply};
