//! WebSocket connection management.

use dashmap::DashMap;
use tokio::sync::mpsc;

use super::message::{Outbound, WsReply};

/// Outbound queues of the open connections, keyed by connection id.
///
/// Replies are stamped with the instance port on the way through.
pub struct ConnectionManager {
    port: u16,
    connections: DashMap<String, mpsc::UnboundedSender<Outbound>>,
}

impl ConnectionManager {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            connections: DashMap::new(),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn add(&self, id: String, sender: mpsc::UnboundedSender<Outbound>) {
        self.connections.insert(id, sender);
    }

    pub fn remove(&self, id: &str) {
        self.connections.remove(id);
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Queue a reply for one connection. Returns `false` if it is gone.
    pub fn send_to(&self, id: &str, reply: WsReply) -> bool {
        self.send_frame(id, Outbound::Reply(reply))
    }

    pub fn send_frame(&self, id: &str, frame: Outbound) -> bool {
        let frame = match frame {
            Outbound::Reply(reply) => Outbound::Reply(reply.on_port(self.port)),
            Outbound::Pong => Outbound::Pong,
        };
        match self.connections.get(id) {
            Some(sender) => sender.send(frame).is_ok(),
            None => false,
        }
    }
}
