//! Broadcast fan-out.
//!
//! Each connection registers an unbounded sender feeding its writer task.
//! Delivery looks the sender up by id every time, so a participant whose
//! connection already went away is simply skipped.

use std::collections::HashMap;

use degrees_protocol::{PlayerId, Recipient, ServerMessage};
use tokio::sync::{RwLock, mpsc};

use crate::Lobby;

/// Channel sender for delivering outbound messages to one connection.
pub type PlayerSender = mpsc::UnboundedSender<ServerMessage>;

/// `PlayerId → PlayerSender` registry.
#[derive(Default)]
pub struct Fanout {
    connections: RwLock<HashMap<PlayerId, PlayerSender>>,
}

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the sender for a participant.
    pub async fn register(&self, player_id: PlayerId, sender: PlayerSender) {
        self.connections.write().await.insert(player_id, sender);
    }

    pub async fn unregister(&self, player_id: PlayerId) {
        self.connections.write().await.remove(&player_id);
    }

    /// Sends to one participant, regardless of lobby. Returns `false` if
    /// no open connection is registered.
    pub async fn send_to(&self, player_id: PlayerId, msg: ServerMessage) -> bool {
        match self.connections.read().await.get(&player_id) {
            Some(sender) => sender.send(msg).is_ok(),
            None => false,
        }
    }

    /// Delivers each `(Recipient, ServerMessage)` pair to the lobby's
    /// current participants. Missing or closed connections are skipped.
    pub async fn dispatch(&self, lobby: &Lobby, effects: Vec<(Recipient, ServerMessage)>) {
        let connections = self.connections.read().await;
        let deliver = |id: PlayerId, msg: ServerMessage| {
            if let Some(sender) = connections.get(&id) {
                let _ = sender.send(msg);
            }
        };

        for (recipient, msg) in effects {
            tracing::debug!(lobby = %lobby.code(), kind = msg.kind(), "dispatch");
            match recipient {
                Recipient::All => {
                    for p in lobby.participants() {
                        deliver(p.id, msg.clone());
                    }
                }
                Recipient::Player(id) => {
                    if lobby.contains(id) {
                        deliver(id, msg);
                    }
                }
                Recipient::AllExcept(excluded) => {
                    for p in lobby.participants().iter().filter(|p| p.id != excluded) {
                        deliver(p.id, msg.clone());
                    }
                }
            }
        }
    }

    /// Shorthand for dispatching one message to everyone in the lobby.
    pub async fn broadcast(&self, lobby: &Lobby, msg: ServerMessage) {
        self.dispatch(lobby, vec![(Recipient::All, msg)]).await;
    }
}
