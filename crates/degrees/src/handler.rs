//! Per-connection handler: decoding, dispatch, and cleanup.
//!
//! Each accepted connection gets its own Tokio task running this handler,
//! plus a writer task that owns the outbound side:
//!   1. Spawn the writer, which drains this connection's channel and sends
//!      every message as one frame
//!   2. Loop: receive a frame → decode → dispatch on (membership, kind)
//!   3. On close, leave the current lobby
//!
//! Rejections go back to this connection only, through the same channel
//! that lobby broadcasts use, so a reply never overtakes a broadcast that
//! was queued before it.

use std::sync::Arc;

use degrees_lobby::{LobbyError, PlayerSender};
use degrees_metadata::Catalog;
use degrees_protocol::{ClientMessage, Codec, LobbyCode, NodeId, PlayerId, ServerMessage};
use degrees_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::server::ServerState;
use crate::{DegreesError, ErrorCategory};

/// Which lobby, if any, this connection currently plays in.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Membership {
    Idle,
    Joined { code: LobbyCode, player_id: PlayerId },
}

/// Drop guard that leaves the current lobby when the handler exits.
///
/// This ensures cleanup happens even if the handler panics. Since `Drop`
/// is synchronous, we spawn a fire-and-forget task for the async work.
struct MembershipGuard<P: Catalog, C: Codec> {
    membership: Membership,
    state: Arc<ServerState<P, C>>,
}

impl<P: Catalog, C: Codec> Drop for MembershipGuard<P, C> {
    fn drop(&mut self) {
        let membership = std::mem::replace(&mut self.membership, Membership::Idle);
        if membership == Membership::Idle {
            return;
        }
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            depart(&state, membership).await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<P, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<P, C>>,
) -> Result<(), DegreesError>
where
    P: Catalog,
    C: Codec,
{
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    info!(%conn_id, "connection opened");

    let (tx, rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_loop(Arc::clone(&conn), Arc::clone(&state), rx));

    let mut guard = MembershipGuard {
        membership: Membership::Idle,
        state: Arc::clone(&state),
    };

    let result = loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                info!(%conn_id, "connection closed");
                break Ok(());
            }
            Err(e) => break Err(DegreesError::Transport(e)),
        };

        let msg: ClientMessage = match state.codec.decode(&data) {
            Ok(msg) => msg,
            Err(e) => {
                debug!(%conn_id, error = %e, "failed to decode message");
                reply(&tx, ServerMessage::error(e.to_string()));
                continue;
            }
        };

        let failure = Failure::of(&msg);
        if let Err(e) = dispatch(&state, &mut guard.membership, &tx, msg).await {
            debug!(%conn_id, error = %e, category = ?e.category(), "request rejected");
            reply(&tx, failure.reply(&e));
        }
    };

    // The guard's departure unregisters this connection's sender; once the
    // local one drops too, the writer drains what is queued and exits.
    drop(guard);
    drop(tx);
    if writer.await.is_err() {
        debug!(%conn_id, "writer task ended abnormally");
    }
    result
}

/// Drains `outbound` onto the socket, one frame per message.
async fn write_loop<P, C>(
    conn: Arc<WebSocketConnection>,
    state: Arc<ServerState<P, C>>,
    mut outbound: mpsc::UnboundedReceiver<ServerMessage>,
) where
    P: Catalog,
    C: Codec,
{
    let conn_id = conn.id();
    while let Some(msg) = outbound.recv().await {
        let bytes = match state.codec.encode(&msg) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(%conn_id, kind = msg.kind(), error = %e, "failed to encode message");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            debug!(%conn_id, error = %e, "send failed, writer stopping");
            break;
        }
    }
}

/// Routes one message according to where the connection stands.
async fn dispatch<P, C>(
    state: &ServerState<P, C>,
    membership: &mut Membership,
    tx: &PlayerSender,
    msg: ClientMessage,
) -> Result<(), DegreesError>
where
    P: Catalog,
    C: Codec,
{
    match (membership.clone(), msg) {
        (_, ClientMessage::CreateLobby { player_name }) => {
            leave_current(state, membership).await;
            let player_id = PlayerId::next();
            state.fanout().register(player_id, tx.clone()).await;
            match state.lobbies().create_lobby(player_id, &player_name).await {
                Ok(code) => {
                    *membership = Membership::Joined { code, player_id };
                    Ok(())
                }
                Err(e) => {
                    state.fanout().unregister(player_id).await;
                    Err(e.into())
                }
            }
        }

        (_, ClientMessage::JoinLobby { player_name, lobby_code }) => {
            // A join that cannot succeed keeps the player where they are.
            state.lobbies().check_joinable(&lobby_code, &player_name).await?;
            leave_current(state, membership).await;
            let player_id = PlayerId::next();
            state.fanout().register(player_id, tx.clone()).await;
            match state.lobbies().join_lobby(&lobby_code, player_id, &player_name).await {
                Ok(code) => {
                    *membership = Membership::Joined { code, player_id };
                    Ok(())
                }
                Err(e) => {
                    state.fanout().unregister(player_id).await;
                    Err(e.into())
                }
            }
        }

        (_, ClientMessage::GetArtistData { artist_id }) => {
            let data = state.coordinator.artist_data(&artist_id).await?;
            reply(tx, ServerMessage::ArtistData { artist_id, data });
            Ok(())
        }

        (Membership::Idle, ClientMessage::LeaveLobby {}) => Ok(()),

        (
            Membership::Idle,
            msg @ (ClientMessage::PlayerMove { .. } | ClientMessage::PlayerReady { .. } | ClientMessage::StartGame {}),
        ) => {
            debug!(message = ?msg, "ignored outside a lobby");
            Ok(())
        }

        (Membership::Idle, ClientMessage::UpdateSettings { .. }) => {
            Err(LobbyError::NotHost("update settings").into())
        }

        (Membership::Joined { .. }, ClientMessage::LeaveLobby {}) => {
            leave_current(state, membership).await;
            Ok(())
        }

        (Membership::Joined { code, player_id }, ClientMessage::PlayerReady { ready }) => {
            Ok(state.lobbies().set_ready(&code, player_id, ready).await?)
        }

        (Membership::Joined { code, player_id }, ClientMessage::UpdateSettings { settings }) => {
            Ok(state.lobbies().update_settings(&code, player_id, settings).await?)
        }

        (Membership::Joined { code, player_id }, ClientMessage::StartGame {}) => {
            Ok(state.coordinator.start_game(&code, player_id).await?)
        }

        (Membership::Joined { code, player_id }, ClientMessage::PlayerMove { artist_id }) => {
            Ok(state.coordinator.player_move(&code, player_id, &artist_id).await?)
        }
    }
}

async fn leave_current<P: Catalog, C>(state: &ServerState<P, C>, membership: &mut Membership) {
    let previous = std::mem::replace(membership, Membership::Idle);
    depart(state, previous).await;
}

/// Removes the participant from its lobby and stops routing broadcasts to
/// this connection under that id.
async fn depart<P: Catalog, C>(state: &ServerState<P, C>, membership: Membership) {
    let Membership::Joined { code, player_id } = membership else {
        return;
    };
    if let Err(e) = state.coordinator.leave(&code, player_id).await {
        debug!(lobby = %code, %player_id, error = %e, "leave failed");
    }
    state.fanout().unregister(player_id).await;
}

fn reply(tx: &PlayerSender, msg: ServerMessage) {
    // The writer only stops once the socket is gone.
    let _ = tx.send(msg);
}

/// How a rejected request is worded, captured before the message is
/// consumed.
struct Failure {
    upstream: &'static str,
    artist_id: Option<NodeId>,
}

impl Failure {
    fn of(msg: &ClientMessage) -> Self {
        match msg {
            ClientMessage::StartGame {} => Self {
                upstream: "Failed to start game",
                artist_id: None,
            },
            ClientMessage::PlayerMove { .. } => Self {
                upstream: "Failed to process move",
                artist_id: None,
            },
            ClientMessage::GetArtistData { artist_id } => Self {
                upstream: "Failed to fetch artist data",
                artist_id: Some(artist_id.clone()),
            },
            _ => Self {
                upstream: "Upstream request failed",
                artist_id: None,
            },
        }
    }

    /// Upstream failures get operation-specific text; everything else is
    /// reported with the error's own message.
    fn reply(self, error: &DegreesError) -> ServerMessage {
        let message = match error.category() {
            ErrorCategory::Upstream => self.upstream.to_owned(),
            _ => error.to_string(),
        };
        ServerMessage::Error {
            message,
            artist_id: self.artist_id,
        }
    }
}
