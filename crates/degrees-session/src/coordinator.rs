//! Session coordinator: starts sessions and applies moves.
//!
//! Upstream calls never happen under a lock. Starting a game validates
//! under the lobby lock, releases it for the playlist and anchor fetches,
//! then re-locks and validates again before committing. A move resolves
//! its node first (from the session, or the metadata cache) and only then
//! takes the lobby lock followed by the session lock to apply and
//! broadcast.

use std::sync::Arc;

use degrees_lobby::{Departure, GamePhase, Lobby, LobbyError, LobbyHandle, LobbyRegistry};
use degrees_metadata::{Catalog, MetadataCache};
use degrees_protocol::{ArtistNode, LobbyCode, NodeId, PlayerId, Recipient, ServerMessage};
use tracing::{debug, info};

use crate::{GameSession, SessionError, SessionStore};

/// Runs the session state machine for every lobby.
pub struct SessionCoordinator<C> {
    lobbies: Arc<LobbyRegistry>,
    sessions: SessionStore,
    metadata: MetadataCache<C>,
    playlist_id: String,
}

impl<C: Catalog> SessionCoordinator<C> {
    /// `playlist_id` is where start/target candidates are drawn from.
    pub fn new(lobbies: Arc<LobbyRegistry>, metadata: MetadataCache<C>, playlist_id: impl Into<String>) -> Self {
        Self {
            lobbies,
            sessions: SessionStore::new(),
            metadata,
            playlist_id: playlist_id.into(),
        }
    }

    pub fn lobbies(&self) -> &Arc<LobbyRegistry> {
        &self.lobbies
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn metadata(&self) -> &MetadataCache<C> {
        &self.metadata
    }

    /// Host only: draws start and target, creates the session, moves the
    /// lobby to `Started` and broadcasts `game_started`.
    ///
    /// Allowed from `Waiting` and, for a rematch, from `Won`; the new
    /// session replaces the finished one. On any error the lobby keeps its
    /// phase and nothing is broadcast.
    pub async fn start_game(&self, code: &LobbyCode, host: PlayerId) -> Result<(), SessionError> {
        let handle = self.lobby(code).await?;
        check_startable(&*handle.lock().await, host)?;

        let candidates = self.metadata.candidate_ids(&self.playlist_id).await?;
        if candidates.len() < 2 {
            return Err(SessionError::InsufficientNodes(candidates.len()));
        }
        let (start_id, target_id) = pick_anchors(&candidates);
        debug!(lobby = %code, start = %start_id, target = %target_id, "anchors drawn");

        let (start, target) = tokio::try_join!(
            self.metadata.artist(&start_id),
            self.metadata.artist(&target_id),
        )?;

        let mut lobby = handle.lock().await;
        if lobby.is_closed() {
            return Err(LobbyError::NotFound.into());
        }
        check_startable(&lobby, host)?;

        let session = GameSession::new(
            Arc::clone(&start),
            Arc::clone(&target),
            Arc::clone(&candidates),
            lobby.participants().iter().map(|p| p.id),
        );
        self.sessions.insert(code.clone(), session).await;
        lobby.set_phase(GamePhase::Started);
        info!(
            lobby = %code,
            start = %start.name,
            target = %target.name,
            players = lobby.len(),
            "game started"
        );

        let started = ServerMessage::GameStarted {
            current_artist: start,
            target_artist: target,
            all_artist_ids: candidates.to_vec(),
            game_settings: lobby.settings().clone(),
        };
        self.lobbies.fanout().broadcast(&lobby, started).await;
        Ok(())
    }

    /// Moves `player_id` to `target` and broadcasts `player_moved`, plus
    /// `player_won` when the target is reached.
    ///
    /// Without an active session this does nothing. If the node cannot be
    /// fetched the path is left unchanged and nothing is broadcast.
    pub async fn player_move(&self, code: &LobbyCode, player_id: PlayerId, target: &NodeId) -> Result<(), SessionError> {
        let Some(session) = self.sessions.get(code).await else {
            debug!(lobby = %code, %player_id, "move without an active session ignored");
            return Ok(());
        };
        if target.is_empty() {
            return Err(SessionError::ArtistIdRequired);
        }
        let handle = self.lobby(code).await?;
        if !handle.lock().await.contains(player_id) {
            return Err(LobbyError::NotInLobby.into());
        }

        let cached = session.lock().await.node(target);
        let node = match cached {
            Some(node) => node,
            None => self.metadata.artist(target).await?,
        };

        let mut lobby = handle.lock().await;
        if !lobby.contains(player_id) {
            return Err(LobbyError::NotInLobby.into());
        }
        let mut game = session.lock().await;
        let outcome = game.apply_move(player_id, Arc::clone(&node));
        debug!(lobby = %code, %player_id, artist = %node.id, steps = outcome.steps, "move applied");

        let mut effects = vec![(
            Recipient::All,
            ServerMessage::PlayerMoved {
                player_id,
                artist_id: node.id.clone(),
                artist_data: node,
                path: outcome.path.clone(),
                steps: outcome.steps,
                has_won: outcome.has_won,
            },
        )];
        if outcome.has_won {
            info!(lobby = %code, %player_id, steps = outcome.steps, "target reached");
            if outcome.first_win && lobby.phase().can_transition_to(GamePhase::Won) {
                lobby.set_phase(GamePhase::Won);
            }
            effects.push((
                Recipient::All,
                ServerMessage::PlayerWon {
                    player_id,
                    steps: outcome.steps,
                    path: outcome.path,
                },
            ));
        }
        self.lobbies.fanout().dispatch(&lobby, effects).await;
        Ok(())
    }

    /// Looks up a node through the cache, independent of any lobby.
    pub async fn artist_data(&self, id: &NodeId) -> Result<Arc<ArtistNode>, SessionError> {
        if id.is_empty() {
            return Err(SessionError::ArtistIdRequired);
        }
        Ok(self.metadata.artist(id).await?)
    }

    /// Removes a participant; a lobby that empties takes its session
    /// with it.
    pub async fn leave(&self, code: &LobbyCode, player_id: PlayerId) -> Result<Departure, SessionError> {
        let departure = self.lobbies.remove_participant(code, player_id).await?;
        if departure.lobby_closed && self.sessions.remove(code).await.is_some() {
            info!(lobby = %code, "session destroyed");
        }
        Ok(departure)
    }

    async fn lobby(&self, code: &LobbyCode) -> Result<LobbyHandle, SessionError> {
        self.lobbies
            .get(code)
            .await
            .ok_or(SessionError::Lobby(LobbyError::NotFound))
    }
}

fn check_startable(lobby: &Lobby, host: PlayerId) -> Result<(), SessionError> {
    if lobby.is_empty() {
        return Err(SessionError::NoPlayers);
    }
    if !lobby.is_host(host) {
        return Err(SessionError::NotHost);
    }
    if !lobby.phase().can_transition_to(GamePhase::Started) {
        return Err(SessionError::AlreadyStarted);
    }
    if !lobby.all_ready() {
        return Err(SessionError::NotReady);
    }
    Ok(())
}

/// Two distinct candidates, uniformly at random: `(start, target)`.
fn pick_anchors(candidates: &[NodeId]) -> (NodeId, NodeId) {
    let mut rng = rand::rng();
    let picked = rand::seq::index::sample(&mut rng, candidates.len(), 2);
    (
        candidates[picked.index(0)].clone(),
        candidates[picked.index(1)].clone(),
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_pick_anchors_distinct_and_roughly_uniform() {
        let candidates: Vec<NodeId> = ["a", "b", "c", "d"].into_iter().map(NodeId::from).collect();
        let mut starts: HashMap<NodeId, usize> = HashMap::new();

        for _ in 0..4000 {
            let (start, target) = pick_anchors(&candidates);
            assert_ne!(start, target);
            *starts.entry(start).or_default() += 1;
        }

        assert_eq!(starts.len(), 4);
        for (id, count) in starts {
            assert!((700..1300).contains(&count), "{id} drawn {count} times");
        }
    }

    #[test]
    fn test_pick_anchors_two_candidates_uses_both() {
        let candidates: Vec<NodeId> = vec!["a".into(), "b".into()];
        let (start, target) = pick_anchors(&candidates);
        let mut both = [start.as_str(), target.as_str()];
        both.sort_unstable();
        assert_eq!(both, ["a", "b"]);
    }
}
