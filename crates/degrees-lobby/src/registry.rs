//! Lobby registry: creates lobbies, finds them by code, and applies
//! membership changes.
//!
//! Every operation that changes a lobby broadcasts the resulting messages
//! while it still holds that lobby's lock, so all participants observe
//! changes to one lobby in the order they were made.

use std::collections::HashMap;
use std::sync::Arc;

use degrees_protocol::{LobbyCode, PlayerId, Recipient, ServerMessage};
use serde_json::{Map, Value};
use tokio::sync::{Mutex, RwLock};

use crate::{Fanout, Lobby, LobbyConfig, LobbyError};

/// Shared handle to one lobby.
pub type LobbyHandle = Arc<Mutex<Lobby>>;

/// Result of removing a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Departure {
    /// The lobby became empty and was removed from the registry.
    pub lobby_closed: bool,
}

/// All open lobbies, keyed by code.
pub struct LobbyRegistry {
    lobbies: RwLock<HashMap<LobbyCode, LobbyHandle>>,
    config: LobbyConfig,
    fanout: Arc<Fanout>,
}

impl LobbyRegistry {
    pub fn new(config: LobbyConfig, fanout: Arc<Fanout>) -> Self {
        Self {
            lobbies: RwLock::new(HashMap::new()),
            config,
            fanout,
        }
    }

    pub fn config(&self) -> &LobbyConfig {
        &self.config
    }

    pub fn fanout(&self) -> &Arc<Fanout> {
        &self.fanout
    }

    /// Looks up an open lobby.
    pub async fn get(&self, code: &LobbyCode) -> Option<LobbyHandle> {
        self.lobbies.read().await.get(code).cloned()
    }

    /// Number of open lobbies.
    pub async fn len(&self) -> usize {
        self.lobbies.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.lobbies.read().await.is_empty()
    }

    /// Creates a lobby hosted by `player_id` and sends `lobby_created` to
    /// the creator.
    ///
    /// # Errors
    /// `NameRequired` if `name` is blank.
    pub async fn create_lobby(&self, player_id: PlayerId, name: &str) -> Result<LobbyCode, LobbyError> {
        let name = validate_name(name)?;

        let (code, handle) = {
            let mut lobbies = self.lobbies.write().await;
            let code = loop {
                let candidate = LobbyCode::generate(self.config.code_length);
                if !lobbies.contains_key(&candidate) {
                    break candidate;
                }
                tracing::debug!(code = %candidate, "lobby code collision, regenerating");
            };
            let handle = Arc::new(Mutex::new(Lobby::new(code.clone(), player_id, name)));
            lobbies.insert(code.clone(), Arc::clone(&handle));
            (code, handle)
        };

        let lobby = handle.lock().await;
        tracing::info!(lobby = %code, %player_id, "lobby created");
        self.fanout
            .dispatch(
                &lobby,
                vec![(
                    Recipient::Player(player_id),
                    ServerMessage::LobbyCreated {
                        lobby_code: code.clone(),
                        player_id,
                        is_host: true,
                        settings: lobby.settings().clone(),
                    },
                )],
            )
            .await;

        Ok(code)
    }

    /// Runs the checks `join_lobby` makes, in the same order, without
    /// joining. Lets a caller reject a bad join before giving up the lobby
    /// it is in.
    pub async fn check_joinable(&self, raw_code: &str, name: &str) -> Result<LobbyCode, LobbyError> {
        validate_name(name)?;
        let code = LobbyCode::parse(raw_code, self.config.code_length).ok_or(LobbyError::InvalidCode)?;
        let handle = self.get(&code).await.ok_or(LobbyError::NotFound)?;
        check_admits(&*handle.lock().await, self.config.max_players)?;
        Ok(code)
    }

    /// Adds `player_id` to the lobby with code `raw_code` (any case,
    /// surrounding whitespace ignored). Sends `lobby_joined` to the joiner
    /// and `player_joined` to everyone else.
    ///
    /// # Errors
    /// `NameRequired`, `InvalidCode`, `NotFound`, or `Full`.
    pub async fn join_lobby(
        &self,
        raw_code: &str,
        player_id: PlayerId,
        name: &str,
    ) -> Result<LobbyCode, LobbyError> {
        let name = validate_name(name)?;
        let code = LobbyCode::parse(raw_code, self.config.code_length).ok_or(LobbyError::InvalidCode)?;
        let handle = self.get(&code).await.ok_or(LobbyError::NotFound)?;

        let mut lobby = handle.lock().await;
        check_admits(&lobby, self.config.max_players)?;

        let player = lobby.add(player_id, name).info();
        tracing::info!(lobby = %code, %player_id, players = lobby.len(), "player joined");

        let joined = ServerMessage::LobbyJoined {
            lobby_code: code.clone(),
            player_id,
            is_host: false,
            players: lobby.player_infos(),
            settings: lobby.settings().clone(),
        };
        self.fanout
            .dispatch(
                &lobby,
                vec![
                    (Recipient::Player(player_id), joined),
                    (Recipient::AllExcept(player_id), ServerMessage::PlayerJoined { player }),
                ],
            )
            .await;

        Ok(code)
    }

    /// Updates a participant's ready flag and broadcasts the change.
    /// Unknown participants are ignored.
    ///
    /// # Errors
    /// `NotFound` if the lobby is gone.
    pub async fn set_ready(&self, code: &LobbyCode, player_id: PlayerId, ready: bool) -> Result<(), LobbyError> {
        let handle = self.get(code).await.ok_or(LobbyError::NotFound)?;
        let mut lobby = handle.lock().await;

        if !lobby.set_ready(player_id, ready) {
            tracing::debug!(lobby = %code, %player_id, "ready from unknown participant ignored");
            return Ok(());
        }

        self.fanout
            .broadcast(
                &lobby,
                ServerMessage::PlayerReadyChanged {
                    player_id,
                    is_ready: ready,
                },
            )
            .await;
        Ok(())
    }

    /// Host only: merges `patch` into the settings and broadcasts the
    /// merged result.
    ///
    /// # Errors
    /// `NotFound` if the lobby is gone, `NotHost` if the caller is not host.
    pub async fn update_settings(
        &self,
        code: &LobbyCode,
        player_id: PlayerId,
        patch: Map<String, Value>,
    ) -> Result<(), LobbyError> {
        let handle = self.get(code).await.ok_or(LobbyError::NotFound)?;
        let mut lobby = handle.lock().await;

        if !lobby.is_host(player_id) {
            return Err(LobbyError::NotHost("update settings"));
        }

        lobby.settings_mut().merge(patch);
        let settings = lobby.settings().clone();
        tracing::debug!(lobby = %code, "settings updated");
        self.fanout
            .broadcast(&lobby, ServerMessage::SettingsUpdated { settings })
            .await;
        Ok(())
    }

    /// Removes a participant. If the lobby empties it is closed and removed
    /// from the registry; otherwise a departing host hands over to the
    /// first remaining participant, who alone receives `host_transferred`,
    /// and everyone remaining receives `player_left`.
    ///
    /// # Errors
    /// `NotFound` if the lobby is gone, `NotInLobby` if the participant
    /// already left.
    pub async fn remove_participant(&self, code: &LobbyCode, player_id: PlayerId) -> Result<Departure, LobbyError> {
        let handle = self.get(code).await.ok_or(LobbyError::NotFound)?;
        let mut lobby = handle.lock().await;

        let removal = lobby.remove(player_id).ok_or(LobbyError::NotInLobby)?;
        tracing::info!(lobby = %code, %player_id, players = lobby.len(), "player left");

        if lobby.is_closed() {
            drop(lobby);
            let mut lobbies = self.lobbies.write().await;
            if lobbies.get(code).is_some_and(|current| Arc::ptr_eq(current, &handle)) {
                lobbies.remove(code);
            }
            tracing::info!(lobby = %code, "lobby closed");
            return Ok(Departure { lobby_closed: true });
        }

        let mut effects = Vec::with_capacity(2);
        if let Some(new_host) = removal.promoted {
            tracing::info!(lobby = %code, %new_host, "host transferred");
            effects.push((
                Recipient::Player(new_host),
                ServerMessage::HostTransferred { is_host: true },
            ));
        }
        effects.push((Recipient::All, ServerMessage::PlayerLeft { player_id }));
        self.fanout.dispatch(&lobby, effects).await;

        Ok(Departure { lobby_closed: false })
    }
}

fn check_admits(lobby: &Lobby, max_players: usize) -> Result<(), LobbyError> {
    if lobby.is_closed() {
        return Err(LobbyError::NotFound);
    }
    if lobby.len() >= max_players {
        return Err(LobbyError::Full);
    }
    Ok(())
}

fn validate_name(raw: &str) -> Result<String, LobbyError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(LobbyError::NameRequired);
    }
    Ok(name.to_owned())
}
