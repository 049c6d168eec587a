//! Core protocol types: identifiers, lobby settings, and the messages that
//! travel on the wire.
//!
//! Every message is a JSON object tagged by a snake_case `"type"` field with
//! camelCase payload fields, which is what browser clients expect:
//!
//! ```text
//! {"type":"player_move","artistId":"4Z8W4fKeB5YxbusRsdQVPb"}
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ArtistNode;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Counter backing [`PlayerId::next`].
static NEXT_PLAYER_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies a participant for the lifetime of the process.
///
/// Serialized as a plain number (`#[serde(transparent)]`), so `PlayerId(42)`
/// is `42` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl PlayerId {
    /// Allocates a fresh id. Ids are never reused within one process.
    pub fn next() -> Self {
        Self(NEXT_PLAYER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// Characters a lobby code is drawn from.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// The short code players type to find a lobby, e.g. `"K3ZQ9A"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LobbyCode(String);

impl LobbyCode {
    /// Draws a random code of `len` characters from `A–Z0–9`.
    ///
    /// Uniqueness is the registry's job; it retries on collision.
    pub fn generate(len: usize) -> Self {
        let mut rng = rand::rng();
        let code = (0..len)
            .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    /// Normalizes user input into a code.
    ///
    /// Surrounding whitespace is dropped and letters are upper-cased.
    /// Returns `None` unless the result is exactly `len` characters from the
    /// code alphabet.
    pub fn parse(raw: &str, len: usize) -> Option<Self> {
        let code = raw.trim().to_ascii_uppercase();
        let valid = code.len() == len && code.bytes().all(|b| CODE_ALPHABET.contains(&b));
        valid.then_some(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LobbyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies a node (an artist) in the upstream catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// Who inside a lobby should receive a server message.
///
/// Lobby and session operations return `(Recipient, ServerMessage)` pairs;
/// the fan-out resolves them against the lobby's current participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    /// Every participant in the lobby.
    All,
    /// One participant.
    Player(PlayerId),
    /// Every participant except one (typically the one who caused it).
    AllExcept(PlayerId),
}

// ---------------------------------------------------------------------------
// Lobby settings
// ---------------------------------------------------------------------------

/// Host-controlled game settings.
///
/// The server does not interpret them; it stores, merges, and echoes them
/// back. Known keys today are `difficulty` and `timeLimit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LobbySettings(Map<String, Value>);

impl LobbySettings {
    /// Merges `patch` into the settings, field by field. Fields present in
    /// the patch overwrite; others are kept.
    pub fn merge(&mut self, patch: Map<String, Value>) {
        self.0.extend(patch);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

impl Default for LobbySettings {
    fn default() -> Self {
        let mut map = Map::new();
        map.insert("difficulty".into(), Value::from("medium"));
        map.insert("timeLimit".into(), Value::from("10"));
        Self(map)
    }
}

// ---------------------------------------------------------------------------
// Participant summary
// ---------------------------------------------------------------------------

/// A participant as other clients see them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    pub id: PlayerId,
    pub name: String,
    pub is_host: bool,
    pub is_ready: bool,
}

// ---------------------------------------------------------------------------
// Inbound messages
// ---------------------------------------------------------------------------

/// Messages a client sends to the server.
///
/// String fields default to empty when missing so that "name required" and
/// similar problems surface as validation errors rather than parse errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Create a new lobby and become its host.
    #[serde(rename_all = "camelCase")]
    CreateLobby {
        #[serde(default)]
        player_name: String,
    },

    /// Join an existing lobby by code.
    #[serde(rename_all = "camelCase")]
    JoinLobby {
        #[serde(default)]
        player_name: String,
        #[serde(default)]
        lobby_code: String,
    },

    /// Leave the current lobby.
    LeaveLobby {},

    /// Toggle this participant's ready flag.
    PlayerReady {
        #[serde(default)]
        ready: bool,
    },

    /// Host only: merge new values into the lobby settings.
    UpdateSettings {
        #[serde(default)]
        settings: Map<String, Value>,
    },

    /// Host only: start the session.
    StartGame {},

    /// Move to the given node.
    #[serde(rename_all = "camelCase")]
    PlayerMove {
        #[serde(default)]
        artist_id: NodeId,
    },

    /// Fetch a node without moving to it.
    #[serde(rename_all = "camelCase")]
    GetArtistData {
        #[serde(default)]
        artist_id: NodeId,
    },
}

// ---------------------------------------------------------------------------
// Outbound messages
// ---------------------------------------------------------------------------

/// Messages the server sends to clients.
///
/// Node payloads are shared (`Arc`) between the session, the cache, and
/// every queued copy of a broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// To the creator: the lobby exists and you host it.
    #[serde(rename_all = "camelCase")]
    LobbyCreated {
        lobby_code: LobbyCode,
        player_id: PlayerId,
        is_host: bool,
        settings: LobbySettings,
    },

    /// To a joiner: full lobby state.
    #[serde(rename_all = "camelCase")]
    LobbyJoined {
        lobby_code: LobbyCode,
        player_id: PlayerId,
        is_host: bool,
        players: Vec<PlayerInfo>,
        settings: LobbySettings,
    },

    /// To everyone else: someone joined.
    PlayerJoined { player: PlayerInfo },

    /// Someone left or disconnected.
    #[serde(rename_all = "camelCase")]
    PlayerLeft { player_id: PlayerId },

    #[serde(rename_all = "camelCase")]
    PlayerReadyChanged { player_id: PlayerId, is_ready: bool },

    SettingsUpdated { settings: LobbySettings },

    /// To the promoted participant only.
    #[serde(rename_all = "camelCase")]
    HostTransferred { is_host: bool },

    /// The session started.
    #[serde(rename_all = "camelCase")]
    GameStarted {
        current_artist: Arc<ArtistNode>,
        target_artist: Arc<ArtistNode>,
        all_artist_ids: Vec<NodeId>,
        game_settings: LobbySettings,
    },

    /// A participant moved. `steps` is `path.len() - 1`.
    #[serde(rename_all = "camelCase")]
    PlayerMoved {
        player_id: PlayerId,
        artist_id: NodeId,
        artist_data: Arc<ArtistNode>,
        path: Vec<NodeId>,
        steps: usize,
        has_won: bool,
    },

    /// A participant reached the target. Play continues.
    #[serde(rename_all = "camelCase")]
    PlayerWon {
        player_id: PlayerId,
        steps: usize,
        path: Vec<NodeId>,
    },

    /// Reply to `get_artist_data`.
    #[serde(rename_all = "camelCase")]
    ArtistData {
        artist_id: NodeId,
        data: Arc<ArtistNode>,
    },

    /// Something the sender did failed. Only ever sent to that sender.
    #[serde(rename_all = "camelCase")]
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        artist_id: Option<NodeId>,
    },
}

impl ServerMessage {
    /// An error reply with no extra context.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            artist_id: None,
        }
    }

    /// The wire `"type"` of this message, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LobbyCreated { .. } => "lobby_created",
            Self::LobbyJoined { .. } => "lobby_joined",
            Self::PlayerJoined { .. } => "player_joined",
            Self::PlayerLeft { .. } => "player_left",
            Self::PlayerReadyChanged { .. } => "player_ready_changed",
            Self::SettingsUpdated { .. } => "settings_updated",
            Self::HostTransferred { .. } => "host_transferred",
            Self::GameStarted { .. } => "game_started",
            Self::PlayerMoved { .. } => "player_moved",
            Self::PlayerWon { .. } => "player_won",
            Self::ArtistData { .. } => "artist_data",
            Self::Error { .. } => "error",
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The JSON shapes below are what browser clients parse; a renamed
    //! field is a broken client.

    use super::*;
    use serde_json::json;

    // =====================================================================
    // Identity types
    // =====================================================================

    #[test]
    fn test_player_id_serializes_as_plain_number() {
        assert_eq!(serde_json::to_string(&PlayerId(42)).unwrap(), "42");
        assert_eq!(PlayerId(7).to_string(), "P-7");
    }

    #[test]
    fn test_player_id_next_is_unique() {
        let a = PlayerId::next();
        let b = PlayerId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn test_lobby_code_generate_uses_alphabet_and_length() {
        for _ in 0..50 {
            let code = LobbyCode::generate(6);
            assert_eq!(code.as_str().len(), 6);
            assert!(code.as_str().bytes().all(|b| CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn test_lobby_code_parse_normalizes_case_and_whitespace() {
        let code = LobbyCode::parse("  ab12cd ", 6).expect("valid code");
        assert_eq!(code.as_str(), "AB12CD");
    }

    #[test]
    fn test_lobby_code_parse_rejects_wrong_length_or_chars() {
        assert!(LobbyCode::parse("ABC", 6).is_none());
        assert!(LobbyCode::parse("ABCDEFG", 6).is_none());
        assert!(LobbyCode::parse("AB-12C", 6).is_none());
        assert!(LobbyCode::parse("", 6).is_none());
    }

    #[test]
    fn test_node_id_blank_is_empty() {
        assert!(NodeId::default().is_empty());
        assert!(NodeId::from("  ").is_empty());
        assert!(!NodeId::from("a1").is_empty());
    }

    // =====================================================================
    // Settings
    // =====================================================================

    #[test]
    fn test_settings_default_values() {
        let settings = LobbySettings::default();
        assert_eq!(settings.get("difficulty"), Some(&json!("medium")));
        assert_eq!(settings.get("timeLimit"), Some(&json!("10")));
    }

    #[test]
    fn test_settings_merge_is_per_field_last_write_wins() {
        let mut settings = LobbySettings::default();
        let patch = json!({"difficulty": "hard", "rounds": 3});
        let serde_json::Value::Object(patch) = patch else {
            unreachable!()
        };

        settings.merge(patch);

        assert_eq!(settings.get("difficulty"), Some(&json!("hard")));
        assert_eq!(settings.get("timeLimit"), Some(&json!("10")));
        assert_eq!(settings.get("rounds"), Some(&json!(3)));
    }

    // =====================================================================
    // ClientMessage
    // =====================================================================

    #[test]
    fn test_client_create_lobby_parses_camel_case() {
        let msg: ClientMessage =
            serde_json::from_value(json!({"type": "create_lobby", "playerName": "Ada"})).unwrap();
        assert_eq!(
            msg,
            ClientMessage::CreateLobby {
                player_name: "Ada".into()
            }
        );
    }

    #[test]
    fn test_client_missing_fields_default_to_empty() {
        let msg: ClientMessage = serde_json::from_value(json!({"type": "join_lobby"})).unwrap();
        assert_eq!(
            msg,
            ClientMessage::JoinLobby {
                player_name: String::new(),
                lobby_code: String::new(),
            }
        );
    }

    #[test]
    fn test_client_player_move_uses_artist_id() {
        let msg: ClientMessage =
            serde_json::from_value(json!({"type": "player_move", "artistId": "a9"})).unwrap();
        assert_eq!(
            msg,
            ClientMessage::PlayerMove {
                artist_id: NodeId::from("a9")
            }
        );
    }

    #[test]
    fn test_client_empty_variants_tolerate_extra_fields() {
        let msg: ClientMessage =
            serde_json::from_value(json!({"type": "start_game", "lobbyCode": "X"})).unwrap();
        assert_eq!(msg, ClientMessage::StartGame {});
    }

    #[test]
    fn test_client_unknown_type_is_error() {
        let result: Result<ClientMessage, _> =
            serde_json::from_value(json!({"type": "fly_to_moon"}));
        assert!(result.is_err());
    }

    // =====================================================================
    // ServerMessage
    // =====================================================================

    #[test]
    fn test_server_lobby_joined_json_shape() {
        let msg = ServerMessage::LobbyJoined {
            lobby_code: LobbyCode::parse("ABC123", 6).unwrap(),
            player_id: PlayerId(2),
            is_host: false,
            players: vec![PlayerInfo {
                id: PlayerId(1),
                name: "Ada".into(),
                is_host: true,
                is_ready: true,
            }],
            settings: LobbySettings::default(),
        };
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "lobby_joined");
        assert_eq!(json["lobbyCode"], "ABC123");
        assert_eq!(json["playerId"], 2);
        assert_eq!(json["isHost"], false);
        assert_eq!(json["players"][0]["isHost"], true);
        assert_eq!(json["settings"]["difficulty"], "medium");
    }

    #[test]
    fn test_server_player_moved_json_shape() {
        let msg = ServerMessage::PlayerMoved {
            player_id: PlayerId(1),
            artist_id: "b".into(),
            artist_data: Arc::new(ArtistNode::bare("b", "B")),
            path: vec!["a".into(), "b".into()],
            steps: 1,
            has_won: true,
        };
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "player_moved");
        assert_eq!(json["artistId"], "b");
        assert_eq!(json["artistData"]["name"], "B");
        assert_eq!(json["path"], json!(["a", "b"]));
        assert_eq!(json["steps"], 1);
        assert_eq!(json["hasWon"], true);
        assert_eq!(msg.kind(), "player_moved");
    }

    #[test]
    fn test_server_game_started_json_shape() {
        let msg = ServerMessage::GameStarted {
            current_artist: Arc::new(ArtistNode::bare("a", "A")),
            target_artist: Arc::new(ArtistNode::bare("b", "B")),
            all_artist_ids: vec!["a".into(), "b".into()],
            game_settings: LobbySettings::default(),
        };
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "game_started");
        assert_eq!(json["currentArtist"]["id"], "a");
        assert_eq!(json["targetArtist"]["id"], "b");
        assert_eq!(json["allArtistIds"].as_array().unwrap().len(), 2);
        assert_eq!(json["gameSettings"]["timeLimit"], "10");
    }

    #[test]
    fn test_server_error_omits_missing_artist_id() {
        let json = serde_json::to_value(ServerMessage::error("Lobby is full")).unwrap();
        assert_eq!(json, json!({"type": "error", "message": "Lobby is full"}));

        let json = serde_json::to_value(ServerMessage::Error {
            message: "Failed to fetch artist data".into(),
            artist_id: Some("a1".into()),
        })
        .unwrap();
        assert_eq!(json["artistId"], "a1");
    }

    #[test]
    fn test_server_host_transferred_json_shape() {
        let json = serde_json::to_value(ServerMessage::HostTransferred { is_host: true }).unwrap();
        assert_eq!(json, json!({"type": "host_transferred", "isHost": true}));
    }
}
