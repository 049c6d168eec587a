//! Lobby configuration and the game phase state machine.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// LobbyConfig
// ---------------------------------------------------------------------------

/// Configuration shared by every lobby in a registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyConfig {
    /// Maximum participants in one lobby.
    pub max_players: usize,

    /// Length of generated lobby codes. Joins with a code of any other
    /// length are rejected before lookup.
    pub code_length: usize,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            max_players: 8,
            code_length: 6,
        }
    }
}

// ---------------------------------------------------------------------------
// GamePhase
// ---------------------------------------------------------------------------

/// Where a lobby is in its game.
///
/// ```text
/// Waiting → Started → Won
///              ↑         │
///              └─────────┘  rematch
/// ```
///
/// - **Waiting**: participants gather and ready up. Only the host can
///   leave this phase, and only when everyone is ready.
/// - **Started**: a session exists; participants move.
/// - **Won**: someone reached the target. Not terminal: moves keep being
///   applied and later arrivals are announced too. The host may start a
///   new round from here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    #[default]
    Waiting,
    Started,
    Won,
}

impl GamePhase {
    /// Returns `true` once a session exists for the lobby.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Started | Self::Won)
    }

    /// The phase after this one, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Waiting => Some(Self::Started),
            Self::Started => Some(Self::Won),
            Self::Won => Some(Self::Started),
        }
    }

    /// Returns `true` if moving to `target` is a valid transition.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target)
    }
}

impl std::fmt::Display for GamePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waiting => write!(f, "Waiting"),
            Self::Started => write!(f, "Started"),
            Self::Won => write!(f, "Won"),
        }
    }
}
