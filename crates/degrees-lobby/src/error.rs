//! Error types for the lobby layer.
//!
//! The `Display` text of each variant is what the client sees in its
//! `error` message.

/// Errors that can occur during lobby operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    /// The display name is missing or blank.
    #[error("Player name required")]
    NameRequired,

    /// The code has the wrong length.
    #[error("Invalid lobby code")]
    InvalidCode,

    /// No open lobby has this code.
    #[error("Lobby not found")]
    NotFound,

    /// The lobby is at capacity.
    #[error("Lobby is full")]
    Full,

    /// A host-only action was attempted by someone else. Carries the
    /// action, e.g. "update settings".
    #[error("Only host can {0}")]
    NotHost(&'static str),

    /// The participant is not (or no longer) in the lobby.
    #[error("Not in lobby")]
    NotInLobby,
}
