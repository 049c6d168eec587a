//! Error types for the session layer.

use degrees_lobby::LobbyError;
use degrees_metadata::MetadataError;

/// Errors from starting or playing a session.
///
/// The `Display` text of the validation variants is what the client sees.
/// Upstream failures are reported with operation-specific text by the
/// connection handler instead.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Only the host may start the session.
    #[error("Only host can start the game")]
    NotHost,

    /// At least one participant has not readied up.
    #[error("All players must be ready")]
    NotReady,

    /// The lobby has no participants.
    #[error("No players in lobby")]
    NoPlayers,

    /// A round is in progress and nobody has won it yet.
    #[error("Game already started")]
    AlreadyStarted,

    /// The candidate playlist yielded fewer than two distinct artists.
    #[error("Not enough artists to start")]
    InsufficientNodes(usize),

    /// A move or lookup named no artist.
    #[error("Artist ID required")]
    ArtistIdRequired,

    #[error(transparent)]
    Lobby(#[from] LobbyError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),
}
