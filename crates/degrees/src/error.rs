//! Unified error type for the degrees server.

use degrees_lobby::LobbyError;
use degrees_metadata::MetadataError;
use degrees_protocol::ProtocolError;
use degrees_session::SessionError;
use degrees_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum DegreesError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame that could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A lobby operation was rejected.
    #[error(transparent)]
    Lobby(#[from] LobbyError),

    /// Starting or playing a session failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The upstream catalog could not be reached or configured.
    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

/// How an error is reported and what it means for the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing or malformed input.
    Validation,
    /// Unknown lobby, or the caller is not part of it.
    NotFound,
    /// A host-only action by someone else.
    Authorization,
    /// Lobby full, or too few candidate nodes to start.
    Capacity,
    /// The upstream catalog failed after retrying.
    Upstream,
    /// Unparseable input, or a broken socket.
    Protocol,
}

impl DegreesError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Transport(_) | Self::Protocol(_) => ErrorCategory::Protocol,
            Self::Lobby(e) => lobby_category(e),
            Self::Session(e) => session_category(e),
            Self::Metadata(_) => ErrorCategory::Upstream,
        }
    }
}

fn lobby_category(error: &LobbyError) -> ErrorCategory {
    match error {
        LobbyError::NameRequired | LobbyError::InvalidCode => ErrorCategory::Validation,
        LobbyError::NotFound | LobbyError::NotInLobby => ErrorCategory::NotFound,
        LobbyError::Full => ErrorCategory::Capacity,
        LobbyError::NotHost(_) => ErrorCategory::Authorization,
    }
}

fn session_category(error: &SessionError) -> ErrorCategory {
    match error {
        SessionError::NotHost => ErrorCategory::Authorization,
        SessionError::NotReady
        | SessionError::NoPlayers
        | SessionError::AlreadyStarted
        | SessionError::ArtistIdRequired => ErrorCategory::Validation,
        SessionError::InsufficientNodes(_) => ErrorCategory::Capacity,
        SessionError::Lobby(e) => lobby_category(e),
        SessionError::Metadata(_) => ErrorCategory::Upstream,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::SendFailed("gone".into());
        let degrees_err: DegreesError = err.into();
        assert!(matches!(degrees_err, DegreesError::Transport(_)));
        assert!(degrees_err.to_string().contains("gone"));
        assert_eq!(degrees_err.category(), ErrorCategory::Protocol);
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let degrees_err: DegreesError = err.into();
        assert!(matches!(degrees_err, DegreesError::Protocol(_)));
        assert_eq!(degrees_err.to_string(), "invalid message: bad");
    }

    #[test]
    fn test_lobby_error_display_is_client_text() {
        let degrees_err: DegreesError = LobbyError::NotHost("update settings").into();
        assert_eq!(degrees_err.to_string(), "Only host can update settings");
        assert_eq!(degrees_err.category(), ErrorCategory::Authorization);
    }

    #[test]
    fn test_lobby_error_categories() {
        let cases = [
            (LobbyError::NameRequired, ErrorCategory::Validation),
            (LobbyError::InvalidCode, ErrorCategory::Validation),
            (LobbyError::NotFound, ErrorCategory::NotFound),
            (LobbyError::NotInLobby, ErrorCategory::NotFound),
            (LobbyError::Full, ErrorCategory::Capacity),
        ];
        for (err, expected) in cases {
            assert_eq!(DegreesError::from(err).category(), expected);
        }
    }

    #[test]
    fn test_session_error_categories() {
        assert_eq!(
            DegreesError::from(SessionError::NotHost).category(),
            ErrorCategory::Authorization
        );
        assert_eq!(
            DegreesError::from(SessionError::InsufficientNodes(1)).category(),
            ErrorCategory::Capacity
        );
        assert_eq!(
            DegreesError::from(SessionError::NotReady).category(),
            ErrorCategory::Validation
        );
    }

    #[test]
    fn test_nested_lobby_error_keeps_its_category() {
        let err = DegreesError::from(SessionError::Lobby(LobbyError::NotFound));
        assert_eq!(err.category(), ErrorCategory::NotFound);
        assert_eq!(err.to_string(), "Lobby not found");
    }

    #[test]
    fn test_upstream_failures_are_upstream() {
        let exhausted = MetadataError::Exhausted {
            attempts: 3,
            status: Some(503),
            detail: "HTTP 503".into(),
        };
        assert_eq!(
            DegreesError::from(exhausted.clone()).category(),
            ErrorCategory::Upstream
        );
        assert_eq!(
            DegreesError::from(SessionError::Metadata(exhausted)).category(),
            ErrorCategory::Upstream
        );
    }
}
