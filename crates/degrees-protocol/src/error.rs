//! Error types for the protocol layer.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a message into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a message).
    ///
    /// Common causes: malformed JSON, an unknown `"type"` tag, or a
    /// field with the wrong JSON type.
    #[error("invalid message: {0}")]
    Decode(serde_json::Error),

    /// The message parsed but violates a protocol rule, e.g. a lobby code
    /// of the wrong length.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
