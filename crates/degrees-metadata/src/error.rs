//! Error types for the metadata layer.

/// Errors from the upstream catalog or the layers wrapping it.
///
/// `Clone` because one failed fetch is handed to every caller that was
/// coalesced onto it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MetadataError {
    /// Every attempt failed. `status` is the last HTTP status observed, if
    /// any attempt got as far as a response.
    #[error("upstream request failed after {attempts} attempts: {detail}")]
    Exhausted {
        attempts: u32,
        status: Option<u16>,
        detail: String,
    },

    /// A single request could not be sent or its body not read.
    #[error("upstream transport error: {0}")]
    Transport(String),

    /// The upstream answered with a body we could not interpret.
    #[error("unexpected upstream payload: {0}")]
    Decode(String),

    /// The id is not one the upstream could have issued, so no request
    /// was made.
    #[error("not a catalog id: {0:?}")]
    InvalidId(String),

    /// Client credentials for the upstream are not configured.
    #[error("upstream credentials are not configured")]
    MissingCredentials,
}

impl MetadataError {
    /// The last HTTP status seen before giving up, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Exhausted { status, .. } => *status,
            _ => None,
        }
    }
}
