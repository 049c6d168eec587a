//! The upstream catalog capability.
//!
//! [`Catalog`] is the seam between the caching layer and the network. The
//! production implementation is [`SpotifyCatalog`](crate::SpotifyCatalog);
//! tests substitute an in-memory fake that counts calls or fails on
//! demand. Implementations do their own retrying; everything above this
//! trait sees either a value or a final [`MetadataError`].

use std::future::Future;
use std::time::Duration;

use degrees_protocol::{ArtistNode, NodeId};

use crate::MetadataError;

/// A freshly issued access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    /// Lifetime reported by the issuer.
    pub expires_in: Duration,
}

/// One page of a playlist, reduced to the artist ids it contains.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaylistPage {
    /// Artist ids in playlist order. May contain duplicates.
    pub artist_ids: Vec<NodeId>,
    /// Opaque cursor for the next page; `None` on the last page.
    pub next: Option<String>,
}

/// Source of tokens, artist nodes, and playlist pages.
///
/// `Send + Sync + 'static` because a single catalog is shared by every
/// connection task for the lifetime of the server.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use degrees_metadata::{Catalog, MetadataError, PlaylistPage, TokenGrant};
/// use degrees_protocol::{ArtistNode, NodeId};
///
/// /// Every id resolves to an artist named after itself.
/// struct EchoCatalog;
///
/// impl Catalog for EchoCatalog {
///     async fn acquire_token(&self) -> Result<TokenGrant, MetadataError> {
///         Ok(TokenGrant {
///             access_token: "t".into(),
///             expires_in: Duration::from_secs(3600),
///         })
///     }
///
///     async fn fetch_artist(
///         &self,
///         _token: &str,
///         id: &NodeId,
///     ) -> Result<ArtistNode, MetadataError> {
///         Ok(ArtistNode::bare(id.clone(), id.as_str()))
///     }
///
///     async fn playlist_page(
///         &self,
///         _token: &str,
///         _playlist_id: &str,
///         _cursor: Option<&str>,
///     ) -> Result<PlaylistPage, MetadataError> {
///         Ok(PlaylistPage::default())
///     }
/// }
/// ```
pub trait Catalog: Send + Sync + 'static {
    /// Obtains an access token for the other two calls.
    fn acquire_token(&self) -> impl Future<Output = Result<TokenGrant, MetadataError>> + Send;

    /// Fetches and assembles the node for one artist.
    fn fetch_artist(
        &self,
        token: &str,
        id: &NodeId,
    ) -> impl Future<Output = Result<ArtistNode, MetadataError>> + Send;

    /// Fetches one page of a playlist. `cursor` is `None` for the first
    /// page and the previous page's `next` afterwards.
    fn playlist_page(
        &self,
        token: &str,
        playlist_id: &str,
        cursor: Option<&str>,
    ) -> impl Future<Output = Result<PlaylistPage, MetadataError>> + Send;
}
