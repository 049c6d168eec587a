//! The metadata cache: the only path from the session engine to the
//! upstream catalog.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use degrees_protocol::{ArtistNode, NodeId};
use tracing::{debug, info};

use crate::{Catalog, MetadataError, TtlCache};

/// Upper bound on playlist pages followed for one enumeration.
const MAX_PLAYLIST_PAGES: usize = 50;

/// Lifetimes for the cached resources.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long a fetched artist node is served.
    ///
    /// Default: 10 minutes
    pub node_ttl: Duration,

    /// How long a playlist's candidate id list is served.
    ///
    /// Default: 10 minutes
    pub playlist_ttl: Duration,

    /// Subtracted from a token's reported lifetime so it is renewed
    /// before the issuer starts rejecting it.
    ///
    /// Default: 5 minutes
    pub token_refresh_buffer: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            node_ttl: Duration::from_secs(10 * 60),
            playlist_ttl: Duration::from_secs(10 * 60),
            token_refresh_buffer: Duration::from_secs(5 * 60),
        }
    }
}

struct Inner<C> {
    catalog: C,
    config: CacheConfig,
    token: TtlCache<(), String>,
    nodes: TtlCache<NodeId, Arc<ArtistNode>>,
    playlists: TtlCache<String, Arc<Vec<NodeId>>>,
}

/// Caches tokens, artist nodes, and playlist candidate lists in front of a
/// [`Catalog`].
///
/// Every lookup goes through a [`TtlCache`], so concurrent misses for the
/// same key cost one upstream call. Cloning shares the caches.
pub struct MetadataCache<C> {
    inner: Arc<Inner<C>>,
}

impl<C> Clone for MetadataCache<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Catalog> MetadataCache<C> {
    pub fn new(catalog: C, config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                catalog,
                config,
                token: TtlCache::new(),
                nodes: TtlCache::new(),
                playlists: TtlCache::new(),
            }),
        }
    }

    /// The wrapped catalog.
    pub fn catalog(&self) -> &C {
        &self.inner.catalog
    }

    /// A valid access token, renewed `token_refresh_buffer` before expiry.
    pub async fn token(&self) -> Result<String, MetadataError> {
        let inner = Arc::clone(&self.inner);
        self.inner
            .token
            .get_or_fetch((), move || async move {
                let grant = inner.catalog.acquire_token().await?;
                let ttl = grant
                    .expires_in
                    .saturating_sub(inner.config.token_refresh_buffer);
                info!(?ttl, "access token acquired");
                Ok((grant.access_token, ttl))
            })
            .await
    }

    /// The node for `id`, from cache or fetched.
    pub async fn artist(&self, id: &NodeId) -> Result<Arc<ArtistNode>, MetadataError> {
        if let Some(node) = self.inner.nodes.peek(id).await {
            debug!(artist = %id, "node cache hit");
            return Ok(node);
        }
        debug!(artist = %id, "node cache miss");

        let this = self.clone();
        let key = id.clone();
        self.inner
            .nodes
            .get_or_fetch(id.clone(), move || async move {
                let token = this.token().await?;
                let node = this.inner.catalog.fetch_artist(&token, &key).await?;
                Ok((Arc::new(node), this.inner.config.node_ttl))
            })
            .await
    }

    /// Every distinct artist id credited on the playlist's tracks, in order
    /// of first appearance.
    pub async fn candidate_ids(&self, playlist_id: &str) -> Result<Arc<Vec<NodeId>>, MetadataError> {
        let this = self.clone();
        let key = playlist_id.to_owned();
        self.inner
            .playlists
            .get_or_fetch(playlist_id.to_owned(), move || async move {
                let ids = this.enumerate_playlist(&key).await?;
                info!(playlist = %key, candidates = ids.len(), "playlist enumerated");
                Ok((Arc::new(ids), this.inner.config.playlist_ttl))
            })
            .await
    }

    async fn enumerate_playlist(&self, playlist_id: &str) -> Result<Vec<NodeId>, MetadataError> {
        let token = self.token().await?;
        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_PLAYLIST_PAGES {
            let page = self
                .inner
                .catalog
                .playlist_page(&token, playlist_id, cursor.as_deref())
                .await?;
            for id in page.artist_ids {
                if !id.is_empty() && seen.insert(id.clone()) {
                    ids.push(id);
                }
            }
            match page.next {
                Some(next) => cursor = Some(next),
                None => return Ok(ids),
            }
        }

        debug!(playlist = playlist_id, "page limit reached, using partial list");
        Ok(ids)
    }
}
