//! `DegreesServer` builder and server loop.
//!
//! This is the entry point for running a degrees server. It ties together
//! all the layers: transport → protocol → lobby/session → metadata.

use std::sync::Arc;

use degrees_lobby::{Fanout, LobbyConfig, LobbyRegistry};
use degrees_metadata::{CacheConfig, Catalog, MetadataCache};
use degrees_protocol::{Codec, JsonCodec};
use degrees_session::SessionCoordinator;
use degrees_transport::{Handshake, Transport, WebSocketTransport};

use crate::handler::handle_connection;
use crate::{DegreesError, ServerConfig};

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The stores
/// inside do their own locking.
pub(crate) struct ServerState<P, C> {
    pub(crate) coordinator: SessionCoordinator<P>,
    pub(crate) codec: C,
}

impl<P: Catalog, C> ServerState<P, C> {
    pub(crate) fn lobbies(&self) -> &LobbyRegistry {
        self.coordinator.lobbies()
    }

    pub(crate) fn fanout(&self) -> &Fanout {
        self.coordinator.lobbies().fanout()
    }
}

/// Builder for configuring and starting a degrees server.
///
/// # Example
///
/// ```rust,no_run
/// use degrees::{DegreesServer, DegreesError};
/// use degrees_metadata::{SpotifyCatalog, SpotifyConfig};
///
/// # async fn run() -> Result<(), DegreesError> {
/// let catalog = SpotifyCatalog::new(SpotifyConfig::default())?;
/// let server = DegreesServer::builder()
///     .bind("0.0.0.0:3000")
///     .build(catalog)
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct DegreesServerBuilder {
    config: ServerConfig,
}

impl DegreesServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets the playlist start and target artists are drawn from.
    pub fn playlist(mut self, playlist_id: &str) -> Self {
        self.config.playlist_id = playlist_id.to_string();
        self
    }

    pub fn lobby_config(mut self, lobby: LobbyConfig) -> Self {
        self.config.lobby = lobby;
        self
    }

    pub fn cache_config(mut self, cache: CacheConfig) -> Self {
        self.config.cache = cache;
        self
    }

    /// Binds the listener and wires the stores around `catalog`.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build<P: Catalog>(self, catalog: P) -> Result<DegreesServer<P, JsonCodec>, DegreesError> {
        let transport = WebSocketTransport::bind(&self.config.bind_addr)
            .await?
            .with_handshake_timeout(self.config.handshake_timeout);

        let fanout = Arc::new(Fanout::new());
        let lobbies = Arc::new(LobbyRegistry::new(self.config.lobby, fanout));
        let metadata = MetadataCache::new(catalog, self.config.cache);
        let coordinator = SessionCoordinator::new(lobbies, metadata, self.config.playlist_id);

        let state = Arc::new(ServerState {
            coordinator,
            codec: JsonCodec,
        });

        Ok(DegreesServer { transport, state })
    }
}

impl Default for DegreesServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running degrees server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct DegreesServer<P, C> {
    transport: WebSocketTransport,
    state: Arc<ServerState<P, C>>,
}

impl DegreesServer<(), JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> DegreesServerBuilder {
        DegreesServerBuilder::new()
    }
}

impl<P, C> DegreesServer<P, C>
where
    P: Catalog,
    C: Codec,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the server accept loop.
    ///
    /// Accepts incoming connections and spawns a task for each that
    /// completes the handshake and then runs the handler. Runs until the
    /// process is terminated.
    pub async fn run(mut self) -> Result<(), DegreesError> {
        tracing::info!("degrees server running");

        loop {
            match self.transport.accept().await {
                Ok(pending) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        let peer = pending.peer_addr();
                        let conn = match pending.complete().await {
                            Ok(conn) => conn,
                            Err(e) => {
                                tracing::debug!(%peer, error = %e, "handshake failed");
                                return;
                            }
                        };
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
