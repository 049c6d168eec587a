//! Server configuration.

use std::time::Duration;

use degrees_lobby::LobbyConfig;
use degrees_metadata::CacheConfig;
use degrees_transport::DEFAULT_HANDSHAKE_TIMEOUT;

/// Playlist the start and target artists are drawn from unless overridden.
pub const DEFAULT_PLAYLIST_ID: &str = "0JiVp7Z0pYKI8diUV6HJyQ";

/// Everything the server needs apart from the catalog itself.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    ///
    /// Default: `127.0.0.1:3000`
    pub bind_addr: String,

    /// How long a new peer may take to finish the WebSocket upgrade.
    ///
    /// Default: 10 seconds
    pub handshake_timeout: Duration,

    /// Source of start/target candidates.
    ///
    /// Default: [`DEFAULT_PLAYLIST_ID`]
    pub playlist_id: String,

    pub lobby: LobbyConfig,

    pub cache: CacheConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".into(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            playlist_id: DEFAULT_PLAYLIST_ID.into(),
            lobby: LobbyConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}
