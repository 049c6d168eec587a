//! # degrees
//!
//! Realtime lobby and session server for a multiplayer artist-hopping game.
//!
//! Players gather in a lobby identified by a short code, the host starts a
//! session with a random start and target artist, and everyone races from
//! the start to the target by following related-artist links. Every move
//! is broadcast to the lobby as it happens.
//!
//! The server crate wires the layers together:
//!
//! ```text
//! Transport (bytes) → Protocol (ClientMessage) → Lobby / Session → Metadata
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use degrees::prelude::*;
//!
//! # async fn run(catalog: impl Catalog) -> Result<(), DegreesError> {
//! let server = DegreesServer::builder()
//!     .bind("0.0.0.0:3000")
//!     .build(catalog)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::{DEFAULT_PLAYLIST_ID, ServerConfig};
pub use error::{DegreesError, ErrorCategory};
pub use server::{DegreesServer, DegreesServerBuilder};

/// Everything needed to embed a server with a custom catalog.
pub mod prelude {
    pub use crate::{DegreesError, DegreesServer, DegreesServerBuilder, ServerConfig};
    pub use degrees_lobby::LobbyConfig;
    pub use degrees_metadata::{CacheConfig, Catalog, MetadataError, PlaylistPage, TokenGrant};
    pub use degrees_protocol::{ArtistNode, NodeId};
}
