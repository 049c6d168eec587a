//! Wire protocol for degrees.
//!
//! This crate defines what clients and the server say to each other:
//!
//! - **Identity** ([`PlayerId`], [`LobbyCode`], [`NodeId`]): newtypes that
//!   keep the three kinds of identifier apart.
//! - **Nodes** ([`ArtistNode`] and friends): the explorable content that
//!   sessions are played over.
//! - **Messages** ([`ClientMessage`], [`ServerMessage`], [`Recipient`]):
//!   the JSON objects that travel on the socket, tagged by `"type"`.
//! - **Codec** ([`Codec`], [`JsonCodec`]): bytes ↔ messages.
//!
//! The protocol layer knows nothing about connections, lobbies or caches.
//!
//! ```text
//! Transport (bytes) → Protocol (ClientMessage) → Lobby / Session
//! ```

mod codec;
mod error;
mod node;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use node::{Album, ArtistNode, ArtistRef, Image, Track};
pub use types::{
    ClientMessage, LobbyCode, LobbySettings, NodeId, PlayerId, PlayerInfo,
    Recipient, ServerMessage,
};
