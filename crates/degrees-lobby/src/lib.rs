//! Lobby membership for degrees.
//!
//! A lobby is a short code, an ordered list of participants with exactly
//! one host, host-controlled settings, and a game phase. Each lobby sits
//! behind its own mutex; the registry map that finds lobbies by code has
//! its own lock, never taken while a lobby lock is held.
//!
//! # Key types
//!
//! - [`LobbyRegistry`]: create, join, ready, settings, leave
//! - [`Lobby`]: the state behind one lobby's lock
//! - [`Fanout`]: `PlayerId → sender` registry that delivers broadcasts
//! - [`GamePhase`]: `Waiting → Started → Won`, and back to `Started` for a rematch
//! - [`LobbyConfig`]: capacity and code length

mod config;
mod error;
mod fanout;
mod lobby;
mod registry;

pub use config::{GamePhase, LobbyConfig};
pub use error::LobbyError;
pub use fanout::{Fanout, PlayerSender};
pub use lobby::{Lobby, Participant, Removal};
pub use registry::{Departure, LobbyHandle, LobbyRegistry};
