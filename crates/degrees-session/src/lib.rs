//! Game sessions for degrees.
//!
//! A session starts when the host of a fully ready lobby asks for it. Two
//! artists are drawn from the candidate playlist (start and target), every
//! participant's path begins at the start, and each move extends the
//! mover's path until someone reaches the target.
//!
//! # How it fits in the stack
//!
//! ```text
//! Connection Handler (above)  ← start_game / player_move / artist_data / leave
//!     ↕
//! Session Coordinator (this crate)  ← validates, fetches, applies, broadcasts
//!     ↕                    ↕
//! Lobby Registry     Metadata Cache  ← membership / upstream data
//! ```

mod coordinator;
mod error;
mod session;
mod store;

pub use coordinator::SessionCoordinator;
pub use error::SessionError;
pub use session::{GameSession, MoveOutcome};
pub use store::{SessionHandle, SessionStore};
