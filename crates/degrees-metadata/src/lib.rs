//! Metadata layer for degrees.
//!
//! Everything that leaves the process goes through this crate. It shields
//! the session engine from upstream latency and rate limits:
//!
//! - [`TtlCache`]: per-key TTL cache with request coalescing: concurrent
//!   misses for one key share a single in-flight fetch.
//! - [`RetryPolicy`] / [`fetch_with_retry`]: bounded attempts, `429`
//!   handling, linear backoff.
//! - [`Catalog`]: the upstream capability (token, artist, playlist page).
//! - [`MetadataCache`]: the only entry point the session engine uses;
//!   caches the access token, artist nodes, and playlist candidate lists.
//! - [`SpotifyCatalog`]: HTTP implementation of [`Catalog`].
//!
//! ```text
//! Session Coordinator → MetadataCache → TtlCache → Catalog → HTTP
//! ```

#![allow(async_fn_in_trait)]

mod cache;
mod catalog;
mod error;
mod metadata;
mod retry;
mod spotify;

pub use cache::TtlCache;
pub use catalog::{Catalog, PlaylistPage, TokenGrant};
pub use error::MetadataError;
pub use metadata::{CacheConfig, MetadataCache};
pub use retry::{HttpReply, RetryPolicy, fetch_with_retry};
pub use spotify::{SpotifyCatalog, SpotifyConfig};
