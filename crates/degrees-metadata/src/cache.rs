//! TTL cache with request coalescing.
//!
//! Each key maps to a slot that is either a ready entry (value + fetch
//! instant + TTL) or an in-flight fetch. The in-flight fetch is a
//! [`Shared`] future stored in the map, so:
//!
//! - the first caller for a missing or expired key creates it,
//! - every later caller for the same key awaits a clone of it,
//! - it keeps running even if the caller that created it goes away, since
//!   the next caller picks up the stored clone and polls it.
//!
//! When the fetch finishes it writes its own outcome back: success replaces
//! the slot with a fresh entry, failure removes the slot so the next
//! caller starts over.
//!
//! Time comes from `tokio::time::Instant`, so tests can pause and advance
//! the clock.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::MetadataError;

type InFlight<V> = Shared<BoxFuture<'static, Result<V, MetadataError>>>;

enum Slot<V> {
    Ready {
        value: V,
        fetched_at: Instant,
        ttl: Duration,
    },
    Fetching(InFlight<V>),
}

impl<V> Slot<V> {
    fn is_stale(&self) -> bool {
        match self {
            Slot::Ready { fetched_at, ttl, .. } => fetched_at.elapsed() >= *ttl,
            Slot::Fetching(_) => false,
        }
    }
}

/// A concurrent TTL cache where each entry carries its own TTL.
///
/// Cloning is cheap and clones share the same storage.
pub struct TtlCache<K, V> {
    slots: Arc<Mutex<HashMap<K, Slot<V>>>>,
}

impl<K, V> Clone for TtlCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            slots: Arc::clone(&self.slots),
        }
    }
}

impl<K, V> Default for TtlCache<K, V> {
    fn default() -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value for `key`, or runs `fetch` to produce it.
    ///
    /// `fetch` returns the value together with how long it stays servable.
    /// An entry is served only while `now - fetched_at < ttl`, so a TTL of
    /// zero is never served from cache.
    ///
    /// `fetch` is only called when this caller is the one starting a new
    /// fetch; callers that find a fetch in flight await its result instead.
    pub async fn get_or_fetch<F, Fut>(&self, key: K, fetch: F) -> Result<V, MetadataError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(V, Duration), MetadataError>> + Send + 'static,
    {
        let mut slots = self.slots.lock().await;

        if let Some(slot) = slots.get(&key) {
            match slot {
                Slot::Ready {
                    value,
                    fetched_at,
                    ttl,
                } if fetched_at.elapsed() < *ttl => {
                    return Ok(value.clone());
                }
                Slot::Fetching(in_flight) => {
                    let in_flight = in_flight.clone();
                    drop(slots);
                    return in_flight.await;
                }
                Slot::Ready { .. } => {} // expired: refetch below
            }
        }

        // Every miss sweeps expired entries, so keys that are never asked
        // for again do not stay resident.
        slots.retain(|_, slot| !slot.is_stale());
        let in_flight = self.start_fetch(key.clone(), fetch());
        slots.insert(key, Slot::Fetching(in_flight.clone()));
        drop(slots);

        in_flight.await
    }

    /// Returns the value for `key` only if a fresh entry exists.
    pub async fn peek(&self, key: &K) -> Option<V> {
        match self.slots.lock().await.get(key) {
            Some(Slot::Ready {
                value,
                fetched_at,
                ttl,
            }) if fetched_at.elapsed() < *ttl => Some(value.clone()),
            _ => None,
        }
    }

    /// Number of slots, ready or in flight. Expired entries count until
    /// the next miss sweeps them.
    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.lock().await.is_empty()
    }

    fn start_fetch<Fut>(&self, key: K, fetch: Fut) -> InFlight<V>
    where
        Fut: Future<Output = Result<(V, Duration), MetadataError>> + Send + 'static,
    {
        let slots = Arc::clone(&self.slots);
        async move {
            let outcome = fetch.await;
            let mut slots = slots.lock().await;
            match outcome {
                Ok((value, ttl)) => {
                    slots.insert(
                        key,
                        Slot::Ready {
                            value: value.clone(),
                            fetched_at: Instant::now(),
                            ttl,
                        },
                    );
                    Ok(value)
                }
                Err(e) => {
                    slots.remove(&key);
                    Err(e)
                }
            }
        }
        .boxed()
        .shared()
    }
}
