//! Value-with-expiry cache shared by every derived view
//!
//! Holds one computed value together with the instant it was computed.
//! Readers inside the TTL window get the same `Arc` back; the first reader
//! after expiry recomputes.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
struct Cached<T> {
    value: Arc<T>,
    computed_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct TtlCache<T> {
    ttl: chrono::Duration,
    entry: Option<Cached<T>>,
}

impl<T> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
            entry: None,
        }
    }

    /// Return the cached value if still fresh at `now`, else recompute it
    pub fn get_or_refresh<F>(&mut self, now: DateTime<Utc>, compute: F) -> Arc<T>
    where
        F: FnOnce() -> T,
    {
        if let Some(value) = self.fresh(now) {
            return value;
        }

        let value = Arc::new(compute());
        self.entry = Some(Cached {
            value: Arc::clone(&value),
            computed_at: now,
        });
        value
    }

    /// The cached value, only if it has not expired at `now`
    pub fn fresh(&self, now: DateTime<Utc>) -> Option<Arc<T>> {
        self.entry
            .as_ref()
            .filter(|cached| now.signed_duration_since(cached.computed_at) < self.ttl)
            .map(|cached| Arc::clone(&cached.value))
    }

    /// Last computed value and its timestamp, regardless of expiry
    pub fn last(&self) -> Option<(Arc<T>, DateTime<Utc>)> {
        self.entry
            .as_ref()
            .map(|cached| (Arc::clone(&cached.value), cached.computed_at))
    }

    /// Install a value computed elsewhere (e.g. restored from a snapshot)
    pub fn seed(&mut self, value: T, computed_at: DateTime<Utc>) {
        self.entry = Some(Cached {
            value: Arc::new(value),
            computed_at,
        });
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}
