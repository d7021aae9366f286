//! One-time tokens mapping a pre-provisioned upstream address to the
//! telephony WebSocket that will later claim it.

use rand::RngCore;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(60);

/// An upstream address waiting for its telephony connection.
#[derive(Debug, Clone)]
pub struct PendingUpstream {
    pub upstream_url: String,
    created_at: Instant,
}

/// Thread-safe token table. Every token can be consumed at most once and
/// entries older than the TTL are treated as absent and swept out.
#[derive(Debug)]
pub struct TokenRegistry {
    entries: Mutex<HashMap<String, PendingUpstream>>,
    ttl: Duration,
}

impl TokenRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, PendingUpstream>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `upstream_url` under a fresh random token and returns the token.
    pub fn issue(&self, upstream_url: String) -> String {
        let mut raw = [0u8; 16];
        rand::rng().fill_bytes(&mut raw);
        let token = hex::encode(raw);
        self.insert(token.clone(), upstream_url);
        token
    }

    /// Stores `upstream_url` under `token`, replacing any previous entry.
    pub fn insert(&self, token: String, upstream_url: String) {
        let mut entries = self.entries();
        Self::sweep(&mut entries, self.ttl);
        entries.insert(
            token,
            PendingUpstream {
                upstream_url,
                created_at: Instant::now(),
            },
        );
    }

    /// Removes and returns the entry for `token` if it exists and has not
    /// expired. A second call with the same token always returns `None`.
    pub fn consume(&self, token: &str) -> Option<PendingUpstream> {
        let mut entries = self.entries();
        let entry = entries.remove(token)?;
        if entry.created_at.elapsed() >= self.ttl {
            debug!(token, "Discarding expired upstream token");
            return None;
        }
        Some(entry)
    }

    /// Drops `token` without using it.
    pub fn evict(&self, token: &str) -> bool {
        self.entries().remove(token).is_some()
    }

    /// Removes every expired entry and returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        Self::sweep(&mut self.entries(), self.ttl)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn sweep(entries: &mut HashMap<String, PendingUpstream>, ttl: Duration) -> usize {
        let before = entries.len();
        entries.retain(|_, entry| entry.created_at.elapsed() < ttl);
        before - entries.len()
    }
}

impl Default for TokenRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_TTL)
    }
}
