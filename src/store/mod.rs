/*!
 * TTL-bounded key-value state store.
 *
 * This is the persistence substrate for batch and queue records. Records are
 * version-tagged: writers read a record together with its version and commit
 * through compare-and-swap, so two callers racing on the same key cannot
 * silently lose an update.
 */

use log::debug;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::errors::StoreError;

/// A stored value together with its version tag
#[derive(Debug, Clone)]
pub struct VersionedRecord {
    /// The stored JSON value
    pub value: Value,
    /// Monotonic version, incremented on every successful write
    pub version: u64,
}

/// Key-value substrate with bounded lifetime and compare-and-swap writes
pub trait StateStore: Send + Sync {
    /// Store a value unconditionally, returning the new version
    fn put(&self, key: &str, value: Value, ttl_seconds: u64) -> u64;

    /// Fetch a live record, or `None` if absent or expired
    fn get(&self, key: &str) -> Option<VersionedRecord>;

    /// Replace a record only if its current version matches `expected_version`.
    /// Returns the new version on success.
    fn compare_and_swap(
        &self,
        key: &str,
        expected_version: u64,
        value: Value,
        ttl_seconds: u64,
    ) -> Result<u64, StoreError>;

    /// Remove a record
    fn remove(&self, key: &str);

    /// Keys of live records starting with `prefix`
    fn keys_with_prefix(&self, prefix: &str) -> Vec<String>;
}

#[derive(Debug, Clone)]
struct StoredEntry {
    value: Value,
    version: u64,
    expires_at: Instant,
}

impl StoredEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// In-memory store implementation.
///
/// Expiry is lazy: expired entries are treated as absent on read and dropped
/// on the next write or explicit purge.
pub struct MemoryStore {
    entries: RwLock<HashMap<String, StoredEntry>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of live (unexpired) entries
    pub fn len(&self) -> usize {
        self.entries.read().values().filter(|e| !e.is_expired()).count()
    }

    /// Check whether the store holds no live entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired());
        before - entries.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore for MemoryStore {
    fn put(&self, key: &str, value: Value, ttl_seconds: u64) -> u64 {
        let mut entries = self.entries.write();
        let version = match entries.get(key) {
            Some(existing) if !existing.is_expired() => existing.version + 1,
            _ => 1,
        };

        entries.insert(
            key.to_string(),
            StoredEntry {
                value,
                version,
                expires_at: Instant::now() + Duration::from_secs(ttl_seconds),
            },
        );

        debug!("stored '{}' at version {}", key, version);
        version
    }

    fn get(&self, key: &str) -> Option<VersionedRecord> {
        let entries = self.entries.read();
        entries.get(key).filter(|e| !e.is_expired()).map(|e| VersionedRecord {
            value: e.value.clone(),
            version: e.version,
        })
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected_version: u64,
        value: Value,
        ttl_seconds: u64,
    ) -> Result<u64, StoreError> {
        let mut entries = self.entries.write();

        let current = match entries.get(key) {
            Some(existing) if !existing.is_expired() => existing.version,
            _ => return Err(StoreError::Missing(key.to_string())),
        };

        if current != expected_version {
            return Err(StoreError::VersionConflict {
                key: key.to_string(),
                expected: expected_version,
                found: current,
            });
        }

        let version = current + 1;
        entries.insert(
            key.to_string(),
            StoredEntry {
                value,
                version,
                expires_at: Instant::now() + Duration::from_secs(ttl_seconds),
            },
        );

        debug!("swapped '{}' to version {}", key, version);
        Ok(version)
    }

    fn remove(&self, key: &str) {
        self.entries.write().remove(key);
    }

    fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.entries
            .read()
            .iter()
            .filter(|(key, entry)| key.starts_with(prefix) && !entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect()
    }
}
