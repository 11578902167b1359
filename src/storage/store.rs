// LedgerStore - height-keyed snapshots in sled
//
// Layout:
// - snapshot:<height> -> canonical state bytes
// - digest:<height>   -> 32-byte digest of those bytes
// - meta:latest_height -> big-endian u64
//
// Heights are zero-padded to 20 digits so lexicographic key order is numeric order.

use crate::ledger::StateDigest;
use std::path::Path;
use thiserror::Error;

/// Key prefixes for organizing data
mod keys {
    pub const SNAPSHOT_PREFIX: &str = "snapshot:";
    pub const DIGEST_PREFIX: &str = "digest:";
    pub const LATEST_HEIGHT: &[u8] = b"meta:latest_height";

    pub fn snapshot(height: u64) -> String {
        format!("{}{:020}", SNAPSHOT_PREFIX, height)
    }

    pub fn digest(height: u64) -> String {
        format!("{}{:020}", DIGEST_PREFIX, height)
    }
}

/// Errors from storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to open database: {0}")]
    OpenFailed(String),

    #[error("Database operation failed: {0}")]
    DatabaseError(String),

    #[error("Corrupt record {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Flush failed: {0}")]
    FlushFailed(String),
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::DatabaseError(err.to_string())
    }
}

/// Statistics about the storage
#[derive(Clone, Debug)]
pub struct StorageStats {
    /// Number of keys in the database
    pub key_count: usize,
    /// Number of stored snapshots
    pub snapshots: usize,
    /// Approximate disk size in bytes
    pub disk_size_bytes: u64,
}

/// One persisted snapshot
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredSnapshot {
    pub height: u64,
    pub bytes: Vec<u8>,
    pub digest: StateDigest,
}

/// Persistent snapshot store
///
/// Uses sled for crash-safe, embedded storage.
/// A snapshot, its digest and the latest-height marker are written in one batch.
#[derive(Debug)]
pub struct LedgerStore {
    db: sled::Db,
}

impl LedgerStore {
    /// Open or create a store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path).map_err(|e| StoreError::OpenFailed(e.to_string()))?;
        Ok(Self { db })
    }

    /// Open a throwaway in-memory store
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| StoreError::OpenFailed(e.to_string()))?;
        Ok(Self { db })
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db
            .flush()
            .map_err(|e| StoreError::FlushFailed(e.to_string()))?;
        Ok(())
    }

    /// Get storage statistics
    pub fn stats(&self) -> Result<StorageStats, StoreError> {
        Ok(StorageStats {
            key_count: self.db.len(),
            snapshots: self.heights()?.len(),
            disk_size_bytes: self.db.size_on_disk().unwrap_or(0),
        })
    }

    // ========================================================================
    // SNAPSHOTS
    // ========================================================================

    /// Persist a snapshot and advance the latest-height marker, atomically
    pub fn save_snapshot(&self, height: u64, bytes: &[u8], digest: &StateDigest) -> Result<(), StoreError> {
        let mut batch = sled::Batch::default();
        batch.insert(keys::snapshot(height).as_bytes(), bytes);
        batch.insert(keys::digest(height).as_bytes(), &digest[..]);
        batch.insert(keys::LATEST_HEIGHT, &height.to_be_bytes()[..]);
        self.db.apply_batch(batch)?;
        self.flush()
    }

    /// Height of the last committed snapshot
    pub fn latest_height(&self) -> Result<Option<u64>, StoreError> {
        match self.db.get(keys::LATEST_HEIGHT)? {
            Some(raw) => {
                let arr = <[u8; 8]>::try_from(&raw[..]).map_err(|_| StoreError::Corrupt {
                    key: "meta:latest_height".to_string(),
                    reason: format!("expected 8 bytes, found {}", raw.len()),
                })?;
                Ok(Some(u64::from_be_bytes(arr)))
            }
            None => Ok(None),
        }
    }

    /// Load the snapshot stored at a height
    pub fn load_snapshot(&self, height: u64) -> Result<Option<StoredSnapshot>, StoreError> {
        let Some(bytes) = self.db.get(keys::snapshot(height))? else {
            return Ok(None);
        };
        let key = keys::digest(height);
        let raw = self.db.get(&key)?.ok_or_else(|| StoreError::Corrupt {
            key: key.clone(),
            reason: "missing digest".to_string(),
        })?;
        let digest = StateDigest::try_from(&raw[..]).map_err(|_| StoreError::Corrupt {
            key,
            reason: format!("expected 32 bytes, found {}", raw.len()),
        })?;
        Ok(Some(StoredSnapshot {
            height,
            bytes: bytes.to_vec(),
            digest,
        }))
    }

    /// Load the most recent snapshot
    pub fn load_latest(&self) -> Result<Option<StoredSnapshot>, StoreError> {
        match self.latest_height()? {
            Some(height) => {
                let snapshot = self.load_snapshot(height)?;
                if snapshot.is_none() {
                    return Err(StoreError::Corrupt {
                        key: keys::snapshot(height),
                        reason: "latest height points at a missing snapshot".to_string(),
                    });
                }
                Ok(snapshot)
            }
            None => Ok(None),
        }
    }

    /// Stored digest at a height
    pub fn digest_at(&self, height: u64) -> Result<Option<StateDigest>, StoreError> {
        Ok(self.load_snapshot(height)?.map(|s| s.digest))
    }

    /// Every stored snapshot height, ascending
    pub fn heights(&self) -> Result<Vec<u64>, StoreError> {
        let mut heights = Vec::new();
        for result in self.db.scan_prefix(keys::SNAPSHOT_PREFIX) {
            let (key, _) = result?;
            let text = String::from_utf8_lossy(&key);
            let height = text[keys::SNAPSHOT_PREFIX.len()..]
                .parse::<u64>()
                .map_err(|e| StoreError::Corrupt {
                    key: text.to_string(),
                    reason: e.to_string(),
                })?;
            heights.push(height);
        }
        Ok(heights)
    }

    /// Keep only the newest `retain` snapshots; returns how many were removed
    pub fn prune(&self, retain: u64) -> Result<usize, StoreError> {
        let heights = self.heights()?;
        let keep = usize::try_from(retain).unwrap_or(usize::MAX);
        let excess = heights.len().saturating_sub(keep);

        let mut batch = sled::Batch::default();
        for height in &heights[..excess] {
            batch.remove(keys::snapshot(*height).as_bytes());
            batch.remove(keys::digest(*height).as_bytes());
        }
        self.db.apply_batch(batch)?;
        if excess > 0 {
            self.flush()?;
        }
        Ok(excess)
    }
}
