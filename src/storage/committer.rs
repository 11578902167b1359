// State committer - persists each batch result and publishes it to readers
//
// Readers hold an Arc to the last committed snapshot. Publishing swaps the Arc
// under a short write lock, so a query never observes a batch in flight.

use crate::error::EngineFault;
use crate::ledger::{digest_bytes, LedgerState, StateDigest};
use crate::storage::store::{LedgerStore, StoreError};
use std::sync::{Arc, RwLock};
use tracing::info;

impl From<StoreError> for EngineFault {
    fn from(err: StoreError) -> Self {
        EngineFault::Storage(err.to_string())
    }
}

/// An immutable committed state with its digest
#[derive(Debug)]
pub struct CommittedSnapshot {
    pub height: u64,
    pub digest: StateDigest,
    pub state: LedgerState,
}

impl CommittedSnapshot {
    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest)
    }
}

/// Cheap, cloneable handle to the latest committed snapshot
#[derive(Clone, Debug)]
pub struct SnapshotReader {
    latest: Arc<RwLock<Arc<CommittedSnapshot>>>,
}

impl SnapshotReader {
    pub fn latest(&self) -> Arc<CommittedSnapshot> {
        let guard = self.latest.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }
}

/// Persists committed state and publishes it to readers
#[derive(Debug)]
pub struct StateCommitter {
    store: LedgerStore,
    retain: Option<u64>,
    latest: Arc<RwLock<Arc<CommittedSnapshot>>>,
}

impl StateCommitter {
    /// Resume from the newest stored snapshot, verifying its digest, or
    /// persist `genesis` as height 0 when the store is empty
    pub fn open(store: LedgerStore, genesis: LedgerState, retain: Option<u64>) -> Result<Self, EngineFault> {
        let snapshot = match store.load_latest()? {
            Some(stored) => {
                let recomputed = digest_bytes(&stored.bytes);
                if recomputed != stored.digest {
                    return Err(EngineFault::Invariant(format!(
                        "snapshot {} digest mismatch: stored {}, computed {}",
                        stored.height,
                        hex::encode(stored.digest),
                        hex::encode(recomputed)
                    )));
                }
                let state = LedgerState::from_canonical_bytes(&stored.bytes)?;
                if state.height() != stored.height {
                    return Err(EngineFault::Invariant(format!(
                        "snapshot key {} holds state at height {}",
                        stored.height,
                        state.height()
                    )));
                }
                info!(height = stored.height, digest = %hex::encode(stored.digest), "resumed from snapshot");
                CommittedSnapshot {
                    height: stored.height,
                    digest: stored.digest,
                    state,
                }
            }
            None => {
                let bytes = genesis.to_canonical_bytes()?;
                let digest = digest_bytes(&bytes);
                store.save_snapshot(genesis.height(), &bytes, &digest)?;
                info!(height = genesis.height(), digest = %hex::encode(digest), "genesis committed");
                CommittedSnapshot {
                    height: genesis.height(),
                    digest,
                    state: genesis,
                }
            }
        };

        Ok(Self {
            store,
            retain,
            latest: Arc::new(RwLock::new(Arc::new(snapshot))),
        })
    }

    pub fn reader(&self) -> SnapshotReader {
        SnapshotReader {
            latest: Arc::clone(&self.latest),
        }
    }

    pub fn latest(&self) -> Arc<CommittedSnapshot> {
        self.reader().latest()
    }

    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    /// Encode, hash, persist, prune, then publish
    pub fn commit(&self, state: LedgerState) -> Result<Arc<CommittedSnapshot>, EngineFault> {
        let bytes = state.to_canonical_bytes()?;
        let digest = digest_bytes(&bytes);
        let height = state.height();

        self.store.save_snapshot(height, &bytes, &digest)?;
        info!(height, bytes = bytes.len(), digest = %hex::encode(digest), "snapshot persisted");

        if let Some(retain) = self.retain {
            let pruned = self.store.prune(retain)?;
            if pruned > 0 {
                info!(pruned, retain, "old snapshots pruned");
            }
        }

        let snapshot = Arc::new(CommittedSnapshot { height, digest, state });
        let mut guard = self.latest.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::clone(&snapshot);
        Ok(snapshot)
    }
}
