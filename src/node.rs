// Engine - the consensus-facing entry point
//
// apply_batch(height, txs) -> (results, digest). The batch runs on a copy of
// the committed state; the copy replaces it only once persisted, so a fault
// leaves the committed state exactly as it was.

use crate::config::{EngineConfig, GenesisConfig};
use crate::error::EngineFault;
use crate::ledger::{LedgerState, StateDigest, WithdrawalIntent};
use crate::storage::{CommittedSnapshot, LedgerStore, QueryResponse, QueryService, StateCommitter};
use crate::tx::{Dispatcher, TxResult};
use std::sync::Arc;
use tracing::info;

/// Commit value and per-transaction results of one batch
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchOutcome {
    pub height: u64,
    pub results: Vec<TxResult>,
    pub digest: StateDigest,
    /// Withdrawal intents for the bridge
    pub withdrawals: Vec<WithdrawalIntent>,
}

impl BatchOutcome {
    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest)
    }
}

pub struct Engine {
    dispatcher: Dispatcher,
    committer: StateCommitter,
}

impl Engine {
    /// Resume from the store, or start from genesis when it is empty
    pub fn open(genesis: &GenesisConfig, store: LedgerStore) -> Result<Self, EngineFault> {
        let config = genesis.engine.clone();
        config
            .validate()
            .map_err(|e| EngineFault::Config(e.to_string()))?;
        let initial = LedgerState::from_genesis(genesis).map_err(|e| EngineFault::Config(e.to_string()))?;
        let committer = StateCommitter::open(store, initial, config.retain_snapshots)?;
        Ok(Self {
            dispatcher: Dispatcher::new(config),
            committer,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        self.dispatcher.config()
    }

    /// Height of the last committed batch
    pub fn height(&self) -> u64 {
        self.committer.latest().height
    }

    /// Latest committed snapshot
    pub fn committed(&self) -> Arc<CommittedSnapshot> {
        self.committer.latest()
    }

    /// Apply an ordered batch and commit it.
    ///
    /// Heights must strictly increase. On a fault nothing is committed and the
    /// node must stop.
    pub fn apply_batch(&mut self, height: u64, txs: &[Vec<u8>]) -> Result<BatchOutcome, EngineFault> {
        let committed = self.committer.latest();
        if height <= committed.height {
            return Err(EngineFault::Invariant(format!(
                "batch height {} does not follow committed height {}",
                height, committed.height
            )));
        }

        let mut working = committed.state.clone();
        let applied = self.dispatcher.apply_batch(&mut working, height, txs)?;
        let snapshot = self.committer.commit(working)?;

        info!(height, digest = %snapshot.digest_hex(), "batch committed");
        Ok(BatchOutcome {
            height,
            results: applied.results,
            digest: snapshot.digest,
            withdrawals: applied.withdrawals,
        })
    }

    /// Query service bound to this engine's committed snapshots
    pub fn query_service(&self) -> QueryService {
        QueryService::new(self.committer.reader())
    }

    pub fn query(&self, path: &str) -> Result<QueryResponse, EngineFault> {
        self.query_service().query(path)
    }
}
