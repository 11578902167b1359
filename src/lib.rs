// Politoken - deterministic ledger and escrow-backed order book
//
// A batch of transactions in, per-transaction results and a state digest out.
// Every replica that applies the same batches reaches byte-identical state.

pub mod config;
pub mod error;
pub mod escrow;
pub mod gateway;
pub mod governance;
pub mod ledger;
pub mod model;
pub mod node;
pub mod storage;
pub mod tx;

pub use config::{ConfigError, EngineConfig, GenesisConfig};
pub use error::{EngineFault, LedgerError, TxError};
pub use ledger::{LedgerState, StateDigest};
pub use node::{BatchOutcome, Engine};
pub use tx::{Dispatcher, Transaction, TxCode, TxResult};
