// Storage module - PERSISTENCE
// Snapshots in sled, commit and publication, read-only queries

mod committer;
mod query;
mod store;

pub use committer::{CommittedSnapshot, SnapshotReader, StateCommitter};
pub use query::{answer, QueryCode, QueryResponse, QueryService};
pub use store::{LedgerStore, StorageStats, StoreError, StoredSnapshot};
