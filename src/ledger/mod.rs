// Ledger module - accounts, entity supply and the aggregate state
// Handles balances and referral credits along with bridge transfers

mod account;
mod entity;
mod state;
mod transfer;

pub use account::{Account, AccountLedger, AccountProfile, Asset, EscrowRecord};
pub use entity::{EntityDescriptor, EntityRegistry, EntityToken};
pub use state::{digest_bytes, AccountCreated, LedgerState, LedgerStatistics, StateDigest};
pub use transfer::{resolve_currency, WithdrawalIntent, WithdrawalStatus};
