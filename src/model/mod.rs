// Model module - identifiers and fixed-point amounts shared by every component

mod amount;
mod ids;

pub use amount::{checked_add, checked_mul, checked_sub, Amount, Price, Quantity};
pub use ids::{AccountId, Currency, EntityId, OrderId, ProposalId, TradeId, WithdrawalId};
