// Escrow-backed order book
//
// Orders reserve funds at placement, match under strict price-time priority,
// and settle atomically against the account ledger.

mod book;
mod matching;
mod order;

pub use book::{BookTop, MarketKey, OrderBook, PriceLevel};
pub use matching::{OrderRequest, PlacedOrder};
pub use order::{Order, OrderStatus, Side, Trade, TradeStatus};
