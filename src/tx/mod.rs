// Transaction module - wire format and routing to ledger handlers

mod codec;
mod dispatcher;
mod model;
mod result;

pub use codec::{DecodeError, TxCodec};
pub use dispatcher::{AppliedBatch, Dispatcher};
pub use model::{Transaction, ACTIONS};
pub use result::{TxCode, TxResult};
