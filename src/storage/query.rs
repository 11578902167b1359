// Point queries against the last committed snapshot
//
// Paths:
//   account/<id>         account-exists/<id>    entity/<id>     entities
//   proposal/<id>        proposals              order/<id>      orders/<account>
//   trade/<id>           orderbook/<entity>     prices          withdrawal/<id>
//   status

use crate::error::EngineFault;
use crate::escrow::Side;
use crate::ledger::LedgerState;
use crate::model::{AccountId, EntityId, OrderId, ProposalId, TradeId, WithdrawalId};
use crate::storage::committer::{CommittedSnapshot, SnapshotReader};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryCode {
    Ok = 0,
    NotFound = 1,
    UnknownPath = 2,
}

/// Answer to a point query
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub code: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    pub log: String,
    /// Height of the snapshot that answered
    pub height: u64,
}

impl QueryResponse {
    fn found(value: Value, height: u64) -> Self {
        Self {
            code: QueryCode::Ok as u32,
            value: Some(value),
            log: String::new(),
            height,
        }
    }

    fn not_found(what: &str, height: u64) -> Self {
        Self {
            code: QueryCode::NotFound as u32,
            value: None,
            log: format!("{} not found", what),
            height,
        }
    }

    fn unknown(path: &str, height: u64) -> Self {
        Self {
            code: QueryCode::UnknownPath as u32,
            value: None,
            log: format!("unknown query path: {}", path),
            height,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == QueryCode::Ok as u32
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, EngineFault> {
    serde_json::to_value(value).map_err(|e| EngineFault::Serialization(e.to_string()))
}

/// Read-only query front over committed snapshots
#[derive(Clone, Debug)]
pub struct QueryService {
    reader: SnapshotReader,
}

impl QueryService {
    pub fn new(reader: SnapshotReader) -> Self {
        Self { reader }
    }

    /// Answer a path against the latest committed snapshot
    pub fn query(&self, path: &str) -> Result<QueryResponse, EngineFault> {
        let snapshot = self.reader.latest();
        answer(&snapshot, path)
    }
}

/// Answer a path against a given snapshot
pub fn answer(snapshot: &CommittedSnapshot, path: &str) -> Result<QueryResponse, EngineFault> {
    let state = &snapshot.state;
    let height = snapshot.height;
    let path = path.trim().trim_matches('/');
    let (kind, arg) = match path.split_once('/') {
        Some((kind, arg)) => (kind, Some(arg)),
        None => (path, None),
    };

    let found = |value: Option<Value>, what: &str| match value {
        Some(value) => QueryResponse::found(value, height),
        None => QueryResponse::not_found(what, height),
    };

    let response = match (kind, arg) {
        ("account", Some(id)) => found(
            state.account(&AccountId::from(id)).map(to_json).transpose()?,
            id,
        ),
        ("account-exists", Some(id)) => QueryResponse::found(
            json!({ "exists": state.accounts().contains(&AccountId::from(id)) }),
            height,
        ),
        ("entity", Some(id)) => found(
            state.entities().get(&EntityId::from(id)).map(to_json).transpose()?,
            id,
        ),
        ("entities", None) => {
            let all: Vec<_> = state.entities().iter().collect();
            QueryResponse::found(to_json(&all)?, height)
        }
        ("proposal", Some(id)) => found(
            state.governance().get(&ProposalId::from(id)).map(to_json).transpose()?,
            id,
        ),
        ("proposals", None) => {
            let all: Vec<_> = state.governance().iter().collect();
            QueryResponse::found(to_json(&all)?, height)
        }
        ("order", Some(id)) => found(state.order(&OrderId::from(id)).map(to_json).transpose()?, id),
        ("orders", Some(account)) => {
            let account = AccountId::from(account);
            if state.account(&account).is_none() {
                QueryResponse::not_found(account.as_str(), height)
            } else {
                QueryResponse::found(to_json(&state.open_orders_of(&account))?, height)
            }
        }
        ("trade", Some(id)) => found(state.trade(&TradeId::from(id)).map(to_json).transpose()?, id),
        ("orderbook", Some(entity)) => {
            let entity = EntityId::from(entity);
            if state.entities().get(&entity).is_none() {
                QueryResponse::not_found(entity.as_str(), height)
            } else {
                QueryResponse::found(order_book(state, &entity), height)
            }
        }
        ("prices", None) => QueryResponse::found(prices(state), height),
        ("withdrawal", Some(id)) => found(
            state.withdrawals().get(&WithdrawalId::from(id)).map(to_json).transpose()?,
            id,
        ),
        ("status", None) => {
            let stats = state.statistics();
            QueryResponse::found(
                json!({
                    "height": height,
                    "digest": snapshot.digest_hex(),
                    "accounts": stats.accounts,
                    "entities": stats.entities,
                    "open_proposals": stats.open_proposals,
                    "open_orders": stats.open_orders,
                    "trades": stats.trades,
                    "withdrawals": stats.withdrawals,
                }),
                height,
            )
        }
        _ => QueryResponse::unknown(path, height),
    };
    Ok(response)
}

/// Aggregated depth per settlement currency
fn order_book(state: &LedgerState, entity: &EntityId) -> Value {
    let books: Vec<Value> = state
        .books_of(entity)
        .filter(|(_, book)| !book.is_empty())
        .map(|(currency, book)| {
            json!({
                "currency": currency,
                "bids": book.depth(Side::Buy, |id| state.order(id)),
                "asks": book.depth(Side::Sell, |id| state.order(id)),
            })
        })
        .collect();
    json!({ "entity": entity, "books": books })
}

/// Best bid, best ask and last trade price for every market
fn prices(state: &LedgerState) -> Value {
    let mut markets = Vec::new();
    for token in state.entities().iter() {
        for (currency, book) in state.books_of(token.id()) {
            let last = state
                .trades()
                .values()
                .filter(|t| &t.entity == token.id() && &t.currency == currency)
                .max_by_key(|t| t.sequence)
                .map(|t| t.price);
            markets.push(json!({
                "entity": token.id(),
                "currency": currency,
                "best_bid": book.best_bid().map(|top| top.price),
                "best_ask": book.best_ask().map(|top| top.price),
                "last_price": last,
            }));
        }
    }
    Value::Array(markets)
}
