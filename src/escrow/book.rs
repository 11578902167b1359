// Per-entity order book with strict price-time priority
//
// Bids rank by (price desc, sequence asc), asks by (price asc, sequence asc).
// The book is an index over open orders; it is not serialized and is rebuilt
// from the order map after a snapshot load.

use crate::escrow::order::{Order, Side};
use crate::model::{Currency, EntityId, OrderId, Price, Quantity};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::BTreeMap;

/// Orders only cross within one entity and one settlement currency
pub type MarketKey = (EntityId, Currency);

/// Head of one side of the book
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookTop {
    pub price: Price,
    pub sequence: u64,
    pub order: OrderId,
}

/// Aggregated quantity at one price
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PriceLevel {
    pub price: Price,
    pub quantity: Quantity,
    pub orders: usize,
}

#[derive(Clone, Debug, Default)]
pub struct OrderBook {
    bids: BTreeMap<(Reverse<Price>, u64), OrderId>,
    asks: BTreeMap<(Price, u64), OrderId>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    pub fn bid_count(&self) -> usize {
        self.bids.len()
    }

    pub fn ask_count(&self) -> usize {
        self.asks.len()
    }

    pub fn insert(&mut self, order: &Order) {
        match order.side() {
            Side::Buy => {
                self.bids
                    .insert((Reverse(order.price()), order.sequence()), order.id().clone());
            }
            Side::Sell => {
                self.asks
                    .insert((order.price(), order.sequence()), order.id().clone());
            }
        }
    }

    /// Remove an order; returns whether it was present
    pub fn remove(&mut self, order: &Order) -> bool {
        match order.side() {
            Side::Buy => self
                .bids
                .remove(&(Reverse(order.price()), order.sequence()))
                .is_some(),
            Side::Sell => self
                .asks
                .remove(&(order.price(), order.sequence()))
                .is_some(),
        }
    }

    /// Whether this exact order rests in the book, by its priority key
    pub fn contains(&self, order: &Order) -> bool {
        let resting = match order.side() {
            Side::Buy => self.bids.get(&(Reverse(order.price()), order.sequence())),
            Side::Sell => self.asks.get(&(order.price(), order.sequence())),
        };
        resting == Some(order.id())
    }

    pub fn best_bid(&self) -> Option<BookTop> {
        self.bids
            .iter()
            .next()
            .map(|((Reverse(price), sequence), order)| BookTop {
                price: *price,
                sequence: *sequence,
                order: order.clone(),
            })
    }

    pub fn best_ask(&self) -> Option<BookTop> {
        self.asks.iter().next().map(|((price, sequence), order)| BookTop {
            price: *price,
            sequence: *sequence,
            order: order.clone(),
        })
    }

    /// Best bid and ask when they cross
    pub fn crossing_pair(&self) -> Option<(BookTop, BookTop)> {
        let bid = self.best_bid()?;
        let ask = self.best_ask()?;
        if bid.price >= ask.price {
            Some((bid, ask))
        } else {
            None
        }
    }

    /// Bid ids in priority order
    pub fn bids(&self) -> impl Iterator<Item = &OrderId> {
        self.bids.values()
    }

    /// Ask ids in priority order
    pub fn asks(&self) -> impl Iterator<Item = &OrderId> {
        self.asks.values()
    }

    /// Aggregate one side into price levels, best first
    pub fn depth<'a>(
        &self,
        side: Side,
        lookup: impl Fn(&OrderId) -> Option<&'a Order>,
    ) -> Vec<PriceLevel> {
        let ids: Vec<&OrderId> = match side {
            Side::Buy => self.bids.values().collect(),
            Side::Sell => self.asks.values().collect(),
        };

        let mut levels: Vec<PriceLevel> = Vec::new();
        for order in ids.into_iter().filter_map(lookup) {
            match levels.last_mut() {
                Some(level) if level.price == order.price() => {
                    level.quantity = level.quantity.saturating_add(order.remaining());
                    level.orders += 1;
                }
                _ => levels.push(PriceLevel {
                    price: order.price(),
                    quantity: order.remaining(),
                    orders: 1,
                }),
            }
        }
        levels
    }
}
