// Orders and trades

use crate::escrow::book::MarketKey;
use crate::ledger::Asset;
use crate::model::{AccountId, Amount, Currency, EntityId, OrderId, Price, Quantity, TradeId};
use serde::{Deserialize, Serialize};

/// Order side
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

/// Order lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Active,
    Partial,
    Filled,
    Cancelled,
}

impl OrderStatus {
    /// Active and partial orders sit in the book and hold escrow
    pub fn is_open(self) -> bool {
        matches!(self, OrderStatus::Active | OrderStatus::Partial)
    }
}

/// A limit order backed by escrow
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    owner: AccountId,
    entity: EntityId,
    side: Side,
    currency: Currency,
    quantity: Quantity,
    price: Price,
    filled: Quantity,
    status: OrderStatus,
    /// Reserved at placement: qty * price for a buy, qty tokens for a sell
    escrow_amount: Amount,
    /// Part of the reservation already spent by fills
    escrow_consumed: Amount,
    /// Placement sequence, the time half of price-time priority
    sequence: u64,
}

impl Order {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: OrderId,
        owner: AccountId,
        entity: EntityId,
        side: Side,
        currency: Currency,
        quantity: Quantity,
        price: Price,
        escrow_amount: Amount,
        sequence: u64,
    ) -> Self {
        Self {
            id,
            owner,
            entity,
            side,
            currency,
            quantity,
            price,
            filled: 0,
            status: OrderStatus::Active,
            escrow_amount,
            escrow_consumed: 0,
            sequence,
        }
    }

    pub fn id(&self) -> &OrderId {
        &self.id
    }

    pub fn owner(&self) -> &AccountId {
        &self.owner
    }

    pub fn entity(&self) -> &EntityId {
        &self.entity
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    pub fn price(&self) -> Price {
        self.price
    }

    pub fn filled(&self) -> Quantity {
        self.filled
    }

    pub fn remaining(&self) -> Quantity {
        self.quantity - self.filled
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn escrow_amount(&self) -> Amount {
        self.escrow_amount
    }

    pub fn escrow_consumed(&self) -> Amount {
        self.escrow_consumed
    }

    /// Reservation still held for this order
    pub fn open_escrow(&self) -> Amount {
        self.escrow_amount - self.escrow_consumed
    }

    /// The (entity, currency) market this order trades in
    pub fn market(&self) -> MarketKey {
        (self.entity.clone(), self.currency.clone())
    }

    /// The asset this order reserves
    pub fn escrow_asset(&self) -> Asset {
        match self.side {
            Side::Buy => Asset::Stable(self.currency.clone()),
            Side::Sell => Asset::Token(self.entity.clone()),
        }
    }

    /// Book a fill. `consumed` is the escrow spent by it.
    pub(crate) fn apply_fill(&mut self, quantity: Quantity, consumed: Amount) {
        self.filled += quantity;
        self.escrow_consumed += consumed;
        self.status = if self.filled == self.quantity {
            OrderStatus::Filled
        } else {
            OrderStatus::Partial
        };
    }

    /// Release whatever escrow is left; returns the released amount
    pub(crate) fn close_escrow(&mut self) -> Amount {
        let residual = self.open_escrow();
        self.escrow_consumed = self.escrow_amount;
        residual
    }

    pub(crate) fn cancel(&mut self) {
        self.status = OrderStatus::Cancelled;
    }
}

/// Trade settlement status. Settlement is atomic, so every recorded trade is settled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    Settled,
}

/// An executed match between a buy and a sell order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub buy_order: OrderId,
    pub sell_order: OrderId,
    pub buyer: AccountId,
    pub seller: AccountId,
    pub entity: EntityId,
    pub currency: Currency,
    pub quantity: Quantity,
    pub price: Price,
    pub total: Amount,
    pub sequence: u64,
    pub status: TradeStatus,
}
