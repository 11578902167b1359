// Matching engine - order placement and cancellation with price-time settlement
//
// Every handler validates before it mutates. Once mutation starts the only
// possible failure is an EngineFault, which abandons the whole batch.

use crate::config::EngineConfig;
use crate::error::{EngineFault, LedgerError, TxError};
use crate::escrow::order::{Order, Side, Trade, TradeStatus};
use crate::ledger::{resolve_currency, Asset, LedgerState};
use crate::model::{checked_mul, AccountId, Amount, Currency, EntityId, OrderId, Price, Quantity, TradeId};
use tracing::debug;

/// What a successful placement produced
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlacedOrder {
    pub order: OrderId,
    pub trades: Vec<TradeId>,
}

/// Parameters of a new limit order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderRequest {
    pub owner: AccountId,
    pub entity: EntityId,
    pub side: Side,
    pub quantity: Quantity,
    pub price: Price,
    pub currency: Option<Currency>,
    /// Client nonce; the order id derives from (owner, nonce)
    pub nonce: u64,
}

impl LedgerState {
    /// Escrow the required asset, insert the order, then match its market
    pub fn place_order(&mut self, config: &EngineConfig, request: OrderRequest) -> Result<PlacedOrder, TxError> {
        let OrderRequest {
            owner,
            entity,
            side,
            quantity,
            price,
            currency,
            nonce,
        } = request;

        if quantity == 0 {
            return Err(LedgerError::InvalidField("quantity must be > 0".to_string()).into());
        }
        if price == 0 {
            return Err(LedgerError::InvalidField("price must be > 0".to_string()).into());
        }
        let currency = resolve_currency(config, currency.as_ref())?;
        let account = self.accounts.require(&owner)?;
        self.entities.require(&entity)?;

        let id = OrderId::derive(&owner, nonce);
        if self.orders.contains_key(&id) {
            return Err(LedgerError::DuplicateOrder(id.to_string()).into());
        }

        let notional = quantity
            .checked_mul(price)
            .ok_or_else(|| LedgerError::AmountOverflow(format!("{} x {}", quantity, price)))?;
        let (asset, required) = match side {
            Side::Buy => (Asset::Stable(currency.clone()), notional),
            Side::Sell => (Asset::Token(entity.clone()), quantity),
        };
        account.ensure_available(&asset, required)?;

        let sequence = self.next_sequence()?;
        let order = Order::new(
            id.clone(),
            owner.clone(),
            entity,
            side,
            currency,
            quantity,
            price,
            required,
            sequence,
        );
        self.accounts
            .existing_mut(&owner)?
            .escrow_mut()
            .freeze(&asset, required, &id)?;
        self.books.entry(order.market()).or_default().insert(&order);
        let market = order.market();
        self.orders.insert(id.clone(), order);

        debug!(order = %id, owner = %owner, ?side, quantity, price, "order placed");

        let trades = self.try_match(&market.0, &market.1)?;
        Ok(PlacedOrder { order: id, trades })
    }

    /// Cancel an open order and release exactly its unconsumed escrow
    pub fn cancel_order(&mut self, owner: &AccountId, id: &OrderId) -> Result<Amount, TxError> {
        let order = self
            .orders
            .get(id)
            .ok_or_else(|| LedgerError::OrderNotFound(id.to_string()))?;
        if order.owner() != owner {
            return Err(LedgerError::NotOrderOwner(id.to_string()).into());
        }
        if !order.is_open() {
            return Err(LedgerError::OrderNotOpen(id.to_string()).into());
        }

        let order = self
            .orders
            .get_mut(id)
            .ok_or_else(|| EngineFault::Invariant(format!("order {} vanished", id)))?;
        let released = order.close_escrow();
        order.cancel();
        let asset = order.escrow_asset();
        let market = order.market();
        let removed = self
            .books
            .get_mut(&market)
            .map(|book| book.remove(order))
            .unwrap_or(false);
        if !removed {
            return Err(EngineFault::Invariant(format!("open order {} was not in its book", id)).into());
        }

        let escrow = self.accounts.existing_mut(owner)?.escrow_mut();
        escrow.release(&asset, released)?;
        escrow.close_order(id);

        debug!(order = %id, released, "order cancelled");

        self.try_match(&market.0, &market.1)?;
        Ok(released)
    }

    /// Match the best bid against the best ask until the book no longer crosses
    pub fn try_match(&mut self, entity: &EntityId, currency: &Currency) -> Result<Vec<TradeId>, EngineFault> {
        let market = (entity.clone(), currency.clone());
        let mut trades = Vec::new();
        loop {
            let Some((bid, ask)) = self.books.get(&market).and_then(|book| book.crossing_pair()) else {
                break;
            };
            trades.push(self.settle(&bid.order, &ask.order)?);
        }
        Ok(trades)
    }

    /// Execute one trade between a crossing bid and ask, atomically
    fn settle(&mut self, buy_id: &OrderId, sell_id: &OrderId) -> Result<TradeId, EngineFault> {
        let buy = self
            .orders
            .get(buy_id)
            .cloned()
            .ok_or_else(|| EngineFault::Invariant(format!("bid {} not in order map", buy_id)))?;
        let sell = self
            .orders
            .get(sell_id)
            .cloned()
            .ok_or_else(|| EngineFault::Invariant(format!("ask {} not in order map", sell_id)))?;
        if buy.side() != Side::Buy || sell.side() != Side::Sell || !buy.is_open() || !sell.is_open() {
            return Err(EngineFault::Invariant(format!(
                "book pairs {} with {}",
                buy_id, sell_id
            )));
        }

        let quantity = buy.remaining().min(sell.remaining());
        // the resting order sets the price
        let price = if buy.sequence() < sell.sequence() {
            buy.price()
        } else {
            sell.price()
        };
        let total = checked_mul(quantity, price, "trade total")?;
        let stable = Asset::Stable(buy.currency().clone());
        let token = Asset::Token(buy.entity().clone());

        let buyer = self.accounts.existing_mut(buy.owner())?;
        buyer.escrow_mut().release(&stable, total)?;
        buyer.debit(&stable, total)?;
        buyer.credit(&token, quantity)?;

        let seller = self.accounts.existing_mut(sell.owner())?;
        seller.escrow_mut().release(&token, quantity)?;
        seller.debit(&token, quantity)?;
        seller.credit(&stable, total)?;

        self.fill(buy_id, quantity, total)?;
        self.fill(sell_id, quantity, quantity)?;

        let sequence = self.next_sequence()?;
        let trade_id = TradeId::derive(buy_id, sell_id, sequence);
        self.trades.insert(
            trade_id.clone(),
            Trade {
                id: trade_id.clone(),
                buy_order: buy_id.clone(),
                sell_order: sell_id.clone(),
                buyer: buy.owner().clone(),
                seller: sell.owner().clone(),
                entity: buy.entity().clone(),
                currency: buy.currency().clone(),
                quantity,
                price,
                total,
                sequence,
                status: TradeStatus::Settled,
            },
        );

        debug!(trade = %trade_id, buy = %buy_id, sell = %sell_id, quantity, price, "trade settled");
        Ok(trade_id)
    }

    /// Book a fill; a completed order leaves the book and returns its residual escrow
    fn fill(&mut self, id: &OrderId, quantity: Quantity, consumed: Amount) -> Result<(), EngineFault> {
        let order = self
            .orders
            .get_mut(id)
            .ok_or_else(|| EngineFault::Invariant(format!("order {} vanished", id)))?;
        if quantity > order.remaining() || consumed > order.open_escrow() {
            return Err(EngineFault::Invariant(format!("overfill of order {}", id)));
        }
        order.apply_fill(quantity, consumed);
        if order.is_open() {
            return Ok(());
        }

        let residual = order.close_escrow();
        let asset = order.escrow_asset();
        let owner = order.owner().clone();
        if let Some(book) = self.books.get_mut(&order.market()) {
            book.remove(order);
        }

        let escrow = self.accounts.existing_mut(&owner)?.escrow_mut();
        escrow.release(&asset, residual)?;
        escrow.close_order(id);
        Ok(())
    }
}
