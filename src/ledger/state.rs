// Ledger State - the aggregate every transaction mutates
//
// Owned exclusively by the engine. All maps are ordered so the canonical
// encoding does not depend on insertion history. The order books are derived
// indexes: skipped on encode, rebuilt on decode.

use crate::config::{EngineConfig, GenesisConfig};
use crate::error::{EngineFault, LedgerError, TxError};
use crate::escrow::{MarketKey, Order, OrderBook, Trade};
use crate::ledger::account::{Account, AccountLedger, AccountProfile, Asset};
use crate::ledger::entity::{EntityDescriptor, EntityRegistry};
use crate::ledger::transfer::WithdrawalIntent;
use crate::governance::ProposalGovernance;
use crate::model::{checked_add, AccountId, Amount, Currency, EntityId, OrderId, TradeId, WithdrawalId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

/// 32-byte SHA-256 of the canonical encoding
pub type StateDigest = [u8; 32];

/// Result of a successful account creation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountCreated {
    pub granted: Vec<EntityId>,
    pub referrer: Option<AccountId>,
}

/// Statistics about the ledger state
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerStatistics {
    pub accounts: usize,
    pub entities: usize,
    pub open_proposals: usize,
    pub open_orders: usize,
    pub trades: usize,
    pub withdrawals: usize,
}

/// The complete replicated state
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LedgerState {
    /// Height of the last applied batch
    pub(crate) height: u64,
    /// Monotonic counter for order priority and derived ids
    pub(crate) sequence: u64,
    pub(crate) accounts: AccountLedger,
    pub(crate) entities: EntityRegistry,
    pub(crate) governance: ProposalGovernance,
    pub(crate) orders: BTreeMap<OrderId, Order>,
    pub(crate) trades: BTreeMap<TradeId, Trade>,
    /// Bridge source references already credited
    pub(crate) deposits: BTreeSet<String>,
    /// Stablecoin held across all accounts, per currency. Every balance is bounded by it.
    pub(crate) stable_supply: BTreeMap<Currency, Amount>,
    pub(crate) withdrawals: BTreeMap<WithdrawalId, WithdrawalIntent>,
    /// Index: (entity, currency) -> book of open orders
    #[serde(skip)]
    pub(crate) books: BTreeMap<MarketKey, OrderBook>,
}

impl PartialEq for LedgerState {
    fn eq(&self, other: &Self) -> bool {
        // books are derived from orders
        self.height == other.height
            && self.sequence == other.sequence
            && self.accounts == other.accounts
            && self.entities == other.entities
            && self.governance == other.governance
            && self.orders == other.orders
            && self.trades == other.trades
            && self.deposits == other.deposits
            && self.stable_supply == other.stable_supply
            && self.withdrawals == other.withdrawals
    }
}

impl Eq for LedgerState {}

impl LedgerState {
    /// Create an empty state at height 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the height-0 state described by a genesis file
    pub fn from_genesis(genesis: &GenesisConfig) -> Result<Self, LedgerError> {
        let mut state = Self::new();
        for entity in &genesis.entities {
            let descriptor = EntityDescriptor::new(&entity.name, &entity.region, &entity.party);
            let supply = entity.supply.unwrap_or(genesis.engine.launch_supply);
            state.entities.launch(descriptor, supply)?;
        }
        Ok(state)
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn accounts(&self) -> &AccountLedger {
        &self.accounts
    }

    pub fn account(&self, id: &AccountId) -> Option<&Account> {
        self.accounts.get(id)
    }

    pub fn entities(&self) -> &EntityRegistry {
        &self.entities
    }

    pub fn governance(&self) -> &ProposalGovernance {
        &self.governance
    }

    pub fn orders(&self) -> &BTreeMap<OrderId, Order> {
        &self.orders
    }

    pub fn order(&self, id: &OrderId) -> Option<&Order> {
        self.orders.get(id)
    }

    pub fn trades(&self) -> &BTreeMap<TradeId, Trade> {
        &self.trades
    }

    pub fn trade(&self, id: &TradeId) -> Option<&Trade> {
        self.trades.get(id)
    }

    pub fn withdrawals(&self) -> &BTreeMap<WithdrawalId, WithdrawalIntent> {
        &self.withdrawals
    }

    pub fn has_deposit(&self, source_ref: &str) -> bool {
        self.deposits.contains(source_ref)
    }

    pub fn book(&self, entity: &EntityId, currency: &Currency) -> Option<&OrderBook> {
        self.books.get(&(entity.clone(), currency.clone()))
    }

    /// Every book of an entity, one per currency
    pub fn books_of<'a>(&'a self, entity: &'a EntityId) -> impl Iterator<Item = (&'a Currency, &'a OrderBook)> + 'a {
        self.books
            .iter()
            .filter(move |((e, _), _)| e == entity)
            .map(|((_, currency), book)| (currency, book))
    }

    /// Orders still open for an account, in placement order
    pub fn open_orders_of(&self, account: &AccountId) -> Vec<&Order> {
        let mut open: Vec<&Order> = self
            .orders
            .values()
            .filter(|o| o.is_open() && o.owner() == account)
            .collect();
        open.sort_by_key(|o| o.sequence());
        open
    }

    pub fn statistics(&self) -> LedgerStatistics {
        LedgerStatistics {
            accounts: self.accounts.len(),
            entities: self.entities.len(),
            open_proposals: self.governance.len(),
            open_orders: self.orders.values().filter(|o| o.is_open()).count(),
            trades: self.trades.len(),
            withdrawals: self.withdrawals.len(),
        }
    }

    pub(crate) fn set_height(&mut self, height: u64) {
        self.height = height;
    }

    /// Take the next sequence number
    pub(crate) fn next_sequence(&mut self) -> Result<u64, EngineFault> {
        self.sequence = checked_add(self.sequence, 1, "sequence")?;
        Ok(self.sequence)
    }

    // ========================================================================
    // ACCOUNTS AND ALLOTMENTS
    // ========================================================================

    /// Create an account, hand out initial allotments, and credit the referrer
    pub fn create_account(
        &mut self,
        config: &EngineConfig,
        id: AccountId,
        profile: AccountProfile,
        entities: &[EntityId],
    ) -> Result<AccountCreated, TxError> {
        if id.is_empty() {
            return Err(LedgerError::InvalidField("account id is empty".to_string()).into());
        }
        let referrer = profile
            .referrer
            .as_ref()
            .and_then(|name| self.accounts.resolve_referrer(name))
            .filter(|referrer| referrer != &id);

        self.accounts.insert(Account::new(id.clone(), profile))?;

        let granted = self.grant_initial_allotment(config, &id, entities)?;

        if let Some(referrer) = &referrer {
            self.accounts.existing_mut(referrer)?.add_referral_credit()?;
        }

        Ok(AccountCreated { granted, referrer })
    }

    /// Grant one allotment unit per requested entity not granted before.
    ///
    /// Unknown entities and entities without enough remaining supply are
    /// skipped silently; supply is rationed, not an error.
    pub fn grant_initial_allotment(
        &mut self,
        config: &EngineConfig,
        account: &AccountId,
        entities: &[EntityId],
    ) -> Result<Vec<EntityId>, TxError> {
        self.accounts.require(account)?;
        let unit = config.allotment_unit;

        let mut granted = Vec::new();
        for entity in entities {
            let already = self.accounts.require(account)?.has_granted(entity);
            let available = self
                .entities
                .get(entity)
                .map(|token| token.can_distribute(unit))
                .unwrap_or(false);
            if already || !available {
                continue;
            }

            self.entities.distribute(entity, unit)?;
            let holder = self.accounts.existing_mut(account)?;
            holder.credit(&Asset::Token(entity.clone()), unit)?;
            holder.mark_granted(entity);
            granted.push(entity.clone());
        }
        Ok(granted)
    }

    /// Spend one referral credit on one allotment unit of an entity
    pub fn claim_referral_credit(
        &mut self,
        config: &EngineConfig,
        account: &AccountId,
        entity: &EntityId,
    ) -> Result<(), TxError> {
        let unit = config.allotment_unit;
        let holder = self.accounts.require(account)?;
        if holder.referral_credits() == 0 {
            return Err(LedgerError::NoReferralCredits.into());
        }
        if holder.has_granted(entity) {
            return Err(LedgerError::AlreadyGranted(entity.to_string()).into());
        }
        let token = self.entities.require(entity)?;
        if !token.can_distribute(unit) {
            return Err(LedgerError::InsufficientSupply {
                entity: entity.to_string(),
                remaining: token.remaining(),
                required: unit,
            }
            .into());
        }

        self.entities.distribute(entity, unit)?;
        let holder = self.accounts.existing_mut(account)?;
        holder.take_referral_credit()?;
        holder.credit(&Asset::Token(entity.clone()), unit)?;
        holder.mark_granted(entity);
        Ok(())
    }

    // ========================================================================
    // CANONICAL ENCODING
    // ========================================================================

    /// Canonical bytes: postcard over ordered maps, derived indexes excluded
    pub fn to_canonical_bytes(&self) -> Result<Vec<u8>, EngineFault> {
        postcard::to_allocvec(self).map_err(|e| EngineFault::Serialization(e.to_string()))
    }

    /// SHA-256 over the canonical bytes
    pub fn digest(&self) -> Result<StateDigest, EngineFault> {
        Ok(digest_bytes(&self.to_canonical_bytes()?))
    }

    /// Decode canonical bytes and rebuild the order books
    pub fn from_canonical_bytes(bytes: &[u8]) -> Result<Self, EngineFault> {
        let mut state: LedgerState =
            postcard::from_bytes(bytes).map_err(|e| EngineFault::Serialization(e.to_string()))?;
        state.rebuild_indexes();
        Ok(state)
    }

    /// Rebuild the order books from the open orders
    pub(crate) fn rebuild_indexes(&mut self) {
        self.books.clear();
        for order in self.orders.values().filter(|o| o.is_open()) {
            self.books
                .entry(order.market())
                .or_default()
                .insert(order);
        }
    }

    // ========================================================================
    // INVARIANTS
    // ========================================================================

    /// Check token and stablecoin supply, escrow conservation and book consistency
    pub fn check_invariants(&self) -> Result<(), EngineFault> {
        for token in self.entities.iter() {
            token.check_supply()?;
        }

        let mut expected: BTreeMap<(AccountId, Asset), Amount> = BTreeMap::new();
        let mut expected_orders: BTreeMap<AccountId, BTreeSet<OrderId>> = BTreeMap::new();
        for order in self.orders.values().filter(|o| o.is_open()) {
            let slot = expected
                .entry((order.owner().clone(), order.escrow_asset()))
                .or_insert(0);
            *slot = checked_add(*slot, order.open_escrow(), "expected escrow")?;
            expected_orders
                .entry(order.owner().clone())
                .or_default()
                .insert(order.id().clone());

            let in_book = self
                .books
                .get(&order.market())
                .map(|book| book.contains(order))
                .unwrap_or(false);
            if !in_book {
                return Err(EngineFault::Invariant(format!(
                    "open order {} missing from book",
                    order.id()
                )));
            }
        }

        for account in self.accounts.iter() {
            let escrow = account.escrow();
            let assets = escrow
                .frozen_stable()
                .keys()
                .map(|c| Asset::Stable(c.clone()))
                .chain(escrow.frozen_tokens().keys().map(|e| Asset::Token(e.clone())));
            for asset in assets {
                let frozen = account.frozen(&asset);
                if frozen > account.balance(&asset) {
                    return Err(EngineFault::Invariant(format!(
                        "{} has {} {} frozen but holds {}",
                        account.id(),
                        frozen,
                        asset,
                        account.balance(&asset)
                    )));
                }
                let want = expected
                    .remove(&(account.id().clone(), asset.clone()))
                    .unwrap_or(0);
                if frozen != want {
                    return Err(EngineFault::Invariant(format!(
                        "{} has {} {} frozen, open orders reserve {}",
                        account.id(),
                        frozen,
                        asset,
                        want
                    )));
                }
            }

            let listed: BTreeSet<OrderId> = escrow.active_orders().iter().cloned().collect();
            let open = expected_orders.remove(account.id()).unwrap_or_default();
            if listed != open || listed.len() != escrow.active_orders().len() {
                return Err(EngineFault::Invariant(format!(
                    "{} active order list does not match its open orders",
                    account.id()
                )));
            }
        }

        if let Some(((owner, asset), amount)) = expected.into_iter().find(|(_, a)| *a > 0) {
            return Err(EngineFault::Invariant(format!(
                "{} reserves {} {} with nothing frozen",
                owner, amount, asset
            )));
        }
        if let Some((owner, _)) = expected_orders.into_iter().next() {
            return Err(EngineFault::Invariant(format!(
                "open orders owned by unknown account {}",
                owner
            )));
        }

        for (currency, supply) in &self.stable_supply {
            let held = self.stablecoin_supply(currency)?;
            if held != *supply {
                return Err(EngineFault::Invariant(format!(
                    "{} supply is {} but accounts hold {}",
                    currency, supply, held
                )));
            }
        }

        for ((entity, currency), book) in &self.books {
            if book.crossing_pair().is_some() {
                return Err(EngineFault::Invariant(format!(
                    "book for {}/{} left crossed",
                    entity, currency
                )));
            }
        }
        Ok(())
    }
}

/// SHA-256 of arbitrary bytes
pub fn digest_bytes(bytes: &[u8]) -> StateDigest {
    Sha256::digest(bytes).into()
}
