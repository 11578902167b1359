// Account ledger - balances, escrow reservations and referral credits

use crate::error::{EngineFault, LedgerError};
use crate::model::{checked_add, checked_sub, AccountId, Amount, Currency, EntityId, OrderId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Something an account can hold: a stablecoin or an entity token
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Asset {
    Stable(Currency),
    Token(EntityId),
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asset::Stable(currency) => write!(f, "{}", currency),
            Asset::Token(entity) => write!(f, "token:{}", entity),
        }
    }
}

/// Profile attributes supplied at sign-up. Opaque to the engine.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountProfile {
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub wallet: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub birth_year: u32,
    #[serde(default)]
    pub referrer: Option<AccountId>,
}

/// Funds and tokens reserved against open orders
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowRecord {
    frozen_stable: BTreeMap<Currency, Amount>,
    frozen_tokens: BTreeMap<EntityId, Amount>,
    active_orders: Vec<OrderId>,
}

impl EscrowRecord {
    /// Amount of an asset currently frozen
    pub fn frozen(&self, asset: &Asset) -> Amount {
        match asset {
            Asset::Stable(c) => self.frozen_stable.get(c).copied().unwrap_or(0),
            Asset::Token(e) => self.frozen_tokens.get(e).copied().unwrap_or(0),
        }
    }

    /// Order ids currently backed by this escrow, in placement order
    pub fn active_orders(&self) -> &[OrderId] {
        &self.active_orders
    }

    pub fn frozen_stable(&self) -> &BTreeMap<Currency, Amount> {
        &self.frozen_stable
    }

    pub fn frozen_tokens(&self) -> &BTreeMap<EntityId, Amount> {
        &self.frozen_tokens
    }

    /// Reserve an amount for an order
    pub(crate) fn freeze(&mut self, asset: &Asset, amount: Amount, order: &OrderId) -> Result<(), EngineFault> {
        let next = checked_add(self.frozen(asset), amount, "escrow freeze")?;
        self.set_frozen(asset, next);
        self.active_orders.push(order.clone());
        Ok(())
    }

    /// Consume or release part of a reservation. Never releases more than is frozen.
    pub(crate) fn release(&mut self, asset: &Asset, amount: Amount) -> Result<(), EngineFault> {
        let current = self.frozen(asset);
        if amount > current {
            return Err(EngineFault::Invariant(format!(
                "release of {} {} exceeds frozen {}",
                amount, asset, current
            )));
        }
        self.set_frozen(asset, current - amount);
        Ok(())
    }

    /// Drop an order from the active list once it is filled or cancelled
    pub(crate) fn close_order(&mut self, order: &OrderId) {
        self.active_orders.retain(|id| id != order);
    }

    fn set_frozen(&mut self, asset: &Asset, amount: Amount) {
        match asset {
            Asset::Stable(c) => {
                if amount == 0 {
                    self.frozen_stable.remove(c);
                } else {
                    self.frozen_stable.insert(c.clone(), amount);
                }
            }
            Asset::Token(e) => {
                if amount == 0 {
                    self.frozen_tokens.remove(e);
                } else {
                    self.frozen_tokens.insert(e.clone(), amount);
                }
            }
        }
    }
}

/// A ledger account
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    id: AccountId,
    profile: AccountProfile,
    tokens: BTreeMap<EntityId, Amount>,
    stablecoins: BTreeMap<Currency, Amount>,
    referral_credits: u64,
    granted: BTreeSet<EntityId>,
    escrow: EscrowRecord,
}

impl Account {
    /// Create an empty account
    pub fn new(id: AccountId, profile: AccountProfile) -> Self {
        Self {
            id,
            profile,
            tokens: BTreeMap::new(),
            stablecoins: BTreeMap::new(),
            referral_credits: 0,
            granted: BTreeSet::new(),
            escrow: EscrowRecord::default(),
        }
    }

    pub fn id(&self) -> &AccountId {
        &self.id
    }

    pub fn profile(&self) -> &AccountProfile {
        &self.profile
    }

    pub fn referral_credits(&self) -> u64 {
        self.referral_credits
    }

    pub fn escrow(&self) -> &EscrowRecord {
        &self.escrow
    }

    pub(crate) fn escrow_mut(&mut self) -> &mut EscrowRecord {
        &mut self.escrow
    }

    pub fn token_balances(&self) -> &BTreeMap<EntityId, Amount> {
        &self.tokens
    }

    pub fn stable_balances(&self) -> &BTreeMap<Currency, Amount> {
        &self.stablecoins
    }

    /// Whether the initial allotment for an entity was already handed out
    pub fn has_granted(&self, entity: &EntityId) -> bool {
        self.granted.contains(entity)
    }

    pub(crate) fn mark_granted(&mut self, entity: &EntityId) {
        self.granted.insert(entity.clone());
    }

    /// Total balance of an asset, frozen part included
    pub fn balance(&self, asset: &Asset) -> Amount {
        match asset {
            Asset::Stable(c) => self.stablecoins.get(c).copied().unwrap_or(0),
            Asset::Token(e) => self.tokens.get(e).copied().unwrap_or(0),
        }
    }

    /// Part of the balance reserved for open orders
    pub fn frozen(&self, asset: &Asset) -> Amount {
        self.escrow.frozen(asset)
    }

    /// Spendable balance: total minus frozen
    pub fn available(&self, asset: &Asset) -> Amount {
        self.balance(asset).saturating_sub(self.frozen(asset))
    }

    /// Fail unless `required` is spendable
    pub fn ensure_available(&self, asset: &Asset, required: Amount) -> Result<(), LedgerError> {
        let available = self.available(asset);
        if available < required {
            return Err(LedgerError::InsufficientFunds {
                asset: asset.to_string(),
                available,
                required,
            });
        }
        Ok(())
    }

    pub(crate) fn credit(&mut self, asset: &Asset, amount: Amount) -> Result<(), EngineFault> {
        let next = checked_add(self.balance(asset), amount, "balance credit")?;
        self.set_balance(asset, next);
        Ok(())
    }

    pub(crate) fn debit(&mut self, asset: &Asset, amount: Amount) -> Result<(), EngineFault> {
        let next = checked_sub(self.balance(asset), amount, "balance debit")?;
        self.set_balance(asset, next);
        Ok(())
    }

    pub(crate) fn add_referral_credit(&mut self) -> Result<(), EngineFault> {
        self.referral_credits = checked_add(self.referral_credits, 1, "referral credits")?;
        Ok(())
    }

    pub(crate) fn take_referral_credit(&mut self) -> Result<(), LedgerError> {
        if self.referral_credits == 0 {
            return Err(LedgerError::NoReferralCredits);
        }
        self.referral_credits -= 1;
        Ok(())
    }

    fn set_balance(&mut self, asset: &Asset, amount: Amount) {
        match asset {
            Asset::Stable(c) => {
                if amount == 0 {
                    self.stablecoins.remove(c);
                } else {
                    self.stablecoins.insert(c.clone(), amount);
                }
            }
            Asset::Token(e) => {
                if amount == 0 {
                    self.tokens.remove(e);
                } else {
                    self.tokens.insert(e.clone(), amount);
                }
            }
        }
    }
}

/// Owns every account plus the wallet -> account index
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLedger {
    accounts: BTreeMap<AccountId, Account>,
    wallets: BTreeMap<String, AccountId>,
}

impl AccountLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn contains(&self, id: &AccountId) -> bool {
        self.accounts.contains_key(id)
    }

    pub fn get(&self, id: &AccountId) -> Option<&Account> {
        self.accounts.get(id)
    }

    /// Lookup that reports a missing account as a validation error
    pub fn require(&self, id: &AccountId) -> Result<&Account, LedgerError> {
        self.accounts
            .get(id)
            .ok_or_else(|| LedgerError::AccountNotFound(id.to_string()))
    }

    pub(crate) fn require_mut(&mut self, id: &AccountId) -> Result<&mut Account, LedgerError> {
        self.accounts
            .get_mut(id)
            .ok_or_else(|| LedgerError::AccountNotFound(id.to_string()))
    }

    /// Mutable lookup for an account already validated to exist
    pub(crate) fn existing_mut(&mut self, id: &AccountId) -> Result<&mut Account, EngineFault> {
        self.accounts
            .get_mut(id)
            .ok_or_else(|| EngineFault::Invariant(format!("account {} vanished", id)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    /// Resolve a referrer named either by account id or by wallet
    pub fn resolve_referrer(&self, name: &AccountId) -> Option<AccountId> {
        if self.accounts.contains_key(name) {
            return Some(name.clone());
        }
        self.wallets.get(name.as_str()).cloned()
    }

    /// Insert a new account. Fails if the id or the wallet is taken.
    pub(crate) fn insert(&mut self, account: Account) -> Result<(), LedgerError> {
        if self.accounts.contains_key(account.id()) {
            return Err(LedgerError::AccountExists(account.id().to_string()));
        }
        let wallet = account.profile().wallet.trim().to_string();
        if !wallet.is_empty() {
            if self.wallets.contains_key(&wallet) {
                return Err(LedgerError::InvalidField(format!(
                    "wallet {} is already registered",
                    wallet
                )));
            }
            self.wallets.insert(wallet, account.id().clone());
        }
        self.accounts.insert(account.id().clone(), account);
        Ok(())
    }
}
