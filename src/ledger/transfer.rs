// Bridge boundary - verified deposits in, withdrawal intents out
//
// The bridge collaborator verifies deposits on the foreign network and
// executes withdrawals. The ledger only credits, debits and records intents.

use crate::config::EngineConfig;
use crate::error::{EngineFault, LedgerError, TxError};
use crate::ledger::account::Asset;
use crate::ledger::state::LedgerState;
use crate::model::{checked_add, checked_sub, AccountId, Amount, Currency, WithdrawalId};
use serde::{Deserialize, Serialize};

/// Status of a withdrawal as seen by the ledger
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    /// Funds debited, handed to the bridge
    Requested,
}

/// A withdrawal the bridge must execute
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalIntent {
    pub id: WithdrawalId,
    pub account: AccountId,
    pub currency: Currency,
    pub amount: Amount,
    pub destination: String,
    /// Height of the batch that debited the funds
    pub height: u64,
    pub status: WithdrawalStatus,
}

/// Resolve and check a currency against the accepted list
pub fn resolve_currency(config: &EngineConfig, currency: Option<&Currency>) -> Result<Currency, LedgerError> {
    let currency = currency
        .map(Currency::normalized)
        .unwrap_or_else(|| config.default_currency.clone());
    if !config.supports(&currency) {
        return Err(LedgerError::UnsupportedCurrency(currency.to_string()));
    }
    Ok(currency)
}

impl LedgerState {
    /// Credit a deposit the bridge has verified. Each source reference is credited once.
    pub fn deposit_stablecoin(
        &mut self,
        config: &EngineConfig,
        account: &AccountId,
        currency: &Currency,
        amount: Amount,
        source_ref: &str,
    ) -> Result<(), TxError> {
        let currency = resolve_currency(config, Some(currency))?;
        if amount == 0 {
            return Err(LedgerError::InvalidField("deposit amount must be > 0".to_string()).into());
        }
        let source_ref = source_ref.trim();
        if source_ref.is_empty() {
            return Err(LedgerError::InvalidField("deposit source reference is empty".to_string()).into());
        }
        if self.deposits.contains(source_ref) {
            return Err(LedgerError::DuplicateDeposit(source_ref.to_string()).into());
        }
        self.accounts.require(account)?;
        // bounding the total bounds every balance and every settlement credit
        let supply = self
            .stable_supply
            .get(&currency)
            .copied()
            .unwrap_or(0)
            .checked_add(amount)
            .ok_or_else(|| {
                LedgerError::AmountOverflow(format!("deposit of {} {} exceeds total supply", amount, currency))
            })?;

        let asset = Asset::Stable(currency.clone());
        self.accounts.existing_mut(account)?.credit(&asset, amount)?;
        self.stable_supply.insert(currency, supply);
        self.deposits.insert(source_ref.to_string());
        Ok(())
    }

    /// Debit spendable funds and record a withdrawal intent for the bridge
    pub fn withdraw_stablecoin(
        &mut self,
        config: &EngineConfig,
        account: &AccountId,
        currency: &Currency,
        amount: Amount,
        destination: &str,
        nonce: u64,
    ) -> Result<WithdrawalIntent, TxError> {
        let currency = resolve_currency(config, Some(currency))?;
        if amount == 0 {
            return Err(LedgerError::InvalidField("withdrawal amount must be > 0".to_string()).into());
        }
        let destination = destination.trim();
        if destination.is_empty() {
            return Err(LedgerError::InvalidField("withdrawal destination is empty".to_string()).into());
        }
        let id = WithdrawalId::derive(account, nonce);
        if self.withdrawals.contains_key(&id) {
            return Err(LedgerError::DuplicateWithdrawal(id.to_string()).into());
        }
        let asset = Asset::Stable(currency.clone());
        self.accounts.require(account)?.ensure_available(&asset, amount)?;

        self.accounts.existing_mut(account)?.debit(&asset, amount)?;
        let supply = self.stable_supply.get(&currency).copied().unwrap_or(0);
        self.stable_supply
            .insert(currency.clone(), checked_sub(supply, amount, "stablecoin supply")?);
        let intent = WithdrawalIntent {
            id: id.clone(),
            account: account.clone(),
            currency,
            amount,
            destination: destination.to_string(),
            height: self.height,
            status: WithdrawalStatus::Requested,
        };
        self.withdrawals.insert(id, intent.clone());
        Ok(intent)
    }

    /// Total stablecoin held across all accounts, per currency
    pub fn stablecoin_supply(&self, currency: &Currency) -> Result<Amount, EngineFault> {
        let asset = Asset::Stable(currency.clone());
        self.accounts
            .iter()
            .try_fold(0u64, |total, account| {
                checked_add(total, account.balance(&asset), "stablecoin supply")
            })
    }
}
