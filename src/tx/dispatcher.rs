// Transaction dispatcher - decode, route to exactly one handler, collect results
//
// A rejected transaction leaves the state untouched and the batch continues.
// Only an EngineFault escapes, and it abandons the batch.

use crate::config::EngineConfig;
use crate::error::{EngineFault, TxError};
use crate::escrow::OrderRequest;
use crate::governance::VoteOutcome;
use crate::ledger::{EntityDescriptor, LedgerState, WithdrawalIntent};
use crate::tx::codec::TxCodec;
use crate::tx::model::Transaction;
use crate::tx::result::TxResult;
use tracing::{debug, error, info};

/// What a batch did to the working state
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppliedBatch {
    pub height: u64,
    pub results: Vec<TxResult>,
    /// Withdrawal intents created by this batch, for the bridge
    pub withdrawals: Vec<WithdrawalIntent>,
}

/// Success of a handler: a log line and the id it created, if any
struct Executed {
    log: String,
    data: Option<String>,
}

impl Executed {
    fn new(log: impl Into<String>, data: Option<String>) -> Self {
        Self {
            log: log.into(),
            data,
        }
    }
}

/// Routes decoded transactions to the ledger handlers
#[derive(Clone, Debug)]
pub struct Dispatcher {
    config: EngineConfig,
}

impl Dispatcher {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Apply an ordered batch at `height`.
    ///
    /// Mutates `state` in place; on a fault the caller must discard it.
    pub fn apply_batch(
        &self,
        state: &mut LedgerState,
        height: u64,
        txs: &[Vec<u8>],
    ) -> Result<AppliedBatch, EngineFault> {
        state.set_height(height);

        let mut results = Vec::with_capacity(txs.len());
        for (index, raw) in txs.iter().enumerate() {
            results.push(self.apply(state, raw, index)?);
        }

        if self.config.verify_invariants {
            state.check_invariants()?;
        }

        let withdrawals: Vec<WithdrawalIntent> = state
            .withdrawals()
            .values()
            .filter(|w| w.height == height)
            .cloned()
            .collect();
        let accepted = results.iter().filter(|r| r.is_ok()).count();
        info!(height, txs = txs.len(), accepted, withdrawals = withdrawals.len(), "batch applied");

        Ok(AppliedBatch {
            height,
            results,
            withdrawals,
        })
    }

    /// Apply one raw transaction. `index` is its position in the batch.
    pub fn apply(&self, state: &mut LedgerState, raw: &[u8], index: usize) -> Result<TxResult, EngineFault> {
        let tx = match TxCodec::decode(raw) {
            Ok(tx) => tx,
            Err(e) => {
                debug!(index, error = %e, "transaction not decoded");
                return Ok(TxResult::undecodable(&e));
            }
        };
        let action = tx.action();

        let result = match self.execute(state, tx) {
            Ok(done) => TxResult::ok(done.log, done.data),
            Err(TxError::Rejected(e)) => TxResult::rejected(&e),
            Err(TxError::Fatal(fault)) => {
                error!(index, action, error = %fault, "engine fault");
                return Err(fault);
            }
        };
        debug!(index, action, code = result.code, "transaction applied");
        Ok(result)
    }

    fn execute(&self, state: &mut LedgerState, tx: Transaction) -> Result<Executed, TxError> {
        let config = &self.config;
        match tx {
            Transaction::CreateAccount {
                account,
                profile,
                entities,
            } => {
                let created = state.create_account(config, account.clone(), profile, &entities)?;
                let referral = created
                    .referrer
                    .map(|r| format!(", referred by {}", r))
                    .unwrap_or_default();
                Ok(Executed::new(
                    format!(
                        "account {} created with {} allotments{}",
                        account,
                        created.granted.len(),
                        referral
                    ),
                    Some(account.to_string()),
                ))
            }

            Transaction::ClaimReferralReward { account, entity } => {
                state.claim_referral_credit(config, &account, &entity)?;
                Ok(Executed::new(
                    format!("{} claimed {} {}", account, config.allotment_unit, entity),
                    Some(entity.to_string()),
                ))
            }

            Transaction::ProposeEntity {
                proposer,
                name,
                region,
                party,
            } => {
                let id = state.propose_entity(&proposer, EntityDescriptor::new(&name, &region, &party))?;
                Ok(Executed::new(
                    format!("proposal {} opened for {}", id, name.trim()),
                    Some(id.to_string()),
                ))
            }

            Transaction::VoteOnProposal {
                proposal,
                voter,
                choice,
            } => match state.vote_on_proposal(config, &proposal, &voter, choice)? {
                VoteOutcome::Recorded { yes, no } => Ok(Executed::new(
                    format!("vote recorded on {}: {} yes, {} no", proposal, yes, no),
                    None,
                )),
                VoteOutcome::Approved(descriptor) => Ok(Executed::new(
                    format!("proposal {} approved, {} launched", proposal, descriptor.name),
                    Some(descriptor.id().to_string()),
                )),
            },

            Transaction::PlaceOrder {
                owner,
                entity,
                side,
                quantity,
                price,
                currency,
                nonce,
            } => {
                let placed = state.place_order(
                    config,
                    OrderRequest {
                        owner,
                        entity,
                        side,
                        quantity,
                        price,
                        currency,
                        nonce,
                    },
                )?;
                Ok(Executed::new(
                    format!("order {} placed, {} trades", placed.order, placed.trades.len()),
                    Some(placed.order.to_string()),
                ))
            }

            Transaction::CancelOrder { owner, order } => {
                let released = state.cancel_order(&owner, &order)?;
                Ok(Executed::new(
                    format!("order {} cancelled, {} released", order, released),
                    Some(order.to_string()),
                ))
            }

            Transaction::DepositStablecoin {
                account,
                currency,
                amount,
                source_ref,
            } => {
                state.deposit_stablecoin(config, &account, &currency, amount, &source_ref)?;
                Ok(Executed::new(
                    format!("deposited {} {} to {}", amount, currency.normalized(), account),
                    None,
                ))
            }

            Transaction::WithdrawStablecoin {
                account,
                currency,
                amount,
                destination,
                nonce,
            } => {
                let intent =
                    state.withdraw_stablecoin(config, &account, &currency, amount, &destination, nonce)?;
                Ok(Executed::new(
                    format!("withdrawal {} of {} {} requested", intent.id, intent.amount, intent.currency),
                    Some(intent.id.to_string()),
                ))
            }
        }
    }
}
