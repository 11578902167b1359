// Transaction wire model
//
// Transactions are JSON records tagged by an `action` field.

use crate::escrow::Side;
use crate::ledger::AccountProfile;
use crate::model::{AccountId, Amount, Currency, EntityId, OrderId, Price, ProposalId, Quantity};
use serde::{Deserialize, Serialize};

/// Every action the dispatcher routes
pub const ACTIONS: [&str; 8] = [
    "create_account",
    "claim_referral_reward",
    "propose_entity",
    "vote_on_proposal",
    "place_order",
    "cancel_order",
    "deposit_stablecoin",
    "withdraw_stablecoin",
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Transaction {
    CreateAccount {
        account: AccountId,
        #[serde(default)]
        profile: AccountProfile,
        /// Entities to request an initial allotment of
        #[serde(default)]
        entities: Vec<EntityId>,
    },
    ClaimReferralReward {
        account: AccountId,
        entity: EntityId,
    },
    ProposeEntity {
        proposer: AccountId,
        name: String,
        #[serde(default)]
        region: String,
        #[serde(default)]
        party: String,
    },
    VoteOnProposal {
        proposal: ProposalId,
        voter: AccountId,
        choice: bool,
    },
    PlaceOrder {
        owner: AccountId,
        entity: EntityId,
        side: Side,
        quantity: Quantity,
        price: Price,
        #[serde(default)]
        currency: Option<Currency>,
        nonce: u64,
    },
    CancelOrder {
        owner: AccountId,
        order: OrderId,
    },
    DepositStablecoin {
        account: AccountId,
        currency: Currency,
        amount: Amount,
        source_ref: String,
    },
    WithdrawStablecoin {
        account: AccountId,
        currency: Currency,
        amount: Amount,
        destination: String,
        nonce: u64,
    },
}

impl Transaction {
    /// The wire discriminant
    pub fn action(&self) -> &'static str {
        match self {
            Transaction::CreateAccount { .. } => ACTIONS[0],
            Transaction::ClaimReferralReward { .. } => ACTIONS[1],
            Transaction::ProposeEntity { .. } => ACTIONS[2],
            Transaction::VoteOnProposal { .. } => ACTIONS[3],
            Transaction::PlaceOrder { .. } => ACTIONS[4],
            Transaction::CancelOrder { .. } => ACTIONS[5],
            Transaction::DepositStablecoin { .. } => ACTIONS[6],
            Transaction::WithdrawStablecoin { .. } => ACTIONS[7],
        }
    }
}
