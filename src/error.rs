// Error tiers for transaction execution
//
// - LedgerError: validation failures, reported per transaction, state untouched
// - EngineFault: invariant, arithmetic, or persistence failures that stop the node
// - TxError: what a handler returns, so `?` works for both

use thiserror::Error;

/// Validation failures. Ordinary and expected; never abort a batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("account already exists: {0}")]
    AccountExists(String),

    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error("entity not found: {0}")]
    EntityNotFound(String),

    #[error("entity already exists: {0}")]
    EntityExists(String),

    #[error("a proposal for {0} is already open")]
    ProposalAlreadyOpen(String),

    #[error("proposal not found: {0}")]
    ProposalNotFound(String),

    #[error("{voter} has already voted on proposal {proposal}")]
    DuplicateVote { proposal: String, voter: String },

    #[error("invalid field: {0}")]
    InvalidField(String),

    #[error("no referral credits to claim")]
    NoReferralCredits,

    #[error("allotment for {0} already granted")]
    AlreadyGranted(String),

    #[error("insufficient supply for {entity}: remaining {remaining}, required {required}")]
    InsufficientSupply {
        entity: String,
        remaining: u64,
        required: u64,
    },

    #[error("insufficient {asset}: available {available}, required {required}")]
    InsufficientFunds {
        asset: String,
        available: u64,
        required: u64,
    },

    #[error("unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("order not found: {0}")]
    OrderNotFound(String),

    #[error("order {0} is not owned by the caller")]
    NotOrderOwner(String),

    #[error("order {0} is no longer open")]
    OrderNotOpen(String),

    #[error("duplicate order: {0}")]
    DuplicateOrder(String),

    #[error("deposit already credited: {0}")]
    DuplicateDeposit(String),

    #[error("duplicate withdrawal: {0}")]
    DuplicateWithdrawal(String),

    #[error("amount overflow: {0}")]
    AmountOverflow(String),
}

/// Failures that mean replicas could silently diverge. The batch is abandoned
/// and the node must stop.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineFault {
    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),

    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("storage failure: {0}")]
    Storage(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Outcome of a failed handler
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TxError {
    #[error(transparent)]
    Rejected(#[from] LedgerError),

    #[error(transparent)]
    Fatal(#[from] EngineFault),
}
