// Per-transaction results
//
// Codes are part of the wire contract and never renumbered.

use crate::error::LedgerError;
use crate::tx::codec::DecodeError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TxCode {
    Ok = 0,
    Malformed = 1,
    AccountExists = 2,
    AccountNotFound = 3,
    EntityNotFound = 4,
    EntityExists = 5,
    ProposalAlreadyOpen = 6,
    ProposalNotFound = 7,
    DuplicateVote = 8,
    InvalidField = 9,
    UnknownAction = 10,
    NoReferralCredits = 11,
    AlreadyGranted = 12,
    InsufficientSupply = 13,
    InsufficientFunds = 14,
    UnsupportedCurrency = 15,
    OrderNotFound = 16,
    NotOrderOwner = 17,
    OrderNotOpen = 18,
    DuplicateOrder = 19,
    DuplicateDeposit = 20,
    DuplicateWithdrawal = 21,
    AmountOverflow = 22,
}

impl TxCode {
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn is_ok(self) -> bool {
        self == TxCode::Ok
    }
}

impl fmt::Display for TxCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.as_u32())
    }
}

impl From<&LedgerError> for TxCode {
    fn from(error: &LedgerError) -> Self {
        match error {
            LedgerError::AccountExists(_) => TxCode::AccountExists,
            LedgerError::AccountNotFound(_) => TxCode::AccountNotFound,
            LedgerError::EntityNotFound(_) => TxCode::EntityNotFound,
            LedgerError::EntityExists(_) => TxCode::EntityExists,
            LedgerError::ProposalAlreadyOpen(_) => TxCode::ProposalAlreadyOpen,
            LedgerError::ProposalNotFound(_) => TxCode::ProposalNotFound,
            LedgerError::DuplicateVote { .. } => TxCode::DuplicateVote,
            LedgerError::InvalidField(_) => TxCode::InvalidField,
            LedgerError::NoReferralCredits => TxCode::NoReferralCredits,
            LedgerError::AlreadyGranted(_) => TxCode::AlreadyGranted,
            LedgerError::InsufficientSupply { .. } => TxCode::InsufficientSupply,
            LedgerError::InsufficientFunds { .. } => TxCode::InsufficientFunds,
            LedgerError::UnsupportedCurrency(_) => TxCode::UnsupportedCurrency,
            LedgerError::OrderNotFound(_) => TxCode::OrderNotFound,
            LedgerError::NotOrderOwner(_) => TxCode::NotOrderOwner,
            LedgerError::OrderNotOpen(_) => TxCode::OrderNotOpen,
            LedgerError::DuplicateOrder(_) => TxCode::DuplicateOrder,
            LedgerError::DuplicateDeposit(_) => TxCode::DuplicateDeposit,
            LedgerError::DuplicateWithdrawal(_) => TxCode::DuplicateWithdrawal,
            LedgerError::AmountOverflow(_) => TxCode::AmountOverflow,
        }
    }
}

impl From<&DecodeError> for TxCode {
    fn from(error: &DecodeError) -> Self {
        match error {
            DecodeError::Malformed(_) => TxCode::Malformed,
            DecodeError::UnknownAction(_) => TxCode::UnknownAction,
        }
    }
}

/// Outcome of one transaction: a code, a log line, and the id of whatever it created
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxResult {
    pub code: u32,
    pub log: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl TxResult {
    pub fn ok(log: impl Into<String>, data: Option<String>) -> Self {
        Self {
            code: TxCode::Ok.as_u32(),
            log: log.into(),
            data,
        }
    }

    pub fn rejected(error: &LedgerError) -> Self {
        Self {
            code: TxCode::from(error).as_u32(),
            log: error.to_string(),
            data: None,
        }
    }

    pub fn undecodable(error: &DecodeError) -> Self {
        Self {
            code: TxCode::from(error).as_u32(),
            log: error.to_string(),
            data: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == TxCode::Ok.as_u32()
    }
}
