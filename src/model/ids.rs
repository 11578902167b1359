// Identifiers
//
// Every identifier is derived from data carried by the transaction log.
// Nothing here reads a clock or a random source.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Account identity key (the login identity, e.g. an email)
    AccountId
);
string_id!(
    /// Entity identifier (the admitted candidate's name)
    EntityId
);
string_id!(
    /// Stablecoin ticker, e.g. USDT
    Currency
);
string_id!(OrderId);
string_id!(TradeId);
string_id!(ProposalId);
string_id!(WithdrawalId);

/// Hash labelled parts into a 128-bit hex id
fn derive(label: &str, parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(label.as_bytes());
    hasher.update(b":");
    for part in parts {
        hasher.update((part.len() as u32).to_le_bytes());
        hasher.update(part);
    }
    let digest = hasher.finalize();
    format!("{}-{}", label, hex::encode(&digest[..16]))
}

impl OrderId {
    /// Order id from the owner and the client nonce on the transaction
    pub fn derive(owner: &AccountId, nonce: u64) -> Self {
        Self(derive("order", &[owner.as_str().as_bytes(), &nonce.to_le_bytes()]))
    }
}

impl WithdrawalId {
    /// Withdrawal id from the account and the client nonce on the transaction
    pub fn derive(account: &AccountId, nonce: u64) -> Self {
        Self(derive(
            "withdrawal",
            &[account.as_str().as_bytes(), &nonce.to_le_bytes()],
        ))
    }
}

impl ProposalId {
    /// Proposal id from the proposer and the engine sequence
    pub fn derive(proposer: &AccountId, sequence: u64) -> Self {
        Self(derive(
            "proposal",
            &[proposer.as_str().as_bytes(), &sequence.to_le_bytes()],
        ))
    }
}

impl TradeId {
    /// Trade id from both orders and the engine sequence
    pub fn derive(buy: &OrderId, sell: &OrderId, sequence: u64) -> Self {
        Self(derive(
            "trade",
            &[
                buy.as_str().as_bytes(),
                sell.as_str().as_bytes(),
                &sequence.to_le_bytes(),
            ],
        ))
    }
}

impl Currency {
    /// Tickers are compared case-insensitively on input
    pub fn normalized(&self) -> Self {
        Self(self.0.trim().to_ascii_uppercase())
    }
}
