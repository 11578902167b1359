use crate::tx::model::{Transaction, ACTIONS};
use serde::Deserialize;
use thiserror::Error;

/// Why a payload never reached a handler
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed transaction: {0}")]
    Malformed(String),

    #[error("unknown action: {0}")]
    UnknownAction(String),
}

/// Just the discriminant, read before the full decode
#[derive(Deserialize)]
struct Envelope {
    action: String,
}

/// Codec for transaction payloads (JSON)
pub struct TxCodec;

impl TxCodec {
    /// Encode a transaction to its wire bytes
    pub fn encode(tx: &Transaction) -> Result<Vec<u8>, DecodeError> {
        serde_json::to_vec(tx).map_err(|e| DecodeError::Malformed(e.to_string()))
    }

    /// Decode wire bytes. An unrecognised discriminant is reported apart from
    /// a payload that does not parse at all.
    pub fn decode(bytes: &[u8]) -> Result<Transaction, DecodeError> {
        let envelope: Envelope =
            serde_json::from_slice(bytes).map_err(|e| DecodeError::Malformed(e.to_string()))?;
        if !ACTIONS.contains(&envelope.action.as_str()) {
            return Err(DecodeError::UnknownAction(envelope.action));
        }
        serde_json::from_slice(bytes).map_err(|e| DecodeError::Malformed(e.to_string()))
    }

    /// Encode to hex string
    pub fn encode_hex(tx: &Transaction) -> Result<String, DecodeError> {
        Ok(hex::encode(Self::encode(tx)?))
    }

    /// Decode from hex string
    pub fn decode_hex(hex_str: &str) -> Result<Transaction, DecodeError> {
        let bytes = hex::decode(hex_str.trim()).map_err(|e| DecodeError::Malformed(e.to_string()))?;
        Self::decode(&bytes)
    }
}
