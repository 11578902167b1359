// Fixed-point integer amounts
//
// All balances, quantities and prices are plain u64 in minor units.
// Overflow inside settlement is a fault, never a wraparound.

use crate::error::EngineFault;

/// Stablecoin amount in minor units
pub type Amount = u64;

/// Token quantity in whole units
pub type Quantity = u64;

/// Stablecoin minor units per token unit
pub type Price = u64;

/// Add two amounts, faulting on overflow
pub fn checked_add(a: u64, b: u64, what: &'static str) -> Result<u64, EngineFault> {
    a.checked_add(b).ok_or(EngineFault::Overflow(what))
}

/// Subtract, faulting on underflow
pub fn checked_sub(a: u64, b: u64, what: &'static str) -> Result<u64, EngineFault> {
    a.checked_sub(b).ok_or(EngineFault::Overflow(what))
}

/// Multiply, faulting on overflow
pub fn checked_mul(a: u64, b: u64, what: &'static str) -> Result<u64, EngineFault> {
    a.checked_mul(b).ok_or(EngineFault::Overflow(what))
}
