// Engine configuration and genesis
//
// Every replica must run with an identical EngineConfig: it feeds the
// deterministic handlers (allotment unit, vote threshold, launch supply,
// accepted currencies).

use crate::model::{Currency, Quantity};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors from loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Configuration for the execution engine
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Tokens handed out per initial allotment or referral claim
    pub allotment_unit: Quantity,
    /// Yes votes required to promote a proposal
    pub vote_threshold: u64,
    /// Supply of a newly promoted entity
    pub launch_supply: Quantity,
    /// Accepted stablecoins
    pub currencies: Vec<Currency>,
    /// Currency used when an order omits one
    pub default_currency: Currency,
    /// Check escrow and supply conservation after every batch
    pub verify_invariants: bool,
    /// Keep only the most recent N snapshots
    pub retain_snapshots: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            allotment_unit: 100,
            vote_threshold: 50,
            launch_supply: 10_000_000,
            currencies: vec![Currency::from("USDT"), Currency::from("USDC")],
            default_currency: Currency::from("USDT"),
            verify_invariants: true,
            retain_snapshots: None,
        }
    }
}

impl EngineConfig {
    /// Create a new config with builder pattern
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_allotment_unit(mut self, unit: Quantity) -> Self {
        self.allotment_unit = unit;
        self
    }

    pub fn with_vote_threshold(mut self, threshold: u64) -> Self {
        self.vote_threshold = threshold;
        self
    }

    pub fn with_launch_supply(mut self, supply: Quantity) -> Self {
        self.launch_supply = supply;
        self
    }

    pub fn with_currencies(mut self, currencies: &[&str]) -> Self {
        self.currencies = currencies.iter().map(|c| Currency::from(*c)).collect();
        self
    }

    pub fn with_default_currency(mut self, currency: &str) -> Self {
        self.default_currency = Currency::from(currency);
        self
    }

    pub fn with_verify_invariants(mut self, verify: bool) -> Self {
        self.verify_invariants = verify;
        self
    }

    pub fn with_retain_snapshots(mut self, retain: u64) -> Self {
        self.retain_snapshots = Some(retain);
        self
    }

    /// Whether a (normalized) currency is accepted
    pub fn supports(&self, currency: &Currency) -> bool {
        self.currencies.iter().any(|c| c == currency)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.allotment_unit == 0 {
            return Err(ConfigError::Invalid("allotment_unit must be > 0".to_string()));
        }
        if self.vote_threshold == 0 {
            return Err(ConfigError::Invalid("vote_threshold must be > 0".to_string()));
        }
        if self.launch_supply == 0 {
            return Err(ConfigError::Invalid("launch_supply must be > 0".to_string()));
        }
        if self.currencies.is_empty() {
            return Err(ConfigError::Invalid("at least one currency is required".to_string()));
        }
        if !self.supports(&self.default_currency) {
            return Err(ConfigError::Invalid(format!(
                "default currency {} is not in the currency list",
                self.default_currency
            )));
        }
        if self.retain_snapshots == Some(0) {
            return Err(ConfigError::Invalid("retain_snapshots must be > 0".to_string()));
        }
        Ok(())
    }
}

/// An entity admitted at genesis, bypassing governance
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisEntity {
    pub name: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub party: String,
    /// Defaults to the engine's launch supply
    #[serde(default)]
    pub supply: Option<Quantity>,
}

/// Chain genesis: engine parameters plus the initial entity set
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub entities: Vec<GenesisEntity>,
}

impl GenesisConfig {
    /// Load a genesis file (JSON)
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let data = std::fs::read(path)?;
        let genesis: GenesisConfig = serde_json::from_slice(&data)?;
        genesis.validate()?;
        Ok(genesis)
    }

    pub fn with_entity(mut self, name: &str, region: &str, party: &str) -> Self {
        self.entities.push(GenesisEntity {
            name: name.to_string(),
            region: region.to_string(),
            party: party.to_string(),
            supply: None,
        });
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        for entity in &self.entities {
            if entity.name.trim().is_empty() {
                return Err(ConfigError::Invalid("genesis entity without a name".to_string()));
            }
            if entity.supply == Some(0) {
                return Err(ConfigError::Invalid(format!(
                    "genesis entity {} has zero supply",
                    entity.name
                )));
            }
        }
        let mut names: Vec<&str> = self.entities.iter().map(|e| e.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        if names.len() != self.entities.len() {
            return Err(ConfigError::Invalid("duplicate genesis entity".to_string()));
        }
        Ok(())
    }
}
