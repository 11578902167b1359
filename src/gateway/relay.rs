// Withdrawal relay - hands withdrawal intents to the bridge
//
// Runs outside the deterministic core. The ledger has already debited the
// funds; the relay only delivers the intent and tracks confirmation.

use crate::ledger::WithdrawalIntent;
use crate::model::{Amount, Currency, WithdrawalId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

// ============================================================================
// WITHDRAWAL TARGET TRAIT
// ============================================================================

/// The bridge collaborator that executes withdrawals on the foreign network
#[async_trait]
pub trait WithdrawalTarget: Send + Sync {
    /// Submit one withdrawal.
    /// Returns the foreign transaction id on success, error message on failure
    async fn submit(&self, intent: &WithdrawalIntent) -> Result<String, String>;
}

// ============================================================================
// MOCK WITHDRAWAL TARGET
// ============================================================================

/// Mock implementation of WithdrawalTarget for testing
pub struct MockWithdrawalTarget {
    should_succeed: bool,
    failure_message: Option<String>,
    delay_ms: u64,
    failures_before_success: usize,
    call_count: AtomicUsize,
}

impl MockWithdrawalTarget {
    /// Create a new mock target (defaults to failure)
    pub fn new() -> Self {
        Self {
            should_succeed: false,
            failure_message: None,
            delay_ms: 0,
            failures_before_success: 0,
            call_count: AtomicUsize::new(0),
        }
    }

    /// Configure to always succeed
    pub fn with_success(mut self) -> Self {
        self.should_succeed = true;
        self
    }

    /// Configure to always fail with a message
    pub fn with_failure(mut self, message: &str) -> Self {
        self.should_succeed = false;
        self.failure_message = Some(message.to_string());
        self
    }

    /// Add a delay before responding
    pub fn with_delay_ms(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    /// Fail N times, then succeed
    pub fn with_failures_then_success(mut self, failures: usize) -> Self {
        self.should_succeed = true;
        self.failures_before_success = failures;
        self
    }

    pub fn calls(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

impl Default for MockWithdrawalTarget {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WithdrawalTarget for MockWithdrawalTarget {
    async fn submit(&self, intent: &WithdrawalIntent) -> Result<String, String> {
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }

        let call_num = self.call_count.fetch_add(1, Ordering::SeqCst);
        let failure = || {
            self.failure_message
                .clone()
                .unwrap_or_else(|| "Mock failure".to_string())
        };

        if call_num < self.failures_before_success {
            return Err(failure());
        }
        if self.should_succeed {
            Ok(format!("bridge-{}-{}", intent.id, call_num))
        } else {
            Err(failure())
        }
    }
}

// ============================================================================
// RELAY RECEIPT AND RESULT
// ============================================================================

/// Receipt from a confirmed withdrawal
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayReceipt {
    pub withdrawal: WithdrawalId,
    pub external_tx: String,
    pub amount: Amount,
    pub currency: Currency,
    pub destination: String,
    pub confirmed_at: DateTime<Utc>,
}

/// Result of a relay attempt
#[derive(Clone, Debug)]
pub struct RelayResult {
    withdrawal: WithdrawalId,
    external_tx: Option<String>,
    error_message: Option<String>,
    attempts: u32,
    receipt: Option<RelayReceipt>,
}

impl RelayResult {
    fn confirmed(receipt: RelayReceipt, attempts: u32) -> Self {
        Self {
            withdrawal: receipt.withdrawal.clone(),
            external_tx: Some(receipt.external_tx.clone()),
            error_message: None,
            attempts,
            receipt: Some(receipt),
        }
    }

    fn failed(withdrawal: WithdrawalId, error: String, attempts: u32) -> Self {
        Self {
            withdrawal,
            external_tx: None,
            error_message: Some(error),
            attempts,
            receipt: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.receipt.is_some()
    }

    pub fn withdrawal(&self) -> &WithdrawalId {
        &self.withdrawal
    }

    pub fn external_tx(&self) -> Option<&str> {
        self.external_tx.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn receipt(&self) -> Option<&RelayReceipt> {
        self.receipt.as_ref()
    }
}

// ============================================================================
// RELAY EVENTS
// ============================================================================

/// Events emitted by the relay
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelayEvent {
    /// An intent was queued for delivery
    Queued { withdrawal: WithdrawalId, amount: Amount },
    /// The bridge confirmed the withdrawal
    Confirmed {
        withdrawal: WithdrawalId,
        external_tx: String,
    },
    /// Delivery failed after all retries
    Failed {
        withdrawal: WithdrawalId,
        error: String,
        attempts: u32,
    },
}

// ============================================================================
// RELAY CONFIG
// ============================================================================

/// Configuration for the relay
#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Delay between retries in milliseconds
    pub retry_delay_ms: u64,
    /// Timeout for one submission in milliseconds
    pub timeout_ms: u64,
}

impl RelayConfig {
    /// Create a new config with builder pattern
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_retry_delay_ms(mut self, ms: u64) -> Self {
        self.retry_delay_ms = ms;
        self
    }

    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.timeout_ms == 0 {
            return Err(RelayError::InvalidConfig("timeout_ms must be > 0".to_string()));
        }
        Ok(())
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 10_000,
            timeout_ms: 60_000,
        }
    }
}

// ============================================================================
// RELAY STATS AND ERRORS
// ============================================================================

/// Statistics about relay operations
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub queued: u64,
    pub confirmed: u64,
    pub failed: u64,
    pub amount_confirmed: Amount,
}

/// Errors that can occur while relaying
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RelayError {
    #[error("No withdrawal target configured")]
    NoTarget,

    #[error("Duplicate withdrawal: {0} already queued")]
    Duplicate(String),

    #[error("Withdrawal not found: {0}")]
    NotFound(String),

    #[error("Withdrawal already processed: {0}")]
    AlreadyProcessed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Delivery state of a queued intent
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelayStatus {
    Pending,
    Confirmed,
    Failed,
}

// ============================================================================
// RELAY
// ============================================================================

/// Delivers withdrawal intents to the bridge with timeout and retry
pub struct WithdrawalRelay {
    config: RelayConfig,
    target: Option<Box<dyn WithdrawalTarget>>,
    intents: BTreeMap<WithdrawalId, (WithdrawalIntent, RelayStatus)>,
    results: BTreeMap<WithdrawalId, RelayResult>,
    events: Vec<RelayEvent>,
    stats: RelayStats,
}

impl WithdrawalRelay {
    /// Create a relay without a target
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            target: None,
            intents: BTreeMap::new(),
            results: BTreeMap::new(),
            events: Vec::new(),
            stats: RelayStats::default(),
        }
    }

    /// Create a relay with a withdrawal target
    pub fn with_target(config: RelayConfig, target: Box<dyn WithdrawalTarget>) -> Self {
        Self {
            target: Some(target),
            ..Self::new(config)
        }
    }

    pub fn has_target(&self) -> bool {
        self.target.is_some()
    }

    /// Queue an intent for delivery
    pub fn enqueue(&mut self, intent: WithdrawalIntent) -> Result<(), RelayError> {
        if self.intents.contains_key(&intent.id) {
            return Err(RelayError::Duplicate(intent.id.to_string()));
        }
        self.events.push(RelayEvent::Queued {
            withdrawal: intent.id.clone(),
            amount: intent.amount,
        });
        self.stats.queued += 1;
        self.intents
            .insert(intent.id.clone(), (intent, RelayStatus::Pending));
        Ok(())
    }

    /// Queue every intent of a batch, skipping ones already queued
    pub fn enqueue_all(&mut self, intents: impl IntoIterator<Item = WithdrawalIntent>) -> usize {
        intents
            .into_iter()
            .filter_map(|intent| self.enqueue(intent).ok())
            .count()
    }

    /// Deliver one queued intent
    pub async fn process(&mut self, id: &WithdrawalId) -> Result<RelayResult, RelayError> {
        let (intent, status) = self
            .intents
            .get(id)
            .cloned()
            .ok_or_else(|| RelayError::NotFound(id.to_string()))?;
        if status != RelayStatus::Pending {
            return Err(RelayError::AlreadyProcessed(id.to_string()));
        }
        let target = self.target.as_ref().ok_or(RelayError::NoTarget)?;

        let mut attempts = 0u32;
        let mut last_error;
        loop {
            attempts += 1;

            let timeout = Duration::from_millis(self.config.timeout_ms);
            match tokio::time::timeout(timeout, target.submit(&intent)).await {
                Ok(Ok(external_tx)) => {
                    let receipt = RelayReceipt {
                        withdrawal: id.clone(),
                        external_tx: external_tx.clone(),
                        amount: intent.amount,
                        currency: intent.currency.clone(),
                        destination: intent.destination.clone(),
                        confirmed_at: Utc::now(),
                    };
                    info!(withdrawal = %id, external_tx = %external_tx, attempts, "withdrawal confirmed");
                    self.finish(id, RelayStatus::Confirmed);
                    self.stats.confirmed += 1;
                    self.stats.amount_confirmed = self.stats.amount_confirmed.saturating_add(intent.amount);
                    self.events.push(RelayEvent::Confirmed {
                        withdrawal: id.clone(),
                        external_tx,
                    });

                    let result = RelayResult::confirmed(receipt, attempts);
                    self.results.insert(id.clone(), result.clone());
                    return Ok(result);
                }
                Ok(Err(e)) => last_error = e,
                Err(_) => last_error = "Timeout".to_string(),
            }
            warn!(withdrawal = %id, attempts, error = %last_error, "withdrawal attempt failed");

            if attempts > self.config.max_retries {
                break;
            }
            if self.config.retry_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms)).await;
            }
        }

        self.finish(id, RelayStatus::Failed);
        self.stats.failed += 1;
        self.events.push(RelayEvent::Failed {
            withdrawal: id.clone(),
            error: last_error.clone(),
            attempts,
        });

        let result = RelayResult::failed(id.clone(), last_error, attempts);
        self.results.insert(id.clone(), result.clone());
        Ok(result)
    }

    /// Deliver every pending intent, in id order
    pub async fn process_pending(&mut self) -> Result<Vec<RelayResult>, RelayError> {
        let pending: Vec<WithdrawalId> = self
            .intents
            .iter()
            .filter(|(_, (_, status))| *status == RelayStatus::Pending)
            .map(|(id, _)| id.clone())
            .collect();

        let mut results = Vec::with_capacity(pending.len());
        for id in pending {
            results.push(self.process(&id).await?);
        }
        Ok(results)
    }

    fn finish(&mut self, id: &WithdrawalId, status: RelayStatus) {
        if let Some(entry) = self.intents.get_mut(id) {
            entry.1 = status;
        }
    }

    pub fn status(&self, id: &WithdrawalId) -> Option<RelayStatus> {
        self.intents.get(id).map(|(_, status)| *status)
    }

    pub fn result(&self, id: &WithdrawalId) -> Option<&RelayResult> {
        self.results.get(id)
    }

    pub fn pending(&self) -> usize {
        self.intents
            .values()
            .filter(|(_, status)| *status == RelayStatus::Pending)
            .count()
    }

    /// Poll for events (clears the event queue)
    pub fn poll_events(&mut self) -> Vec<RelayEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn stats(&self) -> &RelayStats {
        &self.stats
    }
}
