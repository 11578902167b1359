// Relay Tests
// Delivering withdrawal intents to the bridge

use politoken::gateway::{
    MockWithdrawalTarget, RelayConfig, RelayError, RelayEvent, RelayStatus, WithdrawalRelay,
    WithdrawalTarget,
};
use politoken::ledger::{WithdrawalIntent, WithdrawalStatus};
use politoken::model::{AccountId, Currency, WithdrawalId};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn intent(nonce: u64, amount: u64) -> WithdrawalIntent {
    let account = AccountId::from("alice");
    WithdrawalIntent {
        id: WithdrawalId::derive(&account, nonce),
        account,
        currency: Currency::from("USDT"),
        amount,
        destination: "0xdest".to_string(),
        height: 1,
        status: WithdrawalStatus::Requested,
    }
}

fn fast_config() -> RelayConfig {
    RelayConfig::new()
        .with_max_retries(2)
        .with_retry_delay_ms(0)
        .with_timeout_ms(1_000)
}

// ============================================================================
// CONFIG
// ============================================================================

#[test]
fn test_relay_config_default() {
    let config = RelayConfig::default();
    assert!(config.max_retries > 0);
    assert!(config.retry_delay_ms > 0);
    assert!(config.timeout_ms > 0);
    assert!(config.validate().is_ok());
}

#[test]
fn test_relay_config_zero_timeout_invalid() {
    let config = RelayConfig::new().with_timeout_ms(0);
    assert!(matches!(config.validate(), Err(RelayError::InvalidConfig(_))));
}

// ============================================================================
// QUEUEING
// ============================================================================

#[test]
fn test_enqueue_rejects_duplicates() {
    let mut relay = WithdrawalRelay::new(fast_config());
    relay.enqueue(intent(1, 10)).unwrap();
    assert_eq!(
        relay.enqueue(intent(1, 10)),
        Err(RelayError::Duplicate(intent(1, 10).id.to_string()))
    );
    assert_eq!(relay.enqueue_all(vec![intent(1, 10), intent(2, 5)]), 1);
    assert_eq!(relay.pending(), 2);
    assert_eq!(relay.stats().queued, 2);
}

#[tokio::test]
async fn test_process_without_target() {
    let mut relay = WithdrawalRelay::new(fast_config());
    relay.enqueue(intent(1, 10)).unwrap();
    let err = relay.process(&intent(1, 10).id).await.unwrap_err();
    assert_eq!(err, RelayError::NoTarget);
    assert_eq!(relay.status(&intent(1, 10).id), Some(RelayStatus::Pending));
}

#[tokio::test]
async fn test_process_unknown_withdrawal() {
    let target = MockWithdrawalTarget::new().with_success();
    let mut relay = WithdrawalRelay::with_target(fast_config(), Box::new(target));
    let err = relay.process(&WithdrawalId::from("missing")).await.unwrap_err();
    assert!(matches!(err, RelayError::NotFound(_)));
}

// ============================================================================
// DELIVERY
// ============================================================================

#[tokio::test]
async fn test_successful_delivery() {
    let target = MockWithdrawalTarget::new().with_success();
    let mut relay = WithdrawalRelay::with_target(fast_config(), Box::new(target));
    let queued = intent(1, 250);
    relay.enqueue(queued.clone()).unwrap();

    let result = relay.process(&queued.id).await.unwrap();
    assert!(result.is_success());
    assert_eq!(result.attempts(), 1);
    let receipt = result.receipt().unwrap();
    assert_eq!(receipt.amount, 250);
    assert_eq!(receipt.destination, "0xdest");
    assert!(result.external_tx().unwrap().starts_with("bridge-"));

    assert_eq!(relay.status(&queued.id), Some(RelayStatus::Confirmed));
    assert_eq!(relay.stats().confirmed, 1);
    assert_eq!(relay.stats().amount_confirmed, 250);

    let again = relay.process(&queued.id).await.unwrap_err();
    assert!(matches!(again, RelayError::AlreadyProcessed(_)));
}

#[tokio::test]
async fn test_retry_then_success() {
    let target = MockWithdrawalTarget::new().with_failures_then_success(2);
    let mut relay = WithdrawalRelay::with_target(fast_config(), Box::new(target));
    relay.enqueue(intent(1, 10)).unwrap();

    let result = relay.process(&intent(1, 10).id).await.unwrap();
    assert!(result.is_success());
    assert_eq!(result.attempts(), 3);
}

#[tokio::test]
async fn test_failure_after_retries() {
    let target = MockWithdrawalTarget::new().with_failure("bridge offline");
    let mut relay = WithdrawalRelay::with_target(fast_config(), Box::new(target));
    relay.enqueue(intent(1, 10)).unwrap();

    let result = relay.process(&intent(1, 10).id).await.unwrap();
    assert!(!result.is_success());
    assert_eq!(result.attempts(), 3);
    assert_eq!(result.error_message(), Some("bridge offline"));
    assert_eq!(relay.status(&intent(1, 10).id), Some(RelayStatus::Failed));
    assert_eq!(relay.stats().failed, 1);

    let events = relay.poll_events();
    assert!(matches!(events.last(), Some(RelayEvent::Failed { attempts: 3, .. })));
    assert!(relay.poll_events().is_empty());
}

#[tokio::test]
async fn test_timeout_counts_as_failure() {
    let target = MockWithdrawalTarget::new().with_success().with_delay_ms(200);
    let config = fast_config().with_timeout_ms(20).with_max_retries(0);
    let mut relay = WithdrawalRelay::with_target(config, Box::new(target));
    relay.enqueue(intent(1, 10)).unwrap();

    let result = relay.process(&intent(1, 10).id).await.unwrap();
    assert!(!result.is_success());
    assert_eq!(result.error_message(), Some("Timeout"));
}

#[tokio::test]
async fn test_process_pending_in_order() {
    let target = MockWithdrawalTarget::new().with_success();
    let mut relay = WithdrawalRelay::with_target(fast_config(), Box::new(target));
    relay.enqueue_all(vec![intent(1, 1), intent(2, 2), intent(3, 3)]);

    let results = relay.process_pending().await.unwrap();
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.is_success()));
    assert_eq!(relay.pending(), 0);
    assert_eq!(relay.stats().amount_confirmed, 6);
}

#[tokio::test]
async fn test_mock_counts_calls() {
    let target = MockWithdrawalTarget::new().with_success();
    target.submit(&intent(1, 1)).await.unwrap();
    target.submit(&intent(2, 1)).await.unwrap();
    assert_eq!(target.calls(), 2);
}
