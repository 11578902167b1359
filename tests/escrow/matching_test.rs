// Matching Tests
// Placement, cancellation, price-time priority, settlement, escrow conservation

#[path = "../common/mod.rs"]
mod common;

use common::*;
use politoken::escrow::{OrderRequest, OrderStatus, Side};
use politoken::ledger::{AccountProfile, Asset, LedgerState};
use politoken::model::{AccountId, Currency, EntityId, OrderId};
use politoken::{EngineConfig, LedgerError, TxError};

fn usdt() -> Asset {
    Asset::Stable(Currency::from("USDT"))
}

fn x() -> Asset {
    Asset::Token(EntityId::from("X"))
}

fn request(owner: &str, side: Side, quantity: u64, price: u64, nonce: u64) -> OrderRequest {
    OrderRequest {
        owner: AccountId::from(owner),
        entity: EntityId::from("X"),
        side,
        quantity,
        price,
        currency: None,
        nonce,
    }
}

/// A with 5_000 USDT, B with 100 X
fn two_traders() -> (LedgerState, EngineConfig) {
    let config = config();
    let mut state = LedgerState::from_genesis(&genesis()).unwrap();
    state
        .create_account(&config, AccountId::from("A"), AccountProfile::default(), &[])
        .unwrap();
    state
        .create_account(&config, AccountId::from("B"), AccountProfile::default(), &[EntityId::from("X")])
        .unwrap();
    state
        .deposit_stablecoin(&config, &AccountId::from("A"), &Currency::from("USDT"), 5_000, "seed")
        .unwrap();
    (state, config)
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[test]
fn test_buy_rests_then_sell_crosses() {
    let (mut state, config) = two_traders();

    let buy = state.place_order(&config, request("A", Side::Buy, 100, 10, 1)).unwrap();
    let a = state.account(&AccountId::from("A")).unwrap();
    assert_eq!(a.frozen(&usdt()), 1_000);
    assert_eq!(a.escrow().active_orders(), &[buy.order.clone()]);

    let sell = state.place_order(&config, request("B", Side::Sell, 100, 9, 1)).unwrap();
    assert_eq!(sell.trades.len(), 1);
    let trade = state.trade(&sell.trades[0]).unwrap();
    assert_eq!(trade.quantity, 100);
    assert_eq!(trade.price, 10);
    assert_eq!(trade.buyer, AccountId::from("A"));
    assert_eq!(trade.seller, AccountId::from("B"));

    let a = state.account(&AccountId::from("A")).unwrap();
    assert_eq!(a.balance(&usdt()), 4_000);
    assert_eq!(a.balance(&x()), 100);
    assert_eq!(a.frozen(&usdt()), 0);
    let b = state.account(&AccountId::from("B")).unwrap();
    assert_eq!(b.balance(&x()), 0);
    assert_eq!(b.balance(&usdt()), 1_000);

    assert_eq!(state.order(&buy.order).unwrap().status(), OrderStatus::Filled);
    assert_eq!(state.order(&sell.order).unwrap().status(), OrderStatus::Filled);
    state.check_invariants().unwrap();
}

#[test]
fn test_cancel_releases_exact_escrow() {
    let (mut state, config) = two_traders();
    let placed = state.place_order(&config, request("A", Side::Buy, 50, 7, 1)).unwrap();
    assert_eq!(state.account(&AccountId::from("A")).unwrap().available(&usdt()), 5_000 - 350);

    let released = state.cancel_order(&AccountId::from("A"), &placed.order).unwrap();
    assert_eq!(released, 350);

    let a = state.account(&AccountId::from("A")).unwrap();
    assert_eq!(a.available(&usdt()), 5_000);
    assert_eq!(a.frozen(&usdt()), 0);
    assert!(a.escrow().active_orders().is_empty());
    assert_eq!(state.order(&placed.order).unwrap().status(), OrderStatus::Cancelled);
    assert!(state.book(&EntityId::from("X"), &Currency::from("USDT")).unwrap().is_empty());
}

#[test]
fn test_sell_escrow_and_cancel() {
    let (mut state, config) = two_traders();
    let placed = state.place_order(&config, request("B", Side::Sell, 40, 12, 1)).unwrap();
    let b = state.account(&AccountId::from("B")).unwrap();
    assert_eq!(b.frozen(&x()), 40);
    assert_eq!(b.available(&x()), 60);

    let err = state
        .place_order(&config, request("B", Side::Sell, 61, 12, 2))
        .unwrap_err();
    assert!(matches!(err, TxError::Rejected(LedgerError::InsufficientFunds { available: 60, .. })));

    state.cancel_order(&AccountId::from("B"), &placed.order).unwrap();
    assert_eq!(state.account(&AccountId::from("B")).unwrap().frozen(&x()), 0);
}

// ============================================================================
// PRIORITY
// ============================================================================

#[test]
fn test_time_priority_at_equal_price() {
    let config = config();
    let (mut state, _) = two_traders();
    state
        .create_account(&config, AccountId::from("C"), AccountProfile::default(), &[EntityId::from("X")])
        .unwrap();

    let first = state.place_order(&config, request("B", Side::Sell, 10, 10, 1)).unwrap();
    let second = state.place_order(&config, request("C", Side::Sell, 10, 10, 1)).unwrap();
    state.place_order(&config, request("A", Side::Buy, 10, 10, 1)).unwrap();

    assert_eq!(state.order(&first.order).unwrap().status(), OrderStatus::Filled);
    assert_eq!(state.order(&second.order).unwrap().status(), OrderStatus::Active);
}

#[test]
fn test_price_priority_beats_time() {
    let (mut state, config) = two_traders();
    let early = state.place_order(&config, request("A", Side::Buy, 10, 9, 1)).unwrap();
    let better = state.place_order(&config, request("A", Side::Buy, 10, 11, 2)).unwrap();
    let sell = state.place_order(&config, request("B", Side::Sell, 10, 9, 1)).unwrap();

    let trade = state.trade(&sell.trades[0]).unwrap();
    assert_eq!(trade.buy_order, better.order);
    assert_eq!(trade.price, 11);
    assert_eq!(state.order(&early.order).unwrap().status(), OrderStatus::Active);
    state.check_invariants().unwrap();
}

#[test]
fn test_cancel_by_non_owner_changes_nothing() {
    let (mut state, config) = two_traders();
    let placed = state.place_order(&config, request("A", Side::Buy, 1, 1, 1)).unwrap();
    let before = state.clone();
    let err = state.cancel_order(&AccountId::from("B"), &placed.order).unwrap_err();
    assert!(matches!(err, TxError::Rejected(LedgerError::NotOrderOwner(_))));
    assert_eq!(state, before);
}

#[test]
fn test_order_validation() {
    let (mut state, config) = two_traders();
    let cases = [
        (request("A", Side::Buy, 0, 10, 1), "zero quantity"),
        (request("A", Side::Buy, 10, 0, 2), "zero price"),
    ];
    for (req, label) in cases {
        let err = state.place_order(&config, req).unwrap_err();
        assert!(matches!(err, TxError::Rejected(LedgerError::InvalidField(_))), "{}", label);
    }

    let mut unknown = request("A", Side::Buy, 1, 1, 3);
    unknown.entity = EntityId::from("Nope");
    assert!(matches!(
        state.place_order(&config, unknown).unwrap_err(),
        TxError::Rejected(LedgerError::EntityNotFound(_))
    ));

    let mut dai = request("A", Side::Buy, 1, 1, 4);
    dai.currency = Some(Currency::from("DAI"));
    assert!(matches!(
        state.place_order(&config, dai).unwrap_err(),
        TxError::Rejected(LedgerError::UnsupportedCurrency(_))
    ));

    assert!(matches!(
        state
            .place_order(&config, request("ghost", Side::Buy, 1, 1, 1))
            .unwrap_err(),
        TxError::Rejected(LedgerError::AccountNotFound(_))
    ));
}

#[test]
fn test_filled_order_replay_rejected() {
    let (mut state, config) = two_traders();
    state.place_order(&config, request("A", Side::Buy, 10, 10, 5)).unwrap();
    state.place_order(&config, request("B", Side::Sell, 10, 10, 5)).unwrap();
    assert_eq!(
        state.order(&order_id("A", 5)).unwrap().status(),
        OrderStatus::Filled
    );

    let err = state
        .place_order(&config, request("A", Side::Buy, 10, 10, 5))
        .unwrap_err();
    assert!(matches!(err, TxError::Rejected(LedgerError::DuplicateOrder(_))));
    assert_eq!(state.trades().len(), 1);
}

// ============================================================================
// PROPERTIES
// ============================================================================

/// Random workload: after every step no book crosses, escrow matches open
/// orders, and every trade price lies within both limits.
#[test]
fn test_randomized_workload_preserves_invariants() {
    let config = config();
    let mut state = LedgerState::from_genesis(&genesis()).unwrap();
    let traders = ["t0", "t1", "t2", "t3", "t4"];
    for (i, t) in traders.iter().enumerate() {
        state
            .create_account(&config, AccountId::from(*t), AccountProfile::default(), &[EntityId::from("X")])
            .unwrap();
        state
            .deposit_stablecoin(&config, &AccountId::from(*t), &Currency::from("USDT"), 2_000, &format!("seed-{}", i))
            .unwrap();
    }

    let mut rng = Xorshift::new(42);
    let mut placed: Vec<(String, OrderId)> = Vec::new();
    for nonce in 0..400u64 {
        let owner = traders[rng.range(0, 4) as usize];
        if rng.range(0, 4) == 0 && !placed.is_empty() {
            let (who, id) = placed[rng.range(0, placed.len() as u64 - 1) as usize].clone();
            let _ = state.cancel_order(&AccountId::from(who.as_str()), &id);
        } else {
            let side = if rng.next() % 2 == 0 { Side::Buy } else { Side::Sell };
            let req = request(owner, side, rng.range(1, 15), rng.range(5, 15), nonce);
            match state.place_order(&config, req) {
                Ok(out) => placed.push((owner.to_string(), out.order)),
                Err(TxError::Rejected(_)) => {}
                Err(TxError::Fatal(fault)) => panic!("fault: {}", fault),
            }
        }
        state.check_invariants().unwrap();
    }

    assert!(!state.trades().is_empty());
    for trade in state.trades().values() {
        let buy = state.order(&trade.buy_order).unwrap();
        let sell = state.order(&trade.sell_order).unwrap();
        assert!(trade.price <= buy.price());
        assert!(trade.price >= sell.price());
        assert_eq!(trade.total, trade.quantity * trade.price);
    }

    // tokens and stablecoins are only moved, never created
    let total_x: u64 = state.accounts().iter().map(|a| a.balance(&x())).sum();
    assert_eq!(total_x, 500);
    assert_eq!(state.stablecoin_supply(&Currency::from("USDT")).unwrap(), 10_000);
}
