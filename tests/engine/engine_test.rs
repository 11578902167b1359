// Engine Tests
// Batch application end to end: determinism, replay, restart equivalence

#[path = "../common/mod.rs"]
mod common;

use common::*;
use politoken::escrow::{OrderStatus, Side};
use politoken::ledger::Asset;
use politoken::model::{AccountId, Currency, EntityId, ProposalId};
use politoken::storage::LedgerStore;
use politoken::tx::{Transaction, TxCode};
use politoken::{Engine, EngineFault};
use tempfile::TempDir;

fn engine() -> Engine {
    Engine::open(&genesis(), LedgerStore::temporary().unwrap()).unwrap()
}

fn usdt() -> Asset {
    Asset::Stable(Currency::from("USDT"))
}

/// Scripted multi-batch workload touching every transaction kind
fn workload() -> Vec<Vec<Transaction>> {
    let mut batches = vec![vec![
        create_account("A", &["X", "Y"]),
        create_referred("B", "A"),
        create_account("C", &["X"]),
        deposit("A", 10_000, "a-1"),
        deposit("B", 3_000, "b-1"),
    ]];

    let mut rng = Xorshift::new(7);
    let traders = ["A", "B", "C"];
    for round in 0..6u64 {
        let mut txs = Vec::new();
        for i in 0..12u64 {
            let owner = traders[rng.range(0, 2) as usize];
            let side = if rng.next() % 2 == 0 { Side::Buy } else { Side::Sell };
            let nonce = round * 100 + i;
            txs.push(place(owner, "X", side, rng.range(1, 20), rng.range(8, 14), nonce));
            if rng.range(0, 5) == 0 {
                txs.push(cancel(owner, &order_id(owner, nonce)));
            }
        }
        txs.push(claim("A", "Y"));
        txs.push(withdraw("B", 10, round));
        batches.push(txs);
    }
    batches
}

#[test]
fn test_two_engines_agree() {
    let mut left = engine();
    let mut right = engine();

    for (i, txs) in workload().iter().enumerate() {
        let height = i as u64 + 1;
        let a = left.apply_batch(height, &batch(txs)).unwrap();
        let b = right.apply_batch(height, &batch(txs)).unwrap();
        assert_eq!(a, b);
    }
    assert_eq!(left.committed().state, right.committed().state);
    assert_eq!(
        left.committed().state.to_canonical_bytes().unwrap(),
        right.committed().state.to_canonical_bytes().unwrap()
    );
    assert!(!left.committed().state.trades().is_empty());
}

#[test]
fn test_restart_is_invisible() {
    let temp_dir = TempDir::new().unwrap();
    let batches = workload();
    let (split, rest) = batches.split_at(3);

    let mut continuous = engine();
    {
        let mut first = Engine::open(&genesis(), LedgerStore::open(temp_dir.path()).unwrap()).unwrap();
        for (i, txs) in split.iter().enumerate() {
            let height = i as u64 + 1;
            let a = first.apply_batch(height, &batch(txs)).unwrap();
            let b = continuous.apply_batch(height, &batch(txs)).unwrap();
            assert_eq!(a.digest, b.digest);
        }
    }

    let mut restarted = Engine::open(&genesis(), LedgerStore::open(temp_dir.path()).unwrap()).unwrap();
    assert_eq!(restarted.height(), 3);
    assert_eq!(restarted.committed().state, continuous.committed().state);

    for (i, txs) in rest.iter().enumerate() {
        let height = split.len() as u64 + i as u64 + 1;
        let a = restarted.apply_batch(height, &batch(txs)).unwrap();
        let b = continuous.apply_batch(height, &batch(txs)).unwrap();
        assert_eq!(a, b);
    }
    assert_eq!(restarted.query("status").unwrap(), continuous.query("status").unwrap());
}

#[test]
fn test_replayed_batch_is_rejected_per_tx() {
    let mut engine = engine();
    let first = batch(&[
        create_account("A", &[]),
        deposit("A", 1_000, "d"),
        place("A", "X", Side::Buy, 10, 10, 1),
        withdraw("A", 100, 1),
    ]);
    engine.apply_batch(1, &first).unwrap();
    let state = engine.committed().state.clone();

    let replay = engine.apply_batch(2, &first).unwrap();
    let codes: Vec<u32> = replay.results.iter().map(|r| r.code).collect();
    assert_eq!(
        codes,
        vec![
            TxCode::AccountExists.as_u32(),
            TxCode::DuplicateDeposit.as_u32(),
            TxCode::DuplicateOrder.as_u32(),
            TxCode::DuplicateWithdrawal.as_u32(),
        ]
    );
    assert!(replay.withdrawals.is_empty());

    let after = &engine.committed().state;
    assert_eq!(after.accounts(), state.accounts());
    assert_eq!(after.orders(), state.orders());
}

#[test]
fn test_stale_height_is_fault_and_commits_nothing() {
    let mut engine = engine();
    engine.apply_batch(1, &batch(&[create_account("A", &[])])).unwrap();
    let before = engine.committed();

    let err = engine
        .apply_batch(1, &batch(&[create_account("B", &[])]))
        .unwrap_err();
    assert!(matches!(err, EngineFault::Invariant(_)));
    let after = engine.committed();
    assert_eq!(after.digest, before.digest);
    assert!(after.state.account(&AccountId::from("B")).is_none());
}

#[test]
fn test_oversized_deposit_cannot_halt_settlement() {
    let mut engine = engine();
    let out = engine
        .apply_batch(
            1,
            &batch(&[
                create_account("rich", &["X"]),
                create_account("buyer", &[]),
                deposit("rich", u64::MAX - 5, "r"),
                deposit("buyer", 10, "b"),
                place("buyer", "X", Side::Buy, 1, 10, 1),
                place("rich", "X", Side::Sell, 1, 10, 1),
            ]),
        )
        .unwrap();
    let codes: Vec<u32> = out.results.iter().map(|r| r.code).collect();
    assert_eq!(
        codes,
        vec![
            TxCode::Ok.as_u32(),
            TxCode::Ok.as_u32(),
            TxCode::Ok.as_u32(),
            TxCode::AmountOverflow.as_u32(),
            TxCode::InsufficientFunds.as_u32(),
            TxCode::Ok.as_u32(),
        ]
    );
    assert!(engine.committed().state.trades().is_empty());

    // funds leaving through the bridge make room again; the trade then settles
    let out = engine
        .apply_batch(
            2,
            &batch(&[
                withdraw("rich", 10, 1),
                deposit("buyer", 10, "b"),
                place("buyer", "X", Side::Buy, 1, 10, 1),
            ]),
        )
        .unwrap();
    assert!(out.results.iter().all(|r| r.is_ok()));
    let state = &engine.committed().state;
    assert_eq!(state.trades().len(), 1);
    let rich = state.account(&AccountId::from("rich")).unwrap();
    assert_eq!(rich.balance(&usdt()), u64::MAX - 5);
}

#[test]
fn test_scenarios_end_to_end() {
    let mut engine = Engine::open(
        &genesis().with_entity("Z", "Daegu", "Red"),
        LedgerStore::temporary().unwrap(),
    )
    .unwrap();

    // governance: 50 yes votes promote
    let mut signups: Vec<Transaction> = (0..50).map(|i| create_account(&format!("v{}", i), &[])).collect();
    signups.push(propose("v0", "Newcomer"));
    let out = engine.apply_batch(1, &batch(&signups)).unwrap();
    let proposal = ProposalId::from(out.results[50].data.clone().unwrap());

    let votes: Vec<Transaction> = (0..49).map(|i| vote(&proposal, &format!("v{}", i), true)).collect();
    engine.apply_batch(2, &batch(&votes)).unwrap();
    assert!(engine.query(&format!("proposal/{}", proposal)).unwrap().is_ok());

    let out = engine.apply_batch(3, &batch(&[vote(&proposal, "v49", true)])).unwrap();
    assert_eq!(out.results[0].data.as_deref(), Some("Newcomer"));
    assert!(!engine.query(&format!("proposal/{}", proposal)).unwrap().is_ok());
    assert!(engine.query("entity/Newcomer").unwrap().is_ok());

    // trading: resting buy sets the price
    let out = engine
        .apply_batch(
            4,
            &batch(&[
                create_account("A", &[]),
                create_account("B", &["Z"]),
                deposit("A", 1_000, "a"),
                place("A", "Z", Side::Buy, 100, 10, 1),
                place("B", "Z", Side::Sell, 100, 9, 1),
            ]),
        )
        .unwrap();
    assert!(out.results.iter().all(|r| r.is_ok()));
    let state = &engine.committed().state;
    assert_eq!(state.order(&order_id("A", 1)).unwrap().status(), OrderStatus::Filled);
    assert_eq!(state.order(&order_id("B", 1)).unwrap().status(), OrderStatus::Filled);
    let a = state.account(&AccountId::from("A")).unwrap();
    assert_eq!(a.balance(&usdt()), 0);
    assert_eq!(a.balance(&Asset::Token(EntityId::from("Z"))), 100);
    let b = state.account(&AccountId::from("B")).unwrap();
    assert_eq!(b.balance(&usdt()), 1_000);
}
