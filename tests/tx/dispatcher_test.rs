// Dispatcher Tests
// Decoding tiers, result codes, atomic rejection

#[path = "../common/mod.rs"]
mod common;

use common::*;
use politoken::escrow::Side;
use politoken::ledger::LedgerState;
use politoken::model::{AccountId, ProposalId};
use politoken::tx::{Dispatcher, TxCode};

fn setup() -> (Dispatcher, LedgerState) {
    (
        Dispatcher::new(config()),
        LedgerState::from_genesis(&genesis()).unwrap(),
    )
}

fn codes(results: &[politoken::TxResult]) -> Vec<u32> {
    results.iter().map(|r| r.code).collect()
}

#[test]
fn test_decode_failures_are_not_fatal() {
    let (dispatcher, mut state) = setup();
    let before = state.digest().unwrap();
    let txs = vec![
        b"".to_vec(),
        b"{".to_vec(),
        br#"{"action":42}"#.to_vec(),
        br#"{"action":"burn"}"#.to_vec(),
        br#"{"action":"place_order","owner":"a"}"#.to_vec(),
    ];
    let applied = dispatcher.apply_batch(&mut state, 1, &txs).unwrap();
    assert_eq!(
        codes(&applied.results),
        vec![
            TxCode::Malformed.as_u32(),
            TxCode::Malformed.as_u32(),
            TxCode::Malformed.as_u32(),
            TxCode::UnknownAction.as_u32(),
            TxCode::Malformed.as_u32(),
        ]
    );

    // only the height moved
    let mut expected = LedgerState::from_genesis(&genesis()).unwrap();
    assert_ne!(state.digest().unwrap(), before);
    dispatcher.apply_batch(&mut expected, 1, &[]).unwrap();
    assert_eq!(state, expected);
}

#[test]
fn test_full_lifecycle_codes() {
    let (dispatcher, mut state) = setup();
    let txs = batch(&[
        create_account("A", &[]),
        create_referred("B", "A"),
        create_account("B", &[]),
        claim("A", "X"),
        claim("A", "Y"),
        deposit("A", 1_000, "d1"),
        deposit("A", 1_000, "d1"),
        place("A", "X", Side::Buy, 10, 10, 1),
        place("A", "X", Side::Buy, 10, 10, 1),
        place("A", "X", Side::Buy, 1_000, 10, 2),
        cancel("B", &order_id("A", 1)),
        cancel("A", &order_id("A", 1)),
        cancel("A", &order_id("A", 1)),
        withdraw("A", 1_000, 1),
        withdraw("A", 1, 1),
        withdraw("A", 1, 2),
    ]);
    let applied = dispatcher.apply_batch(&mut state, 1, &txs).unwrap();
    assert_eq!(
        codes(&applied.results),
        vec![
            TxCode::Ok.as_u32(),
            TxCode::Ok.as_u32(),
            TxCode::AccountExists.as_u32(),
            TxCode::Ok.as_u32(),
            TxCode::NoReferralCredits.as_u32(),
            TxCode::Ok.as_u32(),
            TxCode::DuplicateDeposit.as_u32(),
            TxCode::Ok.as_u32(),
            TxCode::DuplicateOrder.as_u32(),
            TxCode::InsufficientFunds.as_u32(),
            TxCode::NotOrderOwner.as_u32(),
            TxCode::Ok.as_u32(),
            TxCode::OrderNotOpen.as_u32(),
            TxCode::Ok.as_u32(),
            TxCode::DuplicateWithdrawal.as_u32(),
            TxCode::InsufficientFunds.as_u32(),
        ]
    );
    assert_eq!(applied.withdrawals.len(), 1);
    assert_eq!(applied.results[7].data.as_deref(), Some(order_id("A", 1).as_str()));
}

#[test]
fn test_governance_through_dispatcher() {
    let dispatcher = Dispatcher::new(config().with_vote_threshold(2));
    let mut state = LedgerState::new();
    let applied = dispatcher
        .apply_batch(
            &mut state,
            1,
            &batch(&[
                create_account("p", &[]),
                create_account("q", &[]),
                propose("p", "Z"),
                propose("p", "Z"),
                propose("ghost", "W"),
            ]),
        )
        .unwrap();
    assert_eq!(
        codes(&applied.results),
        vec![0, 0, 0, TxCode::ProposalAlreadyOpen.as_u32(), 0]
    );
    let proposal = ProposalId::from(applied.results[2].data.clone().unwrap());

    let applied = dispatcher
        .apply_batch(
            &mut state,
            2,
            &batch(&[
                vote(&proposal, "p", true),
                vote(&proposal, "p", true),
                vote(&proposal, "ghost", true),
                vote(&proposal, "q", true),
                vote(&proposal, "q", true),
            ]),
        )
        .unwrap();
    assert_eq!(
        codes(&applied.results),
        vec![
            0,
            TxCode::DuplicateVote.as_u32(),
            0,
            TxCode::ProposalNotFound.as_u32(),
            TxCode::ProposalNotFound.as_u32(),
        ]
    );
    // a vote from a key with no account still counts
    assert_eq!(applied.results[2].data.as_deref(), Some("Z"));
    assert!(state.entities().contains(&politoken::model::EntityId::from("Z")));
}

#[test]
fn test_invalid_fields() {
    let (dispatcher, mut state) = setup();
    let applied = dispatcher
        .apply_batch(
            &mut state,
            1,
            &[
                br#"{"action":"create_account","account":"  "}"#.to_vec(),
                br#"{"action":"create_account","account":"A"}"#.to_vec(),
                br#"{"action":"propose_entity","proposer":"A","name":"N"}"#.to_vec(),
                br#"{"action":"deposit_stablecoin","account":"A","currency":"USDT","amount":0,"source_ref":"r"}"#.to_vec(),
                br#"{"action":"deposit_stablecoin","account":"A","currency":"EUR","amount":5,"source_ref":"r"}"#.to_vec(),
                br#"{"action":"deposit_stablecoin","account":"A","currency":"usdc","amount":5,"source_ref":"r"}"#.to_vec(),
            ],
        )
        .unwrap();
    assert_eq!(
        codes(&applied.results),
        vec![
            TxCode::InvalidField.as_u32(),
            0,
            TxCode::InvalidField.as_u32(),
            TxCode::InvalidField.as_u32(),
            TxCode::UnsupportedCurrency.as_u32(),
            0,
        ]
    );
    assert!(state.account(&AccountId::from("A")).is_some());
}

#[test]
fn test_results_carry_logs() {
    let (dispatcher, mut state) = setup();
    let applied = dispatcher
        .apply_batch(&mut state, 1, &batch(&[create_account("A", &["X"]), claim("A", "X")]))
        .unwrap();
    assert!(applied.results[0].log.contains("1 allotments"));
    assert_eq!(applied.results[1].log, "no referral credits to claim");
}
