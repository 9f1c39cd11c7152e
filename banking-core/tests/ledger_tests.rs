//! Exercises the transaction-boundary paths of `Ledger` against a live
//! database: internal transfers, holds, and the two ways a hold resolves.

use banking_core::ledger::{HoldOutcome, Ledger};
use banking_core::types::TransactionCategory;
use rust_decimal_macros::dec;

#[path = "common/mod.rs"]
mod common;
use common::*;

#[tokio::test]
async fn internal_transfer_moves_funds_and_shares_a_reference() {
    skip_if_no_database!();

    let db = common::connect().await;
    let ledger = Ledger::new(db.clone(), common::fixed_clock());

    let source = common::create_account(&db, dec!(1000)).await;
    let dest = common::create_account(&db, dec!(0)).await;

    let (debit, credit) = ledger
        .internal_transfer(source.id, dest.id, dec!(250), TransactionCategory::InternalTransfer, source.customer_id)
        .await
        .unwrap();

    assert_eq!(debit.external_reference, credit.external_reference);
    assert_eq!(debit.balance_after, dec!(750));
    assert_eq!(credit.balance_after, dec!(250));

    let refreshed_source = ledger.get_account(source.id).await.unwrap();
    let refreshed_dest = ledger.get_account(dest.id).await.unwrap();
    assert_eq!(refreshed_source.balance, dec!(750));
    assert_eq!(refreshed_dest.balance, dec!(250));
}

#[tokio::test]
async fn internal_transfer_rejects_insufficient_funds() {
    skip_if_no_database!();

    let db = common::connect().await;
    let ledger = Ledger::new(db.clone(), common::fixed_clock());

    let source = common::create_account(&db, dec!(100)).await;
    let dest = common::create_account(&db, dec!(0)).await;

    let result = ledger
        .internal_transfer(source.id, dest.id, dec!(500), TransactionCategory::InternalTransfer, source.customer_id)
        .await;
    assert!(result.is_err());

    let refreshed_source = ledger.get_account(source.id).await.unwrap();
    assert_eq!(refreshed_source.balance, dec!(100), "a failed transfer must not touch the balance");
}

#[tokio::test]
async fn hold_then_commit_lands_the_debit() {
    skip_if_no_database!();

    let db = common::connect().await;
    let ledger = Ledger::new(db.clone(), common::fixed_clock());
    let account = common::create_account(&db, dec!(10_000)).await;

    let hold = ledger
        .hold_debit(account.id, dec!(2_500), TransactionCategory::Neft, account.customer_id, Some("EFTtest1".into()))
        .await
        .unwrap();

    let mid_flight = ledger.get_account(account.id).await.unwrap();
    assert_eq!(mid_flight.balance, dec!(10_000), "balance does not move until the hold settles");
    assert_eq!(mid_flight.available_balance, dec!(7_500));

    ledger.settle_hold(&hold, HoldOutcome::Commit).await.unwrap();

    let settled = ledger.get_account(account.id).await.unwrap();
    assert_eq!(settled.balance, dec!(7_500));
    assert_eq!(settled.available_balance, dec!(7_500));
}

#[tokio::test]
async fn hold_then_fail_restores_available_balance() {
    skip_if_no_database!();

    let db = common::connect().await;
    let ledger = Ledger::new(db.clone(), common::fixed_clock());
    let account = common::create_account(&db, dec!(10_000)).await;

    let hold = ledger
        .hold_debit(account.id, dec!(2_500), TransactionCategory::Rtgs, account.customer_id, Some("EFTtest2".into()))
        .await
        .unwrap();

    ledger.settle_hold(&hold, HoldOutcome::Fail("external rail rejected".into())).await.unwrap();

    let settled = ledger.get_account(account.id).await.unwrap();
    assert_eq!(settled.balance, dec!(10_000));
    assert_eq!(settled.available_balance, dec!(10_000));
}

#[tokio::test]
async fn bulk_rows_share_a_batch_id_and_are_independent() {
    skip_if_no_database!();

    let db = common::connect().await;
    let ledger = Ledger::new(db.clone(), common::fixed_clock());
    let account = common::create_account(&db, dec!(1_000)).await;

    let ok = ledger.bulk_debit(account.id, dec!(100), account.customer_id, "BULKtest1").await.unwrap();
    let too_much = ledger.bulk_debit(account.id, dec!(10_000), account.customer_id, "BULKtest1").await;

    assert_eq!(ok.bulk_upload_batch_id.as_deref(), Some("BULKtest1"));
    assert!(too_much.is_err(), "one row failing must not roll back the batch");

    let refreshed = ledger.get_account(account.id).await.unwrap();
    assert_eq!(refreshed.balance, dec!(900), "the failed row left the successful row's debit in place");
}
