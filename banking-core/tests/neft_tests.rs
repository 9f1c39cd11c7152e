//! NEFT submit + batch-tick against a live database: the hold at submit
//! time, the batch completing it, and the idempotent re-tick.

use std::time::Duration;

use banking_core::external::SimulatedExternalBankAdapter;
use banking_core::ledger::Ledger;
use banking_core::neft::NeftService;
use banking_core::types::{Beneficiary, BeneficiaryStatus, EftStatus};
use rust_decimal_macros::dec;
use uuid::Uuid;

#[path = "common/mod.rs"]
mod common;
use common::*;

fn sample_beneficiary(customer_id: Uuid) -> Beneficiary {
    let now = common::fixed_clock().0;
    Beneficiary {
        id: Uuid::new_v4(),
        customer_id,
        payee_name: "Jane Payee".into(),
        account_number: "000011112222".into(),
        ifsc_code: "HDFC0001234".into(),
        bank_name: "HDFC Bank".into(),
        branch_name: Some("Head Office".into()),
        contact: None,
        is_verified: true,
        status: BeneficiaryStatus::Active,
        last_used_at: None,
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn submit_places_a_hold_for_amount_plus_charges() {
    skip_if_no_database!();

    let db = common::connect().await;
    let clock = common::fixed_clock();
    let ledger = std::sync::Arc::new(Ledger::new(db.clone(), clock.clone()));
    let adapter = SimulatedExternalBankAdapter::new(0.0, Duration::from_secs(5));
    let neft = NeftService::new(db.clone(), ledger.clone(), adapter, clock.clone(), Default::default());

    let account = common::create_account(&db, dec!(50_000)).await;
    let beneficiary = sample_beneficiary(account.customer_id);

    let eft = neft.submit(account.id, &beneficiary, dec!(10_000), account.customer_id).await.unwrap();
    assert_eq!(eft.status, EftStatus::Pending);
    assert!(eft.charges > dec!(0));

    let refreshed = ledger.get_account(account.id).await.unwrap();
    assert_eq!(refreshed.balance, dec!(50_000), "balance doesn't move until the batch settles");
    assert_eq!(refreshed.available_balance, dec!(50_000) - eft.total_amount);
}

#[tokio::test]
async fn submit_outside_the_window_is_accepted_and_held_for_the_next_slot() {
    skip_if_no_database!();

    let db = common::connect().await;
    // 21:00 is outside the default 08:00-19:00 NEFT window.
    let clock = std::sync::Arc::new(banking_core::ids::FixedClock::ymd_hms(2026, 7, 29, 21, 0, 0));
    let ledger = std::sync::Arc::new(Ledger::new(db.clone(), clock.clone()));
    let adapter = SimulatedExternalBankAdapter::new(0.0, Duration::from_secs(5));
    let neft = NeftService::new(db.clone(), ledger.clone(), adapter, clock.clone(), Default::default());

    let account = common::create_account(&db, dec!(50_000)).await;
    let beneficiary = sample_beneficiary(account.customer_id);

    let eft = neft.submit(account.id, &beneficiary, dec!(10_000), account.customer_id).await.unwrap();
    assert_eq!(eft.status, EftStatus::Pending, "an out-of-window submit must still be accepted, not rejected");
    assert_eq!(
        eft.batch_time,
        Some(banking_core::ids::FixedClock::ymd_hms(2026, 7, 30, 8, 0, 0).0),
        "batch_time must land on the window's next opening, not 22:00"
    );

    let refreshed = ledger.get_account(account.id).await.unwrap();
    assert_eq!(refreshed.balance, dec!(50_000), "balance doesn't move until a batch settles");
    assert_eq!(refreshed.available_balance, dec!(50_000) - eft.total_amount, "the hold must still reduce availableBalance");
}

#[tokio::test]
async fn batch_tick_settles_pending_efts_and_is_idempotent() {
    skip_if_no_database!();

    let db = common::connect().await;
    let clock = common::fixed_clock();
    let ledger = std::sync::Arc::new(Ledger::new(db.clone(), clock.clone()));
    let adapter = SimulatedExternalBankAdapter::new(0.0, Duration::from_secs(5));
    let neft = NeftService::new(db.clone(), ledger.clone(), adapter, clock.clone(), Default::default());

    let account = common::create_account(&db, dec!(50_000)).await;
    let beneficiary = sample_beneficiary(account.customer_id);
    let eft = neft.submit(account.id, &beneficiary, dec!(10_000), account.customer_id).await.unwrap();

    let first_tick = neft.batch_tick().await.unwrap();
    assert!(!first_tick.already_claimed);
    assert!(first_tick.total >= 1);

    let completed = neft.get(eft.id).await.unwrap();
    assert_eq!(completed.status, EftStatus::Completed);

    let second_tick = neft.batch_tick().await.unwrap();
    assert!(second_tick.already_claimed, "the same hour cannot be processed twice");
}
