//! RTGS submit against a live database: synchronous settlement, both the
//! accepted and rejected external outcomes, and the minimum-amount floor.

use std::time::Duration;

use banking_core::external::SimulatedExternalBankAdapter;
use banking_core::ledger::Ledger;
use banking_core::rtgs::RtgsService;
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
        payee_name: "John Payee".into(),
        account_number: "000033334444".into(),
        ifsc_code: "ICIC0005678".into(),
        bank_name: "ICICI Bank".into(),
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
async fn submit_settles_synchronously_on_acceptance() {
    skip_if_no_database!();

    let db = common::connect().await;
    let clock = common::fixed_clock();
    let ledger = std::sync::Arc::new(Ledger::new(db.clone(), clock.clone()));
    let adapter = SimulatedExternalBankAdapter::new(0.0, Duration::from_secs(5));
    let rtgs = RtgsService::new(db.clone(), ledger.clone(), adapter, clock.clone(), Default::default());

    let account = common::create_account(&db, dec!(1_000_000)).await;
    let beneficiary = sample_beneficiary(account.customer_id);

    let eft = rtgs.submit(account.id, &beneficiary, dec!(300_000), account.customer_id).await.unwrap();
    assert_eq!(eft.status, EftStatus::Completed);

    let refreshed = ledger.get_account(account.id).await.unwrap();
    assert_eq!(refreshed.balance, dec!(1_000_000) - eft.total_amount);
    assert_eq!(refreshed.available_balance, refreshed.balance);
}

#[tokio::test]
async fn submit_refunds_the_hold_on_rejection() {
    skip_if_no_database!();

    let db = common::connect().await;
    let clock = common::fixed_clock();
    let ledger = std::sync::Arc::new(Ledger::new(db.clone(), clock.clone()));
    let adapter = SimulatedExternalBankAdapter::new(1.0, Duration::from_secs(5));
    let rtgs = RtgsService::new(db.clone(), ledger.clone(), adapter, clock.clone(), Default::default());

    let account = common::create_account(&db, dec!(1_000_000)).await;
    let beneficiary = sample_beneficiary(account.customer_id);

    let eft = rtgs.submit(account.id, &beneficiary, dec!(300_000), account.customer_id).await.unwrap();
    assert_eq!(eft.status, EftStatus::Failed);
    assert!(eft.failure_reason.is_some());

    let refreshed = ledger.get_account(account.id).await.unwrap();
    assert_eq!(refreshed.balance, dec!(1_000_000), "a rejected RTGS must leave the balance untouched");
    assert_eq!(refreshed.available_balance, dec!(1_000_000));
}

#[tokio::test]
async fn submit_rejects_amounts_below_the_minimum() {
    skip_if_no_database!();

    let db = common::connect().await;
    let clock = common::fixed_clock();
    let ledger = std::sync::Arc::new(Ledger::new(db.clone(), clock.clone()));
    let adapter = SimulatedExternalBankAdapter::new(0.0, Duration::from_secs(5));
    let rtgs = RtgsService::new(db.clone(), ledger.clone(), adapter, clock.clone(), Default::default());

    let account = common::create_account(&db, dec!(1_000_000)).await;
    let beneficiary = sample_beneficiary(account.customer_id);

    let result = rtgs.submit(account.id, &beneficiary, dec!(1_000), account.customer_id).await;
    assert!(result.is_err());
}
