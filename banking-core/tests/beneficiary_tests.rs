//! Beneficiary registry against a live database: register, admin approve,
//! edit resetting verification, and soft-delete.

use banking_core::beneficiary::{BeneficiaryRegistry, StaticIfscValidator};
use banking_core::types::BeneficiaryStatus;

#[path = "common/mod.rs"]
mod common;
use common::*;

#[tokio::test]
async fn register_then_approve() {
    skip_if_no_database!();

    let db = common::connect().await;
    let registry = BeneficiaryRegistry::new(db.clone(), StaticIfscValidator::default());
    let customer_id = uuid::Uuid::new_v4();
    let now = common::fixed_clock().0;

    let beneficiary = registry
        .register(customer_id, "Meera Nair".into(), "000055556666".into(), "SBIN0009876".into(), None, None, None, now)
        .await
        .unwrap();
    assert_eq!(beneficiary.status, BeneficiaryStatus::PendingVerification);
    assert_eq!(beneficiary.bank_name, "State Bank of India");

    registry.approve(beneficiary.id).await.unwrap();
    let listed = registry.list_for_customer(customer_id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].status, BeneficiaryStatus::Active);
}

#[tokio::test]
async fn editing_an_active_beneficiary_resets_verification() {
    skip_if_no_database!();

    let db = common::connect().await;
    let registry = BeneficiaryRegistry::new(db.clone(), StaticIfscValidator::default());
    let customer_id = uuid::Uuid::new_v4();
    let now = common::fixed_clock().0;

    let beneficiary = registry
        .register(customer_id, "Vikram Shah".into(), "000077778888".into(), "UTIB0001111".into(), None, None, None, now)
        .await
        .unwrap();
    registry.approve(beneficiary.id).await.unwrap();

    let edited = registry.edit(beneficiary.id, Some("Vikram S. Shah".into()), None).await.unwrap();
    assert_eq!(edited.status, BeneficiaryStatus::PendingVerification);
    assert!(!edited.is_verified);
}

#[tokio::test]
async fn deleting_a_beneficiary_frees_the_account_number_for_reuse() {
    skip_if_no_database!();

    let db = common::connect().await;
    let registry = BeneficiaryRegistry::new(db.clone(), StaticIfscValidator::default());
    let customer_id = uuid::Uuid::new_v4();
    let now = common::fixed_clock().0;

    let beneficiary = registry
        .register(customer_id, "Karthik Iyer".into(), "000099990000".into(), "HDFC0002222".into(), None, None, None, now)
        .await
        .unwrap();
    registry.delete(beneficiary.id).await.unwrap();

    let reregistered = registry
        .register(customer_id, "Karthik Iyer".into(), "000099990000".into(), "HDFC0002222".into(), None, None, None, now)
        .await;
    assert!(reregistered.is_ok(), "an INACTIVE beneficiary must not block re-registration");
}
