//! Full onboarding walk against a live database: register -> submit details
//! -> approve, and the reject/resubmit loop.

use banking_core::onboarding::{CustomerDetailsSubmission, OnboardingService};
use banking_core::types::{Address, CustomerStatus, UserStatus};

#[path = "common/mod.rs"]
mod common;
use common::*;

fn sample_submission() -> CustomerDetailsSubmission {
    CustomerDetailsSubmission {
        first_name: "Asha".into(),
        last_name: "Rao".into(),
        national_id: "NID-00112233".into(),
        address: Address {
            line1: "12 MG Road".into(),
            line2: None,
            city: "Bengaluru".into(),
            state: "Karnataka".into(),
            postal_code: "560001".into(),
        },
    }
}

#[tokio::test]
async fn register_then_submit_details_then_approve_opens_an_account() {
    skip_if_no_database!();

    let db = common::connect().await;
    let onboarding = OnboardingService::new(db.clone(), common::fixed_clock());

    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let user = onboarding
        .register(format!("asha-{suffix}"), format!("asha-{suffix}@example.com"), None, "hashed-password".into())
        .await
        .unwrap();
    assert_eq!(user.status, UserStatus::PendingDetails);

    let customer = onboarding.submit_customer_details(user.id, sample_submission()).await.unwrap();
    assert_eq!(customer.status, CustomerStatus::PendingReview);

    let account = onboarding.approve(customer.id, rust_decimal_macros::dec!(0), "INR").await.unwrap();
    assert_eq!(account.customer_id, customer.id);
    assert_eq!(account.currency, "INR");
}

#[tokio::test]
async fn rejected_customer_can_resubmit_details() {
    skip_if_no_database!();

    let db = common::connect().await;
    let onboarding = OnboardingService::new(db.clone(), common::fixed_clock());

    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let user = onboarding
        .register(format!("ravi-{suffix}"), format!("ravi-{suffix}@example.com"), None, "hashed-password".into())
        .await
        .unwrap();
    let customer = onboarding.submit_customer_details(user.id, sample_submission()).await.unwrap();

    onboarding.reject(customer.id, "national id does not match records".into()).await.unwrap();

    let second_attempt = onboarding.submit_customer_details(user.id, sample_submission()).await.unwrap();
    assert_eq!(second_attempt.status, CustomerStatus::PendingReview);
}

#[tokio::test]
async fn duplicate_username_is_rejected() {
    skip_if_no_database!();

    let db = common::connect().await;
    let onboarding = OnboardingService::new(db.clone(), common::fixed_clock());

    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let username = format!("dupe-{suffix}");
    onboarding
        .register(username.clone(), format!("first-{suffix}@example.com"), None, "hashed-password".into())
        .await
        .unwrap();

    let second = onboarding
        .register(username, format!("second-{suffix}@example.com"), None, "hashed-password".into())
        .await;
    assert!(second.is_err());
}
