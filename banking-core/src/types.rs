//! Core domain types for the funds-movement engine.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Monetary amount. Always non-negative at the type's own boundary; sign is
/// carried by the operation (debit/credit), never by the `Money` value.
pub type Money = Decimal;

pub type UserId = Uuid;
pub type CustomerId = Uuid;
pub type AccountId = Uuid;
pub type TransactionId = Uuid;
pub type BeneficiaryId = Uuid;
pub type EftId = Uuid;

/// A capability an authenticated user may hold. Closed set per DESIGN NOTES
/// ("string-matched permission checks -> typed capabilities").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    AccountRead,
    AccountWrite,
    UserRead,
    UserWrite,
    TransactionRead,
    TransactionWrite,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Permission::AccountRead => "ACCOUNT_READ",
            Permission::AccountWrite => "ACCOUNT_WRITE",
            Permission::UserRead => "USER_READ",
            Permission::UserWrite => "USER_WRITE",
            Permission::TransactionRead => "TRANSACTION_READ",
            Permission::TransactionWrite => "TRANSACTION_WRITE",
        };
        write!(f, "{s}")
    }
}

/// A named bundle of permissions, seeded once and rarely edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: RoleName,
    pub permissions: HashSet<Permission>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleName {
    Customer,
    Accountant,
    Admin,
    Superadmin,
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RoleName::Customer => "CUSTOMER",
            RoleName::Accountant => "ACCOUNTANT",
            RoleName::Admin => "ADMIN",
            RoleName::Superadmin => "SUPERADMIN",
        };
        write!(f, "{s}")
    }
}

/// Onboarding status of a `User`. Transitions are enumerated in
/// `onboarding::UserStateMachine`; this type only carries the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    PendingDetails,
    PendingReview,
    Active,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub mobile: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub status: UserStatus,
    pub customer_id: Option<CustomerId>,
    pub roles: Vec<Role>,
}

impl User {
    pub fn permissions(&self) -> HashSet<Permission> {
        self.roles
            .iter()
            .flat_map(|r| r.permissions.iter().copied())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomerStatus {
    PendingReview,
    Active,
    Rejected,
}

/// A postal address, one of the two shapes `otherInfo` ever carries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

/// Typed replacement for the source's free-form `otherInfo` JSON blob
/// (DESIGN NOTES: "ambient ObjectMapper usage -> injected serializer").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerOtherInfo {
    pub address: Option<Address>,
    pub rejection_reason: Option<String>,
}

impl CustomerOtherInfo {
    pub fn clear_rejection(&mut self) {
        self.rejection_reason = None;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub customer_number: String,
    pub user_id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub national_id: String,
    pub status: CustomerStatus,
    pub other_info: CustomerOtherInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    Savings,
    Current,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    Active,
    Frozen,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub account_number: String,
    pub customer_id: CustomerId,
    pub account_type: AccountType,
    pub balance: Money,
    pub available_balance: Money,
    pub minimum_balance: Money,
    pub currency: String,
    pub status: AccountStatus,
    pub last_transaction_date: Option<DateTime<Utc>>,
}

impl Account {
    pub fn is_active(&self) -> bool {
        matches!(self.status, AccountStatus::Active)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Debit,
    Credit,
    Transfer,
    Withdrawal,
    Fee,
    Refund,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionCategory {
    InternalTransfer,
    Neft,
    Rtgs,
    Qr,
    BulkUpload,
    Refund,
    AdminAdjustment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub transaction_reference: String,
    pub external_reference: Option<String>,
    pub account_id: AccountId,
    pub destination_account_id: Option<AccountId>,
    pub transaction_type: TransactionType,
    pub amount: Money,
    pub currency: String,
    pub balance_before: Money,
    pub balance_after: Money,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub initiated_by: UserId,
    pub approved_by: Option<UserId>,
    pub category: TransactionCategory,
    pub bulk_upload_batch_id: Option<String>,
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BeneficiaryStatus {
    PendingVerification,
    Active,
    Blocked,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Beneficiary {
    pub id: BeneficiaryId,
    pub customer_id: CustomerId,
    pub payee_name: String,
    pub account_number: String,
    pub ifsc_code: String,
    pub bank_name: String,
    pub branch_name: Option<String>,
    pub contact: Option<String>,
    pub is_verified: bool,
    pub status: BeneficiaryStatus,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Beneficiary {
    pub fn is_eligible_eft_target(&self) -> bool {
        matches!(self.status, BeneficiaryStatus::Active)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EftType {
    Neft,
    Rtgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EftStatus {
    Pending,
    Queued,
    Processing,
    Completed,
    Failed,
}

/// Snapshot of the beneficiary fields at submit time, so a later edit to the
/// beneficiary record never mutates an in-flight or historical EFT.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeneficiarySnapshot {
    pub payee_name: String,
    pub account_number: String,
    pub ifsc_code: String,
    pub bank_name: String,
}

impl From<&Beneficiary> for BeneficiarySnapshot {
    fn from(b: &Beneficiary) -> Self {
        Self {
            payee_name: b.payee_name.clone(),
            account_number: b.account_number.clone(),
            ifsc_code: b.ifsc_code.clone(),
            bank_name: b.bank_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EftTransaction {
    pub id: EftId,
    pub eft_reference: String,
    pub eft_type: EftType,
    pub source_account_id: AccountId,
    pub beneficiary_id: BeneficiaryId,
    pub beneficiary_snapshot: BeneficiarySnapshot,
    pub amount: Money,
    pub charges: Money,
    pub total_amount: Money,
    pub status: EftStatus,
    pub batch_id: Option<String>,
    pub batch_time: Option<DateTime<Utc>>,
    pub estimated_completion: Option<DateTime<Utc>>,
    pub actual_completion: Option<DateTime<Utc>>,
    pub transaction_id: TransactionId,
    pub failure_reason: Option<String>,
    pub initiated_by: UserId,
    pub processed_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle of a one-shot QR/UPI payment intent (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QrStatus {
    Pending,
    Paid,
    Expired,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrPaymentRequest {
    pub id: Uuid,
    pub reference: String,
    pub payee_account_id: AccountId,
    pub amount: Money,
    pub currency: String,
    pub status: QrStatus,
    pub expires_at: DateTime<Utc>,
    pub created_by: UserId,
    pub paid_by_account_id: Option<AccountId>,
    pub paid_at: Option<DateTime<Utc>>,
    pub debit_transaction_id: Option<TransactionId>,
    pub credit_transaction_id: Option<TransactionId>,
    pub created_at: DateTime<Utc>,
}

impl QrPaymentRequest {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpiAliasStatus {
    Active,
    Inactive,
}

/// An injective `alias -> (user, account)` mapping (§4.6). Deregistration is
/// a soft status flip, mirroring the Beneficiary soft-delete pattern rather
/// than a hard row delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpiAlias {
    pub id: Uuid,
    pub alias: String,
    pub user_id: UserId,
    pub account_id: AccountId,
    pub status: UpiAliasStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BulkRowType {
    Debit,
    Credit,
}

/// One row of a bulk-upload file (§4.8). CSV parsing itself is out of
/// scope (§1); this is the already-parsed shape the core consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkRow {
    pub account_id: AccountId,
    pub row_type: BulkRowType,
    pub amount: Money,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkUploadReport {
    pub batch_id: String,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub errors: Vec<(usize, String)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permissions_union_across_roles() {
        let user = User {
            id: Uuid::new_v4(),
            username: "jdoe".into(),
            email: "jdoe@example.com".into(),
            mobile: None,
            password_hash: "x".into(),
            status: UserStatus::Active,
            customer_id: None,
            roles: vec![
                Role {
                    name: RoleName::Customer,
                    permissions: HashSet::from([Permission::AccountRead]),
                },
                Role {
                    name: RoleName::Accountant,
                    permissions: HashSet::from([Permission::TransactionWrite]),
                },
            ],
        };

        let perms = user.permissions();
        assert!(perms.contains(&Permission::AccountRead));
        assert!(perms.contains(&Permission::TransactionWrite));
        assert_eq!(perms.len(), 2);
    }

    #[test]
    fn beneficiary_eligibility_gate() {
        let mut b = sample_beneficiary();
        b.status = BeneficiaryStatus::PendingVerification;
        assert!(!b.is_eligible_eft_target());
        b.status = BeneficiaryStatus::Active;
        assert!(b.is_eligible_eft_target());
    }

    fn sample_beneficiary() -> Beneficiary {
        Beneficiary {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            payee_name: "Alice".into(),
            account_number: "1234567890".into(),
            ifsc_code: "HDFC0000001".into(),
            bank_name: "HDFC Bank".into(),
            branch_name: None,
            contact: None,
            is_verified: false,
            status: BeneficiaryStatus::PendingVerification,
            last_used_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}
