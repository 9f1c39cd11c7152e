//! Row <-> domain-type mapping. One `from_row` per entity, same shape as
//! the teacher's `database::models` module.

use tokio_postgres::Row;

use crate::types::*;
use crate::{Error, Result};

fn map_err(e: tokio_postgres::Error) -> Error {
    Error::Database(e)
}

impl User {
    pub fn from_row(row: &Row, roles: Vec<Role>) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id").map_err(map_err)?,
            username: row.try_get("username").map_err(map_err)?,
            email: row.try_get("email").map_err(map_err)?,
            mobile: row.try_get("mobile").map_err(map_err)?,
            password_hash: row.try_get("password_hash").map_err(map_err)?,
            status: parse_user_status(row.try_get("status").map_err(map_err)?)?,
            customer_id: row.try_get("customer_id").map_err(map_err)?,
            roles,
        })
    }
}

fn parse_user_status(s: &str) -> Result<UserStatus> {
    match s {
        "PENDING_DETAILS" => Ok(UserStatus::PendingDetails),
        "PENDING_REVIEW" => Ok(UserStatus::PendingReview),
        "ACTIVE" => Ok(UserStatus::Active),
        "REJECTED" => Ok(UserStatus::Rejected),
        other => Err(Error::Internal(format!("unknown user status '{other}'"))),
    }
}

impl Customer {
    pub fn from_row(row: &Row) -> Result<Self> {
        let other_info_json: Option<serde_json::Value> =
            row.try_get("other_info").map_err(map_err)?;
        let other_info = other_info_json
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| Error::Internal(format!("corrupt other_info json: {e}")))?
            .unwrap_or_default();

        Ok(Self {
            id: row.try_get("id").map_err(map_err)?,
            customer_number: row.try_get("customer_number").map_err(map_err)?,
            user_id: row.try_get("user_id").map_err(map_err)?,
            first_name: row.try_get("first_name").map_err(map_err)?,
            last_name: row.try_get("last_name").map_err(map_err)?,
            national_id: row.try_get("national_id").map_err(map_err)?,
            status: parse_customer_status(row.try_get("status").map_err(map_err)?)?,
            other_info,
        })
    }
}

fn parse_customer_status(s: &str) -> Result<CustomerStatus> {
    match s {
        "PENDING_REVIEW" => Ok(CustomerStatus::PendingReview),
        "ACTIVE" => Ok(CustomerStatus::Active),
        "REJECTED" => Ok(CustomerStatus::Rejected),
        other => Err(Error::Internal(format!("unknown customer status '{other}'"))),
    }
}

impl Account {
    pub fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id").map_err(map_err)?,
            account_number: row.try_get("account_number").map_err(map_err)?,
            customer_id: row.try_get("customer_id").map_err(map_err)?,
            account_type: parse_account_type(row.try_get("account_type").map_err(map_err)?)?,
            balance: row.try_get("balance").map_err(map_err)?,
            available_balance: row.try_get("available_balance").map_err(map_err)?,
            minimum_balance: row.try_get("minimum_balance").map_err(map_err)?,
            currency: row.try_get("currency").map_err(map_err)?,
            status: parse_account_status(row.try_get("status").map_err(map_err)?)?,
            last_transaction_date: row.try_get("last_transaction_date").map_err(map_err)?,
        })
    }
}

fn parse_account_type(s: &str) -> Result<AccountType> {
    match s {
        "SAVINGS" => Ok(AccountType::Savings),
        "CURRENT" => Ok(AccountType::Current),
        other => Err(Error::Internal(format!("unknown account type '{other}'"))),
    }
}

fn parse_account_status(s: &str) -> Result<AccountStatus> {
    match s {
        "ACTIVE" => Ok(AccountStatus::Active),
        "FROZEN" => Ok(AccountStatus::Frozen),
        "CLOSED" => Ok(AccountStatus::Closed),
        other => Err(Error::Internal(format!("unknown account status '{other}'"))),
    }
}

impl Transaction {
    pub fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id").map_err(map_err)?,
            transaction_reference: row.try_get("transaction_reference").map_err(map_err)?,
            external_reference: row.try_get("external_reference").map_err(map_err)?,
            account_id: row.try_get("account_id").map_err(map_err)?,
            destination_account_id: row.try_get("destination_account_id").map_err(map_err)?,
            transaction_type: parse_transaction_type(row.try_get("transaction_type").map_err(map_err)?)?,
            amount: row.try_get("amount").map_err(map_err)?,
            currency: row.try_get("currency").map_err(map_err)?,
            balance_before: row.try_get("balance_before").map_err(map_err)?,
            balance_after: row.try_get("balance_after").map_err(map_err)?,
            status: parse_transaction_status(row.try_get("status").map_err(map_err)?)?,
            created_at: row.try_get("created_at").map_err(map_err)?,
            completed_at: row.try_get("completed_at").map_err(map_err)?,
            initiated_by: row.try_get("initiated_by").map_err(map_err)?,
            approved_by: row.try_get("approved_by").map_err(map_err)?,
            category: parse_transaction_category(row.try_get("category").map_err(map_err)?)?,
            bulk_upload_batch_id: row.try_get("bulk_upload_batch_id").map_err(map_err)?,
            failure_reason: row.try_get("failure_reason").map_err(map_err)?,
        })
    }
}

fn parse_transaction_type(s: &str) -> Result<TransactionType> {
    match s {
        "DEBIT" => Ok(TransactionType::Debit),
        "CREDIT" => Ok(TransactionType::Credit),
        "TRANSFER" => Ok(TransactionType::Transfer),
        "WITHDRAWAL" => Ok(TransactionType::Withdrawal),
        "FEE" => Ok(TransactionType::Fee),
        "REFUND" => Ok(TransactionType::Refund),
        other => Err(Error::Internal(format!("unknown transaction type '{other}'"))),
    }
}

fn parse_transaction_status(s: &str) -> Result<TransactionStatus> {
    match s {
        "PENDING" => Ok(TransactionStatus::Pending),
        "PROCESSING" => Ok(TransactionStatus::Processing),
        "COMPLETED" => Ok(TransactionStatus::Completed),
        "FAILED" => Ok(TransactionStatus::Failed),
        other => Err(Error::Internal(format!("unknown transaction status '{other}'"))),
    }
}

fn parse_transaction_category(s: &str) -> Result<TransactionCategory> {
    match s {
        "INTERNAL_TRANSFER" => Ok(TransactionCategory::InternalTransfer),
        "NEFT" => Ok(TransactionCategory::Neft),
        "RTGS" => Ok(TransactionCategory::Rtgs),
        "QR" => Ok(TransactionCategory::Qr),
        "BULK_UPLOAD" => Ok(TransactionCategory::BulkUpload),
        "REFUND" => Ok(TransactionCategory::Refund),
        "ADMIN_ADJUSTMENT" => Ok(TransactionCategory::AdminAdjustment),
        other => Err(Error::Internal(format!("unknown transaction category '{other}'"))),
    }
}

impl Beneficiary {
    pub fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id").map_err(map_err)?,
            customer_id: row.try_get("customer_id").map_err(map_err)?,
            payee_name: row.try_get("payee_name").map_err(map_err)?,
            account_number: row.try_get("account_number").map_err(map_err)?,
            ifsc_code: row.try_get("ifsc_code").map_err(map_err)?,
            bank_name: row.try_get("bank_name").map_err(map_err)?,
            branch_name: row.try_get("branch_name").map_err(map_err)?,
            contact: row.try_get("contact").map_err(map_err)?,
            is_verified: row.try_get("is_verified").map_err(map_err)?,
            status: parse_beneficiary_status(row.try_get("status").map_err(map_err)?)?,
            last_used_at: row.try_get("last_used_at").map_err(map_err)?,
            created_at: row.try_get("created_at").map_err(map_err)?,
            updated_at: row.try_get("updated_at").map_err(map_err)?,
        })
    }
}

fn parse_beneficiary_status(s: &str) -> Result<BeneficiaryStatus> {
    match s {
        "PENDING_VERIFICATION" => Ok(BeneficiaryStatus::PendingVerification),
        "ACTIVE" => Ok(BeneficiaryStatus::Active),
        "BLOCKED" => Ok(BeneficiaryStatus::Blocked),
        "INACTIVE" => Ok(BeneficiaryStatus::Inactive),
        other => Err(Error::Internal(format!("unknown beneficiary status '{other}'"))),
    }
}

impl EftTransaction {
    pub fn from_row(row: &Row) -> Result<Self> {
        let snapshot_json: serde_json::Value = row.try_get("beneficiary_snapshot").map_err(map_err)?;
        let beneficiary_snapshot = serde_json::from_value(snapshot_json)
            .map_err(|e| Error::Internal(format!("corrupt beneficiary_snapshot json: {e}")))?;

        Ok(Self {
            id: row.try_get("id").map_err(map_err)?,
            eft_reference: row.try_get("eft_reference").map_err(map_err)?,
            eft_type: parse_eft_type(row.try_get("eft_type").map_err(map_err)?)?,
            source_account_id: row.try_get("source_account_id").map_err(map_err)?,
            beneficiary_id: row.try_get("beneficiary_id").map_err(map_err)?,
            beneficiary_snapshot,
            amount: row.try_get("amount").map_err(map_err)?,
            charges: row.try_get("charges").map_err(map_err)?,
            total_amount: row.try_get("total_amount").map_err(map_err)?,
            status: parse_eft_status(row.try_get("status").map_err(map_err)?)?,
            batch_id: row.try_get("batch_id").map_err(map_err)?,
            batch_time: row.try_get("batch_time").map_err(map_err)?,
            estimated_completion: row.try_get("estimated_completion").map_err(map_err)?,
            actual_completion: row.try_get("actual_completion").map_err(map_err)?,
            transaction_id: row.try_get("transaction_id").map_err(map_err)?,
            failure_reason: row.try_get("failure_reason").map_err(map_err)?,
            initiated_by: row.try_get("initiated_by").map_err(map_err)?,
            processed_by: row.try_get("processed_by").map_err(map_err)?,
            created_at: row.try_get("created_at").map_err(map_err)?,
        })
    }
}

fn parse_eft_type(s: &str) -> Result<EftType> {
    match s {
        "NEFT" => Ok(EftType::Neft),
        "RTGS" => Ok(EftType::Rtgs),
        other => Err(Error::Internal(format!("unknown EFT type '{other}'"))),
    }
}

fn parse_eft_status(s: &str) -> Result<EftStatus> {
    match s {
        "PENDING" => Ok(EftStatus::Pending),
        "QUEUED" => Ok(EftStatus::Queued),
        "PROCESSING" => Ok(EftStatus::Processing),
        "COMPLETED" => Ok(EftStatus::Completed),
        "FAILED" => Ok(EftStatus::Failed),
        other => Err(Error::Internal(format!("unknown EFT status '{other}'"))),
    }
}

impl QrPaymentRequest {
    pub fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id").map_err(map_err)?,
            reference: row.try_get("reference").map_err(map_err)?,
            payee_account_id: row.try_get("payee_account_id").map_err(map_err)?,
            amount: row.try_get("amount").map_err(map_err)?,
            currency: row.try_get("currency").map_err(map_err)?,
            status: parse_qr_status(row.try_get("status").map_err(map_err)?)?,
            expires_at: row.try_get("expires_at").map_err(map_err)?,
            created_by: row.try_get("created_by").map_err(map_err)?,
            paid_by_account_id: row.try_get("paid_by_account_id").map_err(map_err)?,
            paid_at: row.try_get("paid_at").map_err(map_err)?,
            debit_transaction_id: row.try_get("debit_transaction_id").map_err(map_err)?,
            credit_transaction_id: row.try_get("credit_transaction_id").map_err(map_err)?,
            created_at: row.try_get("created_at").map_err(map_err)?,
        })
    }
}

fn parse_qr_status(s: &str) -> Result<QrStatus> {
    match s {
        "PENDING" => Ok(QrStatus::Pending),
        "PAID" => Ok(QrStatus::Paid),
        "EXPIRED" => Ok(QrStatus::Expired),
        "CANCELLED" => Ok(QrStatus::Cancelled),
        other => Err(Error::Internal(format!("unknown QR status '{other}'"))),
    }
}

impl UpiAlias {
    pub fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id").map_err(map_err)?,
            alias: row.try_get("alias").map_err(map_err)?,
            user_id: row.try_get("user_id").map_err(map_err)?,
            account_id: row.try_get("account_id").map_err(map_err)?,
            status: parse_upi_status(row.try_get("status").map_err(map_err)?)?,
            created_at: row.try_get("created_at").map_err(map_err)?,
            updated_at: row.try_get("updated_at").map_err(map_err)?,
        })
    }
}

fn parse_upi_status(s: &str) -> Result<UpiAliasStatus> {
    match s {
        "ACTIVE" => Ok(UpiAliasStatus::Active),
        "INACTIVE" => Ok(UpiAliasStatus::Inactive),
        other => Err(Error::Internal(format!("unknown UPI alias status '{other}'"))),
    }
}
