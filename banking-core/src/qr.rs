//! In-network, same-ledger payments (§4.6): QR payment requests and UPI
//! aliases. Both rails settle through `ledger::Ledger::internal_transfer`
//! rather than the external adapter -- money never leaves this bank.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use uuid::Uuid;

use crate::database::DatabaseClient;
use crate::ids::Clock;
use crate::ledger::Ledger;
use crate::types::*;
use crate::{Error, Result};

/// Owns QR payment-request create/satisfy and UPI alias register/resolve/
/// deregister.
pub struct QrPaymentService {
    db: Arc<DatabaseClient>,
    ledger: Arc<Ledger>,
    clock: Arc<dyn Clock>,
}

impl QrPaymentService {
    pub fn new(db: Arc<DatabaseClient>, ledger: Arc<Ledger>, clock: Arc<dyn Clock>) -> Self {
        Self { db, ledger, clock }
    }

    /// Creates a one-shot payment request (§4.6): a payee asks for `amount`,
    /// expiring `ttl` after creation. `reference` is what actually gets
    /// encoded into the QR image -- rendering the image is out of scope.
    pub async fn create_request(&self, payee_account_id: AccountId, amount: Money, currency: &str, created_by: UserId, ttl: ChronoDuration) -> Result<QrPaymentRequest> {
        if amount <= Money::ZERO {
            return Err(Error::Validation("amount must be positive".into()));
        }
        let now = self.clock.now();
        let request = QrPaymentRequest {
            id: Uuid::new_v4(),
            reference: format!("QR{}", Uuid::new_v4().simple()),
            payee_account_id,
            amount,
            currency: currency.to_string(),
            status: QrStatus::Pending,
            expires_at: now + ttl,
            created_by,
            paid_by_account_id: None,
            paid_at: None,
            debit_transaction_id: None,
            credit_transaction_id: None,
            created_at: now,
        };
        self.db.insert_qr_request(&request).await?;
        Ok(request)
    }

    /// Satisfies a pending request (§4.6): the payer's account is debited
    /// and the payee's credited in one `internal_transfer`, the request
    /// flips PAID, and a second `pay` against the same request -- whether a
    /// retry or an attacker replaying the QR code -- is rejected because the
    /// request is no longer PENDING.
    pub async fn pay(&self, request_id: Uuid, payer_account_id: AccountId, initiated_by: UserId) -> Result<QrPaymentRequest> {
        let mut request = self.db.get_qr_request(request_id).await?;

        if request.status == QrStatus::Pending && self.clock.now() >= request.expires_at {
            self.db.mark_qr_expired(request_id).await?;
            return Err(Error::Validation("payment request has expired".into()));
        }
        if request.status != QrStatus::Pending {
            return Err(Error::Validation(format!("payment request is {:?}, not PENDING", request.status)));
        }
        if payer_account_id == request.payee_account_id {
            return Err(Error::Validation("payer and payee accounts must differ".into()));
        }

        let (debit_leg, credit_leg) = self
            .ledger
            .internal_transfer(payer_account_id, request.payee_account_id, request.amount, TransactionCategory::Qr, initiated_by)
            .await?;

        let paid_at = self.clock.now();
        self.db
            .mark_qr_paid(request_id, payer_account_id, paid_at, debit_leg.id, credit_leg.id)
            .await?;

        request.status = QrStatus::Paid;
        request.paid_by_account_id = Some(payer_account_id);
        request.paid_at = Some(paid_at);
        request.debit_transaction_id = Some(debit_leg.id);
        request.credit_transaction_id = Some(credit_leg.id);
        Ok(request)
    }

    pub async fn get_request(&self, id: Uuid) -> Result<QrPaymentRequest> {
        self.db.get_qr_request(id).await
    }

    /// Registers an alias (§4.6). Aliases are globally unique and injective
    /// into `(user, account)`: the caller is expected to have already
    /// checked `resolve` returns nothing before calling this, but the
    /// database's unique index on `alias` is the actual enforcement point.
    pub async fn register_alias(&self, alias: String, user_id: UserId, account_id: AccountId) -> Result<UpiAlias> {
        if self.db.get_upi_alias(&alias).await?.is_some() {
            return Err(Error::Conflict(format!("UPI alias '{alias}' is already registered")));
        }
        let now = self.clock.now();
        let record = UpiAlias {
            id: Uuid::new_v4(),
            alias,
            user_id,
            account_id,
            status: UpiAliasStatus::Active,
            created_at: now,
            updated_at: now,
        };
        self.db.insert_upi_alias(&record).await?;
        Ok(record)
    }

    /// Resolves an alias to the account it pays into. Only `ACTIVE` aliases
    /// resolve -- a deregistered alias behaves as if it never existed.
    pub async fn resolve_alias(&self, alias: &str) -> Result<Option<AccountId>> {
        Ok(self
            .db
            .get_upi_alias(alias)
            .await?
            .filter(|a| a.status == UpiAliasStatus::Active)
            .map(|a| a.account_id))
    }

    pub async fn deregister_alias(&self, id: Uuid) -> Result<()> {
        self.db.set_upi_alias_status(id, UpiAliasStatus::Inactive).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_request(status: QrStatus, expires_at: DateTime<Utc>) -> QrPaymentRequest {
        QrPaymentRequest {
            id: Uuid::new_v4(),
            reference: "QRtest".into(),
            payee_account_id: Uuid::new_v4(),
            amount: dec!(100),
            currency: "INR".into(),
            status,
            expires_at,
            created_by: Uuid::new_v4(),
            paid_by_account_id: None,
            paid_at: None,
            debit_transaction_id: None,
            credit_transaction_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn pending_request_with_future_expiry_is_payable() {
        let request = sample_request(QrStatus::Pending, Utc::now() + ChronoDuration::minutes(5));
        assert_eq!(request.status, QrStatus::Pending);
        assert!(request.expires_at > Utc::now());
    }

    #[test]
    fn paid_request_is_not_pending() {
        let request = sample_request(QrStatus::Paid, Utc::now() + ChronoDuration::minutes(5));
        assert_ne!(request.status, QrStatus::Pending);
    }
}
