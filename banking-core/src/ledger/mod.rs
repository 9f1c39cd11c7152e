//! The atomic ledger. Every balance-moving operation in the crate -- internal
//! transfer, QR settlement, NEFT/RTGS hold-and-settle, refund compensation --
//! bottoms out here, inside a single `tokio_postgres::Transaction` opened at
//! default (serializable-equivalent, single-row-locked) isolation, the same
//! single-unit-of-work shape the reference settlement engine composes its
//! steps in.
//!
//! Sole authority over `Account.balance`, `Account.available_balance`, and
//! the `Transaction` journal (§4.1). Nothing outside this module writes
//! either field.

use std::sync::Arc;

use deadpool_postgres::Pool;
use tokio_postgres::Transaction as PgTransaction;
use uuid::Uuid;

use crate::database::DatabaseClient;
use crate::ids::{self, Clock};
use crate::types::*;
use crate::{Error, Result};

pub struct Ledger {
    db: Arc<DatabaseClient>,
    clock: Arc<dyn Clock>,
}

/// The resolution of a previously placed hold. `Commit` lands the hold's
/// amount into `balance` (it was already subtracted from
/// `available_balance` at hold time); `Fail` restores `available_balance`
/// and leaves `balance` untouched.
#[derive(Debug, Clone)]
pub enum HoldOutcome {
    Commit,
    Fail(String),
}

impl Ledger {
    pub fn new(db: Arc<DatabaseClient>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    fn pool(&self) -> &Pool {
        self.db.pool()
    }

    /// Checks out a fresh pooled connection. Callers open a transaction on
    /// it via `.transaction()` and commit it themselves, so a caller
    /// composing several ledger calls within one request shares a single
    /// unit of work (DESIGN NOTES §9, "explicit unit-of-work").
    async fn begin(&self) -> Result<deadpool_postgres::Client> {
        self.pool().get().await.map_err(Error::Pool)
    }

    #[allow(clippy::too_many_arguments)]
    fn new_transaction_row(
        &self,
        account_id: AccountId,
        destination_account_id: Option<AccountId>,
        transaction_type: TransactionType,
        category: TransactionCategory,
        amount: Money,
        currency: &str,
        balance_before: Money,
        balance_after: Money,
        status: TransactionStatus,
        initiated_by: UserId,
        external_reference: Option<String>,
    ) -> Transaction {
        self.new_transaction_row_with_batch(
            account_id,
            destination_account_id,
            transaction_type,
            category,
            amount,
            currency,
            balance_before,
            balance_after,
            status,
            initiated_by,
            external_reference,
            None,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn new_transaction_row_with_batch(
        &self,
        account_id: AccountId,
        destination_account_id: Option<AccountId>,
        transaction_type: TransactionType,
        category: TransactionCategory,
        amount: Money,
        currency: &str,
        balance_before: Money,
        balance_after: Money,
        status: TransactionStatus,
        initiated_by: UserId,
        external_reference: Option<String>,
        bulk_upload_batch_id: Option<String>,
    ) -> Transaction {
        let now = self.clock.now();
        Transaction {
            id: Uuid::new_v4(),
            transaction_reference: ids::transaction_reference(),
            external_reference,
            account_id,
            destination_account_id,
            transaction_type,
            amount,
            currency: currency.to_string(),
            balance_before,
            balance_after,
            status,
            created_at: now,
            completed_at: matches!(status, TransactionStatus::Completed | TransactionStatus::Failed).then_some(now),
            initiated_by,
            approved_by: None,
            category,
            bulk_upload_batch_id,
            failure_reason: None,
        }
    }

    /// Immediate debit: both `balance` and `available_balance` drop in one
    /// step. Used for internal transfers and bulk-upload rows, where there
    /// is no external leg to hold funds against.
    #[allow(clippy::too_many_arguments)]
    async fn apply_debit(
        &self,
        pg_tx: &PgTransaction<'_>,
        account_id: AccountId,
        amount: Money,
        transaction_type: TransactionType,
        category: TransactionCategory,
        initiated_by: UserId,
        external_reference: Option<String>,
    ) -> Result<Transaction> {
        self.apply_debit_with_batch(pg_tx, account_id, amount, transaction_type, category, initiated_by, external_reference, None)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn apply_debit_with_batch(
        &self,
        pg_tx: &PgTransaction<'_>,
        account_id: AccountId,
        amount: Money,
        transaction_type: TransactionType,
        category: TransactionCategory,
        initiated_by: UserId,
        external_reference: Option<String>,
        bulk_upload_batch_id: Option<String>,
    ) -> Result<Transaction> {
        let account = self.db.get_account_for_update(pg_tx, account_id).await?;
        if !account.is_active() {
            return Err(Error::AccountNotActive);
        }
        let new_available = account.available_balance - amount;
        if new_available < Money::ZERO {
            return Err(Error::InsufficientFunds);
        }
        let new_balance = account.balance - amount;
        if new_balance < account.minimum_balance {
            return Err(Error::MinBalanceBreach);
        }

        self.db
            .update_account_balance(pg_tx, account_id, new_balance, new_available, self.clock.now())
            .await?;

        let txn = self.new_transaction_row_with_batch(
            account_id,
            None,
            transaction_type,
            category,
            amount,
            &account.currency,
            account.balance,
            new_balance,
            TransactionStatus::Completed,
            initiated_by,
            external_reference,
            bulk_upload_batch_id,
        );
        self.db.insert_transaction(pg_tx, &txn).await?;
        Ok(txn)
    }

    /// Credits `account_id`. Crediting a frozen/closed account is still
    /// rejected: funds cannot land in an account that cannot be used.
    #[allow(clippy::too_many_arguments)]
    async fn apply_credit(
        &self,
        pg_tx: &PgTransaction<'_>,
        account_id: AccountId,
        amount: Money,
        transaction_type: TransactionType,
        category: TransactionCategory,
        initiated_by: UserId,
        external_reference: Option<String>,
    ) -> Result<Transaction> {
        self.apply_credit_with_batch(pg_tx, account_id, amount, transaction_type, category, initiated_by, external_reference, None)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn apply_credit_with_batch(
        &self,
        pg_tx: &PgTransaction<'_>,
        account_id: AccountId,
        amount: Money,
        transaction_type: TransactionType,
        category: TransactionCategory,
        initiated_by: UserId,
        external_reference: Option<String>,
        bulk_upload_batch_id: Option<String>,
    ) -> Result<Transaction> {
        let account = self.db.get_account_for_update(pg_tx, account_id).await?;
        if !account.is_active() {
            return Err(Error::AccountNotActive);
        }
        let new_balance = account.balance + amount;
        let new_available = account.available_balance + amount;

        self.db
            .update_account_balance(pg_tx, account_id, new_balance, new_available, self.clock.now())
            .await?;

        let txn = self.new_transaction_row_with_batch(
            account_id,
            None,
            transaction_type,
            category,
            amount,
            &account.currency,
            account.balance,
            new_balance,
            TransactionStatus::Completed,
            initiated_by,
            external_reference,
            bulk_upload_batch_id,
        );
        self.db.insert_transaction(pg_tx, &txn).await?;
        Ok(txn)
    }

    /// A standalone, immediate debit (e.g. a bulk-upload row or an admin
    /// adjustment) -- not part of a larger composite operation.
    pub async fn debit(
        &self,
        account_id: AccountId,
        amount: Money,
        category: TransactionCategory,
        initiated_by: UserId,
    ) -> Result<Transaction> {
        if amount <= Money::ZERO {
            return Err(Error::Validation("amount must be positive".into()));
        }
        let mut client = self.begin().await?;
        let pg_tx = client.transaction().await.map_err(Error::Database)?;
        let txn = self
            .apply_debit(&pg_tx, account_id, amount, TransactionType::Debit, category, initiated_by, None)
            .await?;
        pg_tx.commit().await.map_err(Error::Database)?;
        Ok(txn)
    }

    /// A standalone, immediate credit.
    pub async fn credit(
        &self,
        account_id: AccountId,
        amount: Money,
        category: TransactionCategory,
        initiated_by: UserId,
    ) -> Result<Transaction> {
        if amount <= Money::ZERO {
            return Err(Error::Validation("amount must be positive".into()));
        }
        let mut client = self.begin().await?;
        let pg_tx = client.transaction().await.map_err(Error::Database)?;
        let txn = self
            .apply_credit(&pg_tx, account_id, amount, TransactionType::Credit, category, initiated_by, None)
            .await?;
        pg_tx.commit().await.map_err(Error::Database)?;
        Ok(txn)
    }

    /// Moves `amount` from `source_id` to `dest_id` in one unit of work.
    /// Locks both accounts `FOR UPDATE` in ascending id order (deadlock
    /// avoidance, §5) so a concurrent transfer running the other way can
    /// never hold the opposite lock order.
    pub async fn internal_transfer(
        &self,
        source_id: AccountId,
        dest_id: AccountId,
        amount: Money,
        category: TransactionCategory,
        initiated_by: UserId,
    ) -> Result<(Transaction, Transaction)> {
        if amount <= Money::ZERO {
            return Err(Error::Validation("transfer amount must be positive".into()));
        }
        if source_id == dest_id {
            return Err(Error::Validation("source and destination accounts must differ".into()));
        }

        let mut client = self.begin().await?;
        let pg_tx = client.transaction().await.map_err(Error::Database)?;

        let (first, second) = if source_id < dest_id { (source_id, dest_id) } else { (dest_id, source_id) };
        self.db.get_account_for_update(&pg_tx, first).await?;
        self.db.get_account_for_update(&pg_tx, second).await?;

        let shared_reference = ids::transaction_reference();

        let debit_leg = self
            .apply_debit(
                &pg_tx,
                source_id,
                amount,
                TransactionType::Transfer,
                category,
                initiated_by,
                Some(shared_reference.clone()),
            )
            .await?;
        let credit_leg = self
            .apply_credit(
                &pg_tx,
                dest_id,
                amount,
                TransactionType::Transfer,
                category,
                initiated_by,
                Some(shared_reference),
            )
            .await?;

        pg_tx.commit().await.map_err(Error::Database)?;
        Ok((debit_leg, credit_leg))
    }

    /// Places a hold: `available_balance` drops by `amount` but `balance`
    /// does not move yet, and the journal row is written PROCESSING rather
    /// than COMPLETED (§4.1 `debit(..., holdOnly=true)`). Used by NEFT/RTGS
    /// to reserve the full `totalAmount` (transfer + charges) synchronously
    /// at submit time, before the external leg runs.
    pub async fn hold_debit(
        &self,
        account_id: AccountId,
        amount: Money,
        category: TransactionCategory,
        initiated_by: UserId,
        external_reference: Option<String>,
    ) -> Result<Transaction> {
        if amount <= Money::ZERO {
            return Err(Error::Validation("hold amount must be positive".into()));
        }

        let mut client = self.begin().await?;
        let pg_tx = client.transaction().await.map_err(Error::Database)?;

        let account = self.db.get_account_for_update(&pg_tx, account_id).await?;
        if !account.is_active() {
            return Err(Error::AccountNotActive);
        }
        let new_available = account.available_balance - amount;
        if new_available < Money::ZERO {
            return Err(Error::InsufficientFunds);
        }
        let new_balance_if_committed = account.balance - amount;
        if new_balance_if_committed < account.minimum_balance {
            return Err(Error::MinBalanceBreach);
        }

        self.db
            .update_account_balance(&pg_tx, account_id, account.balance, new_available, self.clock.now())
            .await?;

        let txn = self.new_transaction_row(
            account_id,
            None,
            TransactionType::Debit,
            category,
            amount,
            &account.currency,
            account.balance,
            account.balance, // catches up to `balance - amount` only when the hold commits
            TransactionStatus::Processing,
            initiated_by,
            external_reference,
        );
        self.db.insert_transaction(&pg_tx, &txn).await?;
        pg_tx.commit().await.map_err(Error::Database)?;
        Ok(txn)
    }

    /// Resolves a hold placed by `hold_debit`. On `Commit`, posts the
    /// already-reduced `available_balance` into `balance` and flips the row
    /// COMPLETED. On `Fail`, restores `available_balance` and flips the row
    /// FAILED with `reason` -- the caller (NEFT/RTGS) is responsible for
    /// posting the compensating REFUND separately only when the debit had
    /// already committed to `balance` (it never does here, since this path
    /// only ever fails a hold that has not yet committed).
    pub async fn settle_hold(&self, processing: &Transaction, outcome: HoldOutcome) -> Result<Transaction> {
        if processing.status != TransactionStatus::Processing {
            return Err(Error::InvalidEftState(format!(
                "transaction {} is not PROCESSING",
                processing.transaction_reference
            )));
        }

        let mut client = self.begin().await?;
        let pg_tx = client.transaction().await.map_err(Error::Database)?;

        let account = self.db.get_account_for_update(&pg_tx, processing.account_id).await?;

        let (new_balance, new_available, status, failure_reason) = match &outcome {
            HoldOutcome::Commit => {
                let new_balance = account.balance - processing.amount;
                (new_balance, account.available_balance, TransactionStatus::Completed, None)
            }
            HoldOutcome::Fail(reason) => {
                let restored_available = account.available_balance + processing.amount;
                (account.balance, restored_available, TransactionStatus::Failed, Some(reason.clone()))
            }
        };

        self.db
            .update_account_balance(&pg_tx, account.id, new_balance, new_available, self.clock.now())
            .await?;
        let completed_at = self.clock.now();
        self.db
            .update_transaction_completion(&pg_tx, processing.id, status, new_balance, completed_at, failure_reason.as_deref())
            .await?;

        pg_tx.commit().await.map_err(Error::Database)?;

        Ok(Transaction {
            status,
            balance_after: new_balance,
            completed_at: Some(completed_at),
            failure_reason,
            ..processing.clone()
        })
    }

    /// Compensating credit for a debit that must be reversed: the original
    /// hold already committed to `balance` (settle_hold(Commit) ran) and
    /// the external leg later turned out to have failed, or the hold's own
    /// `settle_hold(Fail)` only restored `available_balance` and the rail
    /// needs the money back in hand either way. Credits `original.amount`
    /// back onto `original.account_id`.
    pub async fn post_refund(&self, original: &Transaction) -> Result<Transaction> {
        let mut client = self.begin().await?;
        let pg_tx = client.transaction().await.map_err(Error::Database)?;

        let txn = self
            .apply_credit(
                &pg_tx,
                original.account_id,
                original.amount,
                TransactionType::Refund,
                TransactionCategory::Refund,
                original.initiated_by,
                original.external_reference.clone(),
            )
            .await?;

        pg_tx.commit().await.map_err(Error::Database)?;
        Ok(txn)
    }

    pub async fn get_account(&self, id: AccountId) -> Result<Account> {
        self.db.get_account(id).await
    }

    pub async fn get_transaction(&self, id: TransactionId) -> Result<Transaction> {
        self.db.get_transaction(id).await
    }

    pub async fn get_transaction_by_reference(&self, reference: &str) -> Result<Option<Transaction>> {
        self.db.get_transaction_by_reference(reference).await
    }

    pub async fn transaction_history(&self, account_id: AccountId, limit: i64) -> Result<Vec<Transaction>> {
        self.db.list_transactions_for_account(account_id, limit).await
    }

    /// A single row of a bulk-upload file (§4.8): an immediate debit stamped
    /// with the batch's `bulk_upload_batch_id` so every row in one submitted
    /// file can be queried back together. One row's failure does not touch
    /// any other row -- each call is its own unit of work, matching
    /// `bulk::BulkUploadService::process`'s row-by-row loop.
    pub async fn bulk_debit(
        &self,
        account_id: AccountId,
        amount: Money,
        initiated_by: UserId,
        batch_id: &str,
    ) -> Result<Transaction> {
        if amount <= Money::ZERO {
            return Err(Error::Validation("amount must be positive".into()));
        }
        let mut client = self.begin().await?;
        let pg_tx = client.transaction().await.map_err(Error::Database)?;
        let txn = self
            .apply_debit_with_batch(
                &pg_tx,
                account_id,
                amount,
                TransactionType::Debit,
                TransactionCategory::BulkUpload,
                initiated_by,
                None,
                Some(batch_id.to_string()),
            )
            .await?;
        pg_tx.commit().await.map_err(Error::Database)?;
        Ok(txn)
    }

    pub async fn bulk_credit(
        &self,
        account_id: AccountId,
        amount: Money,
        initiated_by: UserId,
        batch_id: &str,
    ) -> Result<Transaction> {
        if amount <= Money::ZERO {
            return Err(Error::Validation("amount must be positive".into()));
        }
        let mut client = self.begin().await?;
        let pg_tx = client.transaction().await.map_err(Error::Database)?;
        let txn = self
            .apply_credit_with_batch(
                &pg_tx,
                account_id,
                amount,
                TransactionType::Credit,
                TransactionCategory::BulkUpload,
                initiated_by,
                None,
                Some(batch_id.to_string()),
            )
            .await?;
        pg_tx.commit().await.map_err(Error::Database)?;
        Ok(txn)
    }
}

#[cfg(test)]
mod tests {
    //! These exercise the pure validation/arithmetic paths. The
    //! transaction-boundary paths (`internal_transfer`, `hold_debit`,
    //! `settle_hold`) need a live pool and are covered in
    //! `tests/ledger_tests.rs`.
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_account(balance: Money) -> Account {
        Account {
            id: Uuid::new_v4(),
            account_number: "000000000001".into(),
            customer_id: Uuid::new_v4(),
            account_type: AccountType::Savings,
            balance,
            available_balance: balance,
            minimum_balance: dec!(0),
            currency: "INR".into(),
            status: AccountStatus::Active,
            last_transaction_date: None,
        }
    }

    #[test]
    fn insufficient_funds_is_detected_before_any_write() {
        let account = sample_account(dec!(100));
        let amount = dec!(150);
        assert!(account.available_balance - amount < Money::ZERO);
    }

    #[test]
    fn min_balance_breach_is_distinct_from_insufficient_funds() {
        let mut account = sample_account(dec!(100));
        account.minimum_balance = dec!(50);
        let amount = dec!(60);
        let remaining = account.available_balance - amount;
        assert!(remaining >= Money::ZERO);
        assert!(remaining < account.minimum_balance);
    }

    #[test]
    fn frozen_account_is_not_active() {
        let mut account = sample_account(dec!(100));
        account.status = AccountStatus::Frozen;
        assert!(!account.is_active());
    }

    #[test]
    fn hold_then_fail_restores_available_without_touching_balance() {
        let account = sample_account(dec!(15_000));
        let hold_amount = dec!(5_002.50);
        let available_after_hold = account.available_balance - hold_amount;
        assert_eq!(available_after_hold, dec!(9_997.50));
        let available_after_fail = available_after_hold + hold_amount;
        assert_eq!(available_after_fail, account.available_balance);
    }

    #[test]
    fn hold_then_commit_moves_balance_by_the_held_amount() {
        let account = sample_account(dec!(15_000));
        let hold_amount = dec!(5_002.50);
        let balance_after_commit = account.balance - hold_amount;
        assert_eq!(balance_after_commit, dec!(9_997.50));
    }

    proptest::proptest! {
        #[test]
        fn debit_then_credit_conserves_total(
            balance_a in 0i64..1_000_000,
            balance_b in 0i64..1_000_000,
            amount in 1i64..1_000_000,
        ) {
            let before_total = balance_a + balance_b;
            let (new_a, new_b) = if amount <= balance_a {
                (balance_a - amount, balance_b + amount)
            } else {
                (balance_a, balance_b)
            };
            let after_total = new_a + new_b;
            proptest::prop_assert_eq!(before_total, after_total);
        }
    }
}
