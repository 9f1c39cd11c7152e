pub mod models;

use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::{NoTls, Transaction};
use tracing::info;
use uuid::Uuid;

use crate::types::*;
use crate::{Error, Result};

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Pooled PostgreSQL client. Every multi-step operation (ledger postings,
/// state transitions) borrows a `tokio_postgres::Transaction` from a
/// connection this client hands out, rather than issuing statements one at
/// a time against the pool -- see `ledger::Ledger` for the transaction
/// boundary.
pub struct DatabaseClient {
    pool: Pool,
}

impl DatabaseClient {
    pub async fn new(database_url: &str, max_connections: usize) -> Result<Self> {
        info!("Connecting to database at {}", database_url);

        let config = database_url
            .parse::<tokio_postgres::Config>()
            .map_err(|e| Error::Internal(format!("invalid database url: {e}")))?;

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        let manager = Manager::from_config(config, NoTls, mgr_config);

        let pool = Pool::builder(manager)
            .max_size(max_connections)
            .build()
            .map_err(|e| Error::Internal(format!("failed to create connection pool: {e}")))?;

        let client = pool.get().await.map_err(Error::Pool)?;
        client.query_one("SELECT 1", &[]).await.map_err(Error::Database)?;
        info!("Successfully connected to database");

        Ok(Self { pool })
    }

    /// Run the embedded `migrations/` SQL scripts. Idempotent: refinery
    /// tracks applied versions in its own schema history table.
    pub async fn run_migrations(&mut self) -> Result<()> {
        let mut client = self.pool.get().await.map_err(Error::Pool)?;
        let report = embedded::migrations::runner()
            .run_async(&mut **client)
            .await
            .map_err(|e| Error::Internal(format!("migration failed: {e}")))?;
        info!("Applied {} migration(s)", report.applied_migrations().len());
        Ok(())
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    // --- accounts ---------------------------------------------------

    /// Locks the row for the duration of `tx`. Callers that touch two
    /// accounts must always lock in ascending `AccountId` order to avoid
    /// deadlocking against a concurrent transfer running the other way.
    pub async fn get_account_for_update(&self, tx: &Transaction<'_>, id: AccountId) -> Result<Account> {
        let row = tx
            .query_opt("SELECT * FROM accounts WHERE id = $1 FOR UPDATE", &[&id])
            .await
            .map_err(Error::Database)?
            .ok_or_else(|| Error::NotFound(format!("account {id}")))?;
        Account::from_row(&row)
    }

    pub async fn get_account(&self, id: AccountId) -> Result<Account> {
        let client = self.pool.get().await.map_err(Error::Pool)?;
        let row = client
            .query_opt("SELECT * FROM accounts WHERE id = $1", &[&id])
            .await
            .map_err(Error::Database)?
            .ok_or_else(|| Error::NotFound(format!("account {id}")))?;
        Account::from_row(&row)
    }

    /// Looks an account up by its customer-facing `account_number` rather
    /// than its internal id -- what `/transactions/history/{accountNumber}`
    /// and friends actually have in hand (§6).
    pub async fn get_account_by_number(&self, account_number: &str) -> Result<Account> {
        let client = self.pool.get().await.map_err(Error::Pool)?;
        let row = client
            .query_opt("SELECT * FROM accounts WHERE account_number = $1", &[&account_number])
            .await
            .map_err(Error::Database)?
            .ok_or_else(|| Error::NotFound(format!("account {account_number}")))?;
        Account::from_row(&row)
    }

    pub async fn list_accounts_for_customer(&self, customer_id: CustomerId) -> Result<Vec<Account>> {
        let client = self.pool.get().await.map_err(Error::Pool)?;
        let rows = client
            .query(
                "SELECT * FROM accounts WHERE customer_id = $1 ORDER BY account_number",
                &[&customer_id],
            )
            .await
            .map_err(Error::Database)?;
        rows.iter().map(Account::from_row).collect()
    }

    pub async fn update_account_balance(
        &self,
        tx: &Transaction<'_>,
        id: AccountId,
        balance: Money,
        available_balance: Money,
        last_transaction_date: chrono::DateTime<chrono::Utc>,
    ) -> Result<()> {
        tx.execute(
            "UPDATE accounts SET balance = $2, available_balance = $3, last_transaction_date = $4 WHERE id = $1",
            &[&id, &balance, &available_balance, &last_transaction_date],
        )
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    pub async fn insert_account(&self, tx: &Transaction<'_>, account: &Account) -> Result<()> {
        tx.execute(
            "INSERT INTO accounts
             (id, account_number, customer_id, account_type, balance, available_balance, minimum_balance, currency, status, last_transaction_date)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            &[
                &account.id,
                &account.account_number,
                &account.customer_id,
                &account_type_str(account.account_type),
                &account.balance,
                &account.available_balance,
                &account.minimum_balance,
                &account.currency,
                &account_status_str(account.status),
                &account.last_transaction_date,
            ],
        )
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    // --- transactions -------------------------------------------------

    pub async fn insert_transaction(&self, tx: &Transaction<'_>, txn: &crate::types::Transaction) -> Result<()> {
        tx.execute(
            "INSERT INTO transactions
             (id, transaction_reference, external_reference, account_id, destination_account_id, transaction_type,
              amount, currency, balance_before, balance_after, status, created_at, completed_at, initiated_by,
              approved_by, category, bulk_upload_batch_id, failure_reason)
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18)
             ON CONFLICT (transaction_reference) DO NOTHING",
            &[
                &txn.id,
                &txn.transaction_reference,
                &txn.external_reference,
                &txn.account_id,
                &txn.destination_account_id,
                &transaction_type_str(txn.transaction_type),
                &txn.amount,
                &txn.currency,
                &txn.balance_before,
                &txn.balance_after,
                &transaction_status_str(txn.status),
                &txn.created_at,
                &txn.completed_at,
                &txn.initiated_by,
                &txn.approved_by,
                &transaction_category_str(txn.category),
                &txn.bulk_upload_batch_id,
                &txn.failure_reason,
            ],
        )
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    pub async fn get_transaction_by_reference(&self, reference: &str) -> Result<Option<crate::types::Transaction>> {
        let client = self.pool.get().await.map_err(Error::Pool)?;
        let row = client
            .query_opt(
                "SELECT * FROM transactions WHERE transaction_reference = $1",
                &[&reference],
            )
            .await
            .map_err(Error::Database)?;
        row.as_ref().map(crate::types::Transaction::from_row).transpose()
    }

    pub async fn get_transaction(&self, id: TransactionId) -> Result<crate::types::Transaction> {
        let client = self.pool.get().await.map_err(Error::Pool)?;
        let row = client
            .query_opt("SELECT * FROM transactions WHERE id = $1", &[&id])
            .await
            .map_err(Error::Database)?
            .ok_or_else(|| Error::NotFound(format!("transaction {id}")))?;
        crate::types::Transaction::from_row(&row)
    }

    pub async fn list_transactions_for_account(&self, account_id: AccountId, limit: i64) -> Result<Vec<crate::types::Transaction>> {
        let client = self.pool.get().await.map_err(Error::Pool)?;
        let rows = client
            .query(
                "SELECT * FROM transactions WHERE account_id = $1 OR destination_account_id = $1
                 ORDER BY created_at DESC LIMIT $2",
                &[&account_id, &limit],
            )
            .await
            .map_err(Error::Database)?;
        rows.iter().map(crate::types::Transaction::from_row).collect()
    }

    /// Flips a PROCESSING hold to its terminal status (COMPLETED/FAILED) and
    /// stamps the final `balance_after` -- `ledger::Ledger::settle_hold`'s
    /// only write.
    pub async fn update_transaction_completion(
        &self,
        tx: &Transaction<'_>,
        id: TransactionId,
        status: TransactionStatus,
        balance_after: Money,
        completed_at: chrono::DateTime<chrono::Utc>,
        failure_reason: Option<&str>,
    ) -> Result<()> {
        tx.execute(
            "UPDATE transactions SET status = $2, balance_after = $3, completed_at = $4, failure_reason = $5 WHERE id = $1",
            &[&id, &transaction_status_str(status), &balance_after, &completed_at, &failure_reason],
        )
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    // --- beneficiaries --------------------------------------------------

    pub async fn insert_beneficiary(&self, beneficiary: &Beneficiary) -> Result<()> {
        let client = self.pool.get().await.map_err(Error::Pool)?;
        client
            .execute(
                "INSERT INTO beneficiaries
                 (id, customer_id, payee_name, account_number, ifsc_code, bank_name, branch_name, contact,
                  is_verified, status, last_used_at, created_at, updated_at)
                 VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13)",
                &[
                    &beneficiary.id,
                    &beneficiary.customer_id,
                    &beneficiary.payee_name,
                    &beneficiary.account_number,
                    &beneficiary.ifsc_code,
                    &beneficiary.bank_name,
                    &beneficiary.branch_name,
                    &beneficiary.contact,
                    &beneficiary.is_verified,
                    &beneficiary_status_str(beneficiary.status),
                    &beneficiary.last_used_at,
                    &beneficiary.created_at,
                    &beneficiary.updated_at,
                ],
            )
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    pub async fn find_beneficiary_by_account_and_ifsc(
        &self,
        customer_id: CustomerId,
        account_number: &str,
        ifsc_code: &str,
    ) -> Result<Option<Beneficiary>> {
        let client = self.pool.get().await.map_err(Error::Pool)?;
        let row = client
            .query_opt(
                "SELECT * FROM beneficiaries WHERE customer_id = $1 AND account_number = $2 AND ifsc_code = $3",
                &[&customer_id, &account_number, &ifsc_code],
            )
            .await
            .map_err(Error::Database)?;
        row.as_ref().map(Beneficiary::from_row).transpose()
    }

    pub async fn get_beneficiary(&self, id: BeneficiaryId) -> Result<Beneficiary> {
        let client = self.pool.get().await.map_err(Error::Pool)?;
        let row = client
            .query_opt("SELECT * FROM beneficiaries WHERE id = $1", &[&id])
            .await
            .map_err(Error::Database)?
            .ok_or_else(|| Error::NotFound(format!("beneficiary {id}")))?;
        Beneficiary::from_row(&row)
    }

    pub async fn list_beneficiaries_for_customer(&self, customer_id: CustomerId) -> Result<Vec<Beneficiary>> {
        let client = self.pool.get().await.map_err(Error::Pool)?;
        let rows = client
            .query(
                "SELECT * FROM beneficiaries WHERE customer_id = $1 ORDER BY payee_name",
                &[&customer_id],
            )
            .await
            .map_err(Error::Database)?;
        rows.iter().map(Beneficiary::from_row).collect()
    }

    pub async fn update_beneficiary_status(&self, id: BeneficiaryId, status: BeneficiaryStatus, is_verified: bool) -> Result<()> {
        let client = self.pool.get().await.map_err(Error::Pool)?;
        client
            .execute(
                "UPDATE beneficiaries SET status = $2, is_verified = $3, updated_at = now() WHERE id = $1",
                &[&id, &beneficiary_status_str(status), &is_verified],
            )
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    pub async fn mark_beneficiary_used(&self, id: BeneficiaryId, at: chrono::DateTime<chrono::Utc>) -> Result<()> {
        let client = self.pool.get().await.map_err(Error::Pool)?;
        client
            .execute(
                "UPDATE beneficiaries SET last_used_at = $2, updated_at = now() WHERE id = $1",
                &[&id, &at],
            )
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    // --- EFTs (NEFT/RTGS) ------------------------------------------------

    pub async fn insert_eft(&self, eft: &EftTransaction) -> Result<()> {
        let client = self.pool.get().await.map_err(Error::Pool)?;
        let snapshot_json = serde_json::to_value(&eft.beneficiary_snapshot)
            .map_err(|e| Error::Internal(format!("failed to serialize beneficiary snapshot: {e}")))?;
        client
            .execute(
                "INSERT INTO eft_transactions
                 (id, eft_reference, eft_type, source_account_id, beneficiary_id, beneficiary_snapshot, amount,
                  charges, total_amount, status, batch_id, batch_time, estimated_completion, actual_completion,
                  transaction_id, failure_reason, initiated_by, processed_by, created_at)
                 VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19)",
                &[
                    &eft.id,
                    &eft.eft_reference,
                    &eft_type_str(eft.eft_type),
                    &eft.source_account_id,
                    &eft.beneficiary_id,
                    &snapshot_json,
                    &eft.amount,
                    &eft.charges,
                    &eft.total_amount,
                    &eft_status_str(eft.status),
                    &eft.batch_id,
                    &eft.batch_time,
                    &eft.estimated_completion,
                    &eft.actual_completion,
                    &eft.transaction_id,
                    &eft.failure_reason,
                    &eft.initiated_by,
                    &eft.processed_by,
                    &eft.created_at,
                ],
            )
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    pub async fn update_eft_status(
        &self,
        id: EftId,
        status: EftStatus,
        batch_id: Option<&str>,
        actual_completion: Option<chrono::DateTime<chrono::Utc>>,
        failure_reason: Option<&str>,
    ) -> Result<()> {
        let client = self.pool.get().await.map_err(Error::Pool)?;
        client
            .execute(
                "UPDATE eft_transactions
                 SET status = $2, batch_id = COALESCE($3, batch_id), actual_completion = $4, failure_reason = $5
                 WHERE id = $1",
                &[&id, &eft_status_str(status), &batch_id, &actual_completion, &failure_reason],
            )
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    pub async fn get_eft(&self, id: EftId) -> Result<EftTransaction> {
        let client = self.pool.get().await.map_err(Error::Pool)?;
        let row = client
            .query_opt("SELECT * FROM eft_transactions WHERE id = $1", &[&id])
            .await
            .map_err(Error::Database)?
            .ok_or_else(|| Error::NotFound(format!("eft transaction {id}")))?;
        EftTransaction::from_row(&row)
    }

    pub async fn get_eft_by_reference(&self, eft_reference: &str) -> Result<EftTransaction> {
        let client = self.pool.get().await.map_err(Error::Pool)?;
        let row = client
            .query_opt("SELECT * FROM eft_transactions WHERE eft_reference = $1", &[&eft_reference])
            .await
            .map_err(Error::Database)?
            .ok_or_else(|| Error::NotFound(format!("eft transaction {eft_reference}")))?;
        EftTransaction::from_row(&row)
    }

    pub async fn list_eft_by_batch_id(&self, batch_id: &str) -> Result<Vec<EftTransaction>> {
        let client = self.pool.get().await.map_err(Error::Pool)?;
        let rows = client
            .query("SELECT * FROM eft_transactions WHERE batch_id = $1", &[&batch_id])
            .await
            .map_err(Error::Database)?;
        rows.iter().map(EftTransaction::from_row).collect()
    }

    /// The NEFT backlog: every EFT still waiting on a batch, oldest first
    /// (§4.3 step 2).
    pub async fn list_eft_pending_and_queued(&self) -> Result<Vec<EftTransaction>> {
        let client = self.pool.get().await.map_err(Error::Pool)?;
        let rows = client
            .query(
                "SELECT * FROM eft_transactions WHERE status IN ('PENDING', 'QUEUED') ORDER BY created_at ASC",
                &[],
            )
            .await
            .map_err(Error::Database)?;
        rows.iter().map(EftTransaction::from_row).collect()
    }

    pub async fn update_eft_completion(
        &self,
        id: EftId,
        status: EftStatus,
        batch_id: Option<&str>,
        actual_completion: Option<chrono::DateTime<chrono::Utc>>,
        failure_reason: Option<&str>,
        processed_by: Option<&str>,
    ) -> Result<()> {
        let client = self.pool.get().await.map_err(Error::Pool)?;
        client
            .execute(
                "UPDATE eft_transactions
                 SET status = $2, batch_id = COALESCE($3, batch_id), actual_completion = $4,
                     failure_reason = $5, processed_by = COALESCE($6, processed_by)
                 WHERE id = $1",
                &[&id, &eft_status_str(status), &batch_id, &actual_completion, &failure_reason, &processed_by],
            )
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    /// Atomically claims a batch slot: returns `true` iff this call is the
    /// one that inserted the row, i.e. the first tick to see this hour.
    /// A second tick for the same `batch_id` -- whether a retry in the same
    /// process or a fresh process after a restart -- finds the row already
    /// there and gets `false` (P6).
    pub async fn try_start_batch(&self, batch_id: &str, started_at: chrono::DateTime<chrono::Utc>) -> Result<bool> {
        let client = self.pool.get().await.map_err(Error::Pool)?;
        let rows = client
            .execute(
                "INSERT INTO neft_batches (batch_id, started_at, status) VALUES ($1, $2, 'PROCESSING')
                 ON CONFLICT (batch_id) DO NOTHING",
                &[&batch_id, &started_at],
            )
            .await
            .map_err(Error::Database)?;
        Ok(rows == 1)
    }

    pub async fn complete_batch(
        &self,
        batch_id: &str,
        completed_at: chrono::DateTime<chrono::Utc>,
        total: i32,
        successful: i32,
        failed: i32,
    ) -> Result<()> {
        let status = if failed == 0 { "COMPLETED" } else { "PARTIALLY_COMPLETED" };
        let client = self.pool.get().await.map_err(Error::Pool)?;
        client
            .execute(
                "UPDATE neft_batches SET completed_at = $2, total = $3, successful = $4, failed = $5, status = $6
                 WHERE batch_id = $1",
                &[&batch_id, &completed_at, &total, &successful, &failed, &status],
            )
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    // --- QR / UPI (in-network payments) ----------------------------------

    pub async fn insert_qr_request(&self, qr: &QrPaymentRequest) -> Result<()> {
        let client = self.pool.get().await.map_err(Error::Pool)?;
        client
            .execute(
                "INSERT INTO qr_payment_requests
                 (id, reference, payee_account_id, amount, currency, status, expires_at, created_by,
                  paid_by_account_id, paid_at, debit_transaction_id, credit_transaction_id, created_at)
                 VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13)",
                &[
                    &qr.id,
                    &qr.reference,
                    &qr.payee_account_id,
                    &qr.amount,
                    &qr.currency,
                    &qr_status_str(qr.status),
                    &qr.expires_at,
                    &qr.created_by,
                    &qr.paid_by_account_id,
                    &qr.paid_at,
                    &qr.debit_transaction_id,
                    &qr.credit_transaction_id,
                    &qr.created_at,
                ],
            )
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    pub async fn get_qr_request(&self, id: Uuid) -> Result<QrPaymentRequest> {
        let client = self.pool.get().await.map_err(Error::Pool)?;
        let row = client
            .query_opt("SELECT * FROM qr_payment_requests WHERE id = $1", &[&id])
            .await
            .map_err(Error::Database)?
            .ok_or_else(|| Error::NotFound(format!("qr payment request {id}")))?;
        QrPaymentRequest::from_row(&row)
    }

    pub async fn mark_qr_paid(
        &self,
        id: Uuid,
        paid_by_account_id: AccountId,
        paid_at: chrono::DateTime<chrono::Utc>,
        debit_transaction_id: TransactionId,
        credit_transaction_id: TransactionId,
    ) -> Result<()> {
        let client = self.pool.get().await.map_err(Error::Pool)?;
        client
            .execute(
                "UPDATE qr_payment_requests
                 SET status = 'PAID', paid_by_account_id = $2, paid_at = $3,
                     debit_transaction_id = $4, credit_transaction_id = $5
                 WHERE id = $1",
                &[&id, &paid_by_account_id, &paid_at, &debit_transaction_id, &credit_transaction_id],
            )
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    pub async fn mark_qr_expired(&self, id: Uuid) -> Result<()> {
        let client = self.pool.get().await.map_err(Error::Pool)?;
        client
            .execute("UPDATE qr_payment_requests SET status = 'EXPIRED' WHERE id = $1", &[&id])
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    pub async fn insert_upi_alias(&self, alias: &UpiAlias) -> Result<()> {
        let client = self.pool.get().await.map_err(Error::Pool)?;
        client
            .execute(
                "INSERT INTO upi_aliases (id, alias, user_id, account_id, status, created_at, updated_at)
                 VALUES ($1,$2,$3,$4,$5,$6,$7)",
                &[
                    &alias.id,
                    &alias.alias,
                    &alias.user_id,
                    &alias.account_id,
                    &upi_status_str(alias.status),
                    &alias.created_at,
                    &alias.updated_at,
                ],
            )
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    pub async fn get_upi_alias(&self, alias: &str) -> Result<Option<UpiAlias>> {
        let client = self.pool.get().await.map_err(Error::Pool)?;
        let row = client
            .query_opt("SELECT * FROM upi_aliases WHERE alias = $1", &[&alias])
            .await
            .map_err(Error::Database)?;
        row.as_ref().map(UpiAlias::from_row).transpose()
    }

    pub async fn set_upi_alias_status(&self, id: Uuid, status: UpiAliasStatus) -> Result<()> {
        let client = self.pool.get().await.map_err(Error::Pool)?;
        client
            .execute(
                "UPDATE upi_aliases SET status = $2, updated_at = now() WHERE id = $1",
                &[&id, &upi_status_str(status)],
            )
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    // --- users & customers ------------------------------------------------

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let client = self.pool.get().await.map_err(Error::Pool)?;
        let row = client
            .query_opt("SELECT * FROM users WHERE username = $1", &[&username])
            .await
            .map_err(Error::Database)?;
        match row {
            Some(row) => {
                let id: UserId = row.try_get("id").map_err(Error::Database)?;
                let roles = self.get_roles_for_user(id).await?;
                Ok(Some(User::from_row(&row, roles)?))
            }
            None => Ok(None),
        }
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let client = self.pool.get().await.map_err(Error::Pool)?;
        let row = client
            .query_opt("SELECT * FROM users WHERE email = $1", &[&email])
            .await
            .map_err(Error::Database)?;
        match row {
            Some(row) => {
                let id: UserId = row.try_get("id").map_err(Error::Database)?;
                let roles = self.get_roles_for_user(id).await?;
                Ok(Some(User::from_row(&row, roles)?))
            }
            None => Ok(None),
        }
    }

    pub async fn get_user_by_mobile(&self, mobile: &str) -> Result<Option<User>> {
        let client = self.pool.get().await.map_err(Error::Pool)?;
        let row = client
            .query_opt("SELECT * FROM users WHERE mobile = $1", &[&mobile])
            .await
            .map_err(Error::Database)?;
        match row {
            Some(row) => {
                let id: UserId = row.try_get("id").map_err(Error::Database)?;
                let roles = self.get_roles_for_user(id).await?;
                Ok(Some(User::from_row(&row, roles)?))
            }
            None => Ok(None),
        }
    }

    /// §4.2 login resolution: exact match on `username`, else `email`, else
    /// `mobile`, in that order, stopping at the first hit.
    pub async fn find_user_by_login_identifier(&self, identifier: &str) -> Result<Option<User>> {
        if let Some(user) = self.get_user_by_username(identifier).await? {
            return Ok(Some(user));
        }
        if let Some(user) = self.get_user_by_email(identifier).await? {
            return Ok(Some(user));
        }
        self.get_user_by_mobile(identifier).await
    }

    pub async fn list_users_by_status(&self, status: UserStatus) -> Result<Vec<User>> {
        let client = self.pool.get().await.map_err(Error::Pool)?;
        let rows = client
            .query(
                "SELECT * FROM users WHERE status = $1 ORDER BY id",
                &[&user_status_str(status)],
            )
            .await
            .map_err(Error::Database)?;
        let mut users = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: UserId = row.try_get("id").map_err(Error::Database)?;
            let roles = self.get_roles_for_user(id).await?;
            users.push(User::from_row(row, roles)?);
        }
        Ok(users)
    }

    pub async fn get_user(&self, id: UserId) -> Result<User> {
        let client = self.pool.get().await.map_err(Error::Pool)?;
        let row = client
            .query_opt("SELECT * FROM users WHERE id = $1", &[&id])
            .await
            .map_err(Error::Database)?
            .ok_or_else(|| Error::NotFound(format!("user {id}")))?;
        let roles = self.get_roles_for_user(id).await?;
        User::from_row(&row, roles)
    }

    async fn get_roles_for_user(&self, user_id: UserId) -> Result<Vec<Role>> {
        let client = self.pool.get().await.map_err(Error::Pool)?;
        let rows = client
            .query(
                "SELECT r.name, rp.permission
                 FROM user_roles ur
                 JOIN roles r ON r.id = ur.role_id
                 LEFT JOIN role_permissions rp ON rp.role_id = r.id
                 WHERE ur.user_id = $1",
                &[&user_id],
            )
            .await
            .map_err(Error::Database)?;

        let mut by_role: std::collections::HashMap<String, std::collections::HashSet<Permission>> =
            std::collections::HashMap::new();
        for row in &rows {
            let name: String = row.try_get("name").map_err(Error::Database)?;
            let perm: Option<String> = row.try_get("permission").map_err(Error::Database)?;
            let entry = by_role.entry(name).or_default();
            if let Some(perm) = perm {
                if let Some(p) = parse_permission(&perm) {
                    entry.insert(p);
                }
            }
        }

        by_role
            .into_iter()
            .map(|(name, permissions)| {
                Ok(Role {
                    name: parse_role_name(&name)?,
                    permissions,
                })
            })
            .collect()
    }

    pub async fn insert_user(&self, tx: &Transaction<'_>, user: &User) -> Result<()> {
        tx.execute(
            "INSERT INTO users (id, username, email, mobile, password_hash, status, customer_id)
             VALUES ($1,$2,$3,$4,$5,$6,$7)",
            &[
                &user.id,
                &user.username,
                &user.email,
                &user.mobile,
                &user.password_hash,
                &user_status_str(user.status),
                &user.customer_id,
            ],
        )
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    pub async fn assign_role(&self, tx: &Transaction<'_>, user_id: UserId, role: RoleName) -> Result<()> {
        tx.execute(
            "INSERT INTO user_roles (user_id, role_id)
             SELECT $1, id FROM roles WHERE name = $2
             ON CONFLICT DO NOTHING",
            &[&user_id, &role.to_string()],
        )
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    pub async fn update_user_status_tx(&self, tx: &Transaction<'_>, id: UserId, status: UserStatus) -> Result<()> {
        tx.execute(
            "UPDATE users SET status = $2 WHERE id = $1",
            &[&id, &user_status_str(status)],
        )
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    pub async fn link_customer(&self, tx: &Transaction<'_>, user_id: UserId, customer_id: CustomerId) -> Result<()> {
        tx.execute(
            "UPDATE users SET customer_id = $2 WHERE id = $1",
            &[&user_id, &customer_id],
        )
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    pub async fn insert_customer(&self, tx: &Transaction<'_>, customer: &Customer) -> Result<()> {
        let other_info_json = serde_json::to_value(&customer.other_info)
            .map_err(|e| Error::Internal(format!("failed to serialize other_info: {e}")))?;
        tx.execute(
            "INSERT INTO customers (id, customer_number, user_id, first_name, last_name, national_id, status, other_info)
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8)",
            &[
                &customer.id,
                &customer.customer_number,
                &customer.user_id,
                &customer.first_name,
                &customer.last_name,
                &customer.national_id,
                &customer_status_str(customer.status),
                &other_info_json,
            ],
        )
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    pub async fn get_customer(&self, id: CustomerId) -> Result<Customer> {
        let client = self.pool.get().await.map_err(Error::Pool)?;
        let row = client
            .query_opt("SELECT * FROM customers WHERE id = $1", &[&id])
            .await
            .map_err(Error::Database)?
            .ok_or_else(|| Error::NotFound(format!("customer {id}")))?;
        Customer::from_row(&row)
    }

    pub async fn get_customer_by_user_id(&self, user_id: UserId) -> Result<Option<Customer>> {
        let client = self.pool.get().await.map_err(Error::Pool)?;
        let row = client
            .query_opt("SELECT * FROM customers WHERE user_id = $1", &[&user_id])
            .await
            .map_err(Error::Database)?;
        row.as_ref().map(Customer::from_row).transpose()
    }

    /// Resubmission path (§4.7): overwrites the editable personal fields,
    /// flips back to PENDING_REVIEW, and wipes any prior rejection reason --
    /// all inside the caller's unit of work alongside the `User` status flip.
    #[allow(clippy::too_many_arguments)]
    pub async fn update_customer_details_tx(
        &self,
        tx: &Transaction<'_>,
        id: CustomerId,
        first_name: &str,
        last_name: &str,
        national_id: &str,
        other_info: &CustomerOtherInfo,
    ) -> Result<()> {
        let other_info_json = serde_json::to_value(other_info)
            .map_err(|e| Error::Internal(format!("failed to serialize other_info: {e}")))?;
        tx.execute(
            "UPDATE customers
             SET first_name = $2, last_name = $3, national_id = $4, other_info = $5, status = 'PENDING_REVIEW'
             WHERE id = $1",
            &[&id, &first_name, &last_name, &national_id, &other_info_json],
        )
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    pub async fn update_customer_status_tx(
        &self,
        tx: &Transaction<'_>,
        id: CustomerId,
        status: CustomerStatus,
        rejection_reason: Option<&str>,
    ) -> Result<()> {
        // `jsonb_set` is strict: a bare `to_jsonb($3::text)` would pass SQL
        // NULL straight through the moment `rejection_reason` is absent,
        // making the whole expression -- the entire `other_info` column,
        // including `address` -- evaluate to NULL rather than just clearing
        // this one key. Coalescing to a JSON `null` keeps the column intact.
        tx.execute(
            "UPDATE customers SET status = $2, other_info = jsonb_set(
                 COALESCE(other_info, '{}'::jsonb),
                 '{rejection_reason}',
                 COALESCE(to_jsonb($3::text), 'null'::jsonb)
             ) WHERE id = $1",
            &[&id, &customer_status_str(status), &rejection_reason],
        )
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    pub async fn list_pending_customers(&self) -> Result<Vec<Customer>> {
        let client = self.pool.get().await.map_err(Error::Pool)?;
        let rows = client
            .query(
                "SELECT * FROM customers WHERE status = 'PENDING_REVIEW' ORDER BY id",
                &[],
            )
            .await
            .map_err(Error::Database)?;
        rows.iter().map(Customer::from_row).collect()
    }
}

fn parse_permission(s: &str) -> Option<Permission> {
    Some(match s {
        "ACCOUNT_READ" => Permission::AccountRead,
        "ACCOUNT_WRITE" => Permission::AccountWrite,
        "USER_READ" => Permission::UserRead,
        "USER_WRITE" => Permission::UserWrite,
        "TRANSACTION_READ" => Permission::TransactionRead,
        "TRANSACTION_WRITE" => Permission::TransactionWrite,
        _ => return None,
    })
}

fn parse_role_name(s: &str) -> Result<RoleName> {
    match s {
        "CUSTOMER" => Ok(RoleName::Customer),
        "ACCOUNTANT" => Ok(RoleName::Accountant),
        "ADMIN" => Ok(RoleName::Admin),
        "SUPERADMIN" => Ok(RoleName::Superadmin),
        other => Err(Error::Internal(format!("unknown role '{other}'"))),
    }
}

fn user_status_str(s: UserStatus) -> &'static str {
    match s {
        UserStatus::PendingDetails => "PENDING_DETAILS",
        UserStatus::PendingReview => "PENDING_REVIEW",
        UserStatus::Active => "ACTIVE",
        UserStatus::Rejected => "REJECTED",
    }
}

fn customer_status_str(s: CustomerStatus) -> &'static str {
    match s {
        CustomerStatus::PendingReview => "PENDING_REVIEW",
        CustomerStatus::Active => "ACTIVE",
        CustomerStatus::Rejected => "REJECTED",
    }
}

fn account_type_str(s: AccountType) -> &'static str {
    match s {
        AccountType::Savings => "SAVINGS",
        AccountType::Current => "CURRENT",
    }
}

fn account_status_str(s: AccountStatus) -> &'static str {
    match s {
        AccountStatus::Active => "ACTIVE",
        AccountStatus::Frozen => "FROZEN",
        AccountStatus::Closed => "CLOSED",
    }
}

fn transaction_type_str(s: TransactionType) -> &'static str {
    match s {
        TransactionType::Debit => "DEBIT",
        TransactionType::Credit => "CREDIT",
        TransactionType::Transfer => "TRANSFER",
        TransactionType::Withdrawal => "WITHDRAWAL",
        TransactionType::Fee => "FEE",
        TransactionType::Refund => "REFUND",
    }
}

fn transaction_status_str(s: TransactionStatus) -> &'static str {
    match s {
        TransactionStatus::Pending => "PENDING",
        TransactionStatus::Processing => "PROCESSING",
        TransactionStatus::Completed => "COMPLETED",
        TransactionStatus::Failed => "FAILED",
    }
}

fn transaction_category_str(s: TransactionCategory) -> &'static str {
    match s {
        TransactionCategory::InternalTransfer => "INTERNAL_TRANSFER",
        TransactionCategory::Neft => "NEFT",
        TransactionCategory::Rtgs => "RTGS",
        TransactionCategory::Qr => "QR",
        TransactionCategory::BulkUpload => "BULK_UPLOAD",
        TransactionCategory::Refund => "REFUND",
        TransactionCategory::AdminAdjustment => "ADMIN_ADJUSTMENT",
    }
}

fn beneficiary_status_str(s: BeneficiaryStatus) -> &'static str {
    match s {
        BeneficiaryStatus::PendingVerification => "PENDING_VERIFICATION",
        BeneficiaryStatus::Active => "ACTIVE",
        BeneficiaryStatus::Blocked => "BLOCKED",
        BeneficiaryStatus::Inactive => "INACTIVE",
    }
}

fn eft_type_str(s: EftType) -> &'static str {
    match s {
        EftType::Neft => "NEFT",
        EftType::Rtgs => "RTGS",
    }
}

fn eft_status_str(s: EftStatus) -> &'static str {
    match s {
        EftStatus::Pending => "PENDING",
        EftStatus::Queued => "QUEUED",
        EftStatus::Processing => "PROCESSING",
        EftStatus::Completed => "COMPLETED",
        EftStatus::Failed => "FAILED",
    }
}

fn qr_status_str(s: QrStatus) -> &'static str {
    match s {
        QrStatus::Pending => "PENDING",
        QrStatus::Paid => "PAID",
        QrStatus::Expired => "EXPIRED",
        QrStatus::Cancelled => "CANCELLED",
    }
}

fn upi_status_str(s: UpiAliasStatus) -> &'static str {
    match s {
        UpiAliasStatus::Active => "ACTIVE",
        UpiAliasStatus::Inactive => "INACTIVE",
    }
}
