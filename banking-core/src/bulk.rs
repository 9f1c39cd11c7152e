//! Bulk upload (§4.8): a pre-parsed batch of debit/credit rows processed one
//! at a time. File parsing itself is out of scope -- the caller hands this
//! service an already-decoded `Vec<BulkRow>`.

use std::sync::Arc;

use tracing::warn;

use crate::ids::{self, Clock};
use crate::ledger::Ledger;
use crate::types::*;
use crate::Result;

pub struct BulkUploadService {
    ledger: Arc<Ledger>,
    clock: Arc<dyn Clock>,
}

impl BulkUploadService {
    pub fn new(ledger: Arc<Ledger>, clock: Arc<dyn Clock>) -> Self {
        Self { ledger, clock }
    }

    /// Processes every row under one shared `bulk_upload_batch_id`. Each row
    /// is its own unit of work in the ledger (`bulk_debit`/`bulk_credit`):
    /// one row's failure -- insufficient funds, a frozen account -- does not
    /// roll back any other row, and the report records exactly which rows
    /// failed and why so the caller can retry only those.
    pub async fn process(&self, rows: Vec<BulkRow>, initiated_by: UserId) -> BulkUploadReport {
        let batch_id = ids::bulk_upload_batch_id(self.clock.now());
        let total = rows.len();
        let mut successful = 0;
        let mut errors = Vec::new();

        for (index, row) in rows.into_iter().enumerate() {
            let outcome = match row.row_type {
                BulkRowType::Debit => self.ledger.bulk_debit(row.account_id, row.amount, initiated_by, &batch_id).await,
                BulkRowType::Credit => self.ledger.bulk_credit(row.account_id, row.amount, initiated_by, &batch_id).await,
            };
            match outcome {
                Ok(_) => successful += 1,
                Err(e) => {
                    warn!("bulk upload {} row {} failed: {}", batch_id, index, e);
                    errors.push((index, e.to_string()));
                }
            }
        }

        BulkUploadReport {
            batch_id,
            total,
            successful,
            failed: errors.len(),
            errors,
        }
    }

    pub async fn transactions_for_batch(&self, batch_id: &str, account_id: AccountId, limit: i64) -> Result<Vec<Transaction>> {
        Ok(self
            .ledger
            .transaction_history(account_id, limit)
            .await?
            .into_iter()
            .filter(|t| t.bulk_upload_batch_id.as_deref() == Some(batch_id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn report_tallies_match_row_count() {
        let report = BulkUploadReport {
            batch_id: "BULK-test".into(),
            total: 3,
            successful: 2,
            failed: 1,
            errors: vec![(2, "insufficient funds".into())],
        };
        assert_eq!(report.successful + report.failed, report.total);
        assert_eq!(report.errors.len(), report.failed);
    }

    #[test]
    fn bulk_row_shape() {
        let row = BulkRow {
            account_id: uuid::Uuid::new_v4(),
            row_type: BulkRowType::Credit,
            amount: dec!(500),
            description: "payroll".into(),
        };
        assert_eq!(row.row_type, BulkRowType::Credit);
    }
}
