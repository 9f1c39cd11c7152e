//! RTGS rail (§4.4): unlike NEFT, every submit settles synchronously inside
//! the same call -- no batch, no queue. The hold/external-call/settle
//! sequence is the same three beats as `neft::NeftService::process_one`,
//! just run inline instead of from a batch tick.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};

use crate::config::{charge_for, BankingConfig};
use crate::database::DatabaseClient;
use crate::external::{ExternalBankAdapter, ExternalOutcome};
use crate::ids::{self, Clock};
use crate::ledger::{HoldOutcome, Ledger};
use crate::types::*;
use crate::{Error, Result};

fn in_window(now: DateTime<Utc>, config: &BankingConfig) -> bool {
    if config.rtgs_weekdays_only && matches!(now.weekday(), Weekday::Sat | Weekday::Sun) {
        return false;
    }
    config.rtgs_window.contains(now.hour(), now.minute())
}

/// Owns the RTGS submit path: window/floor checks, tariff, hold, inline
/// external call, and the matching commit-or-refund settlement.
pub struct RtgsService<A: ExternalBankAdapter> {
    db: Arc<DatabaseClient>,
    ledger: Arc<Ledger>,
    adapter: A,
    clock: Arc<dyn Clock>,
    config: BankingConfig,
}

impl<A: ExternalBankAdapter> RtgsService<A> {
    pub fn new(db: Arc<DatabaseClient>, ledger: Arc<Ledger>, adapter: A, clock: Arc<dyn Clock>, config: BankingConfig) -> Self {
        Self { db, ledger, adapter, clock, config }
    }

    /// Submits and settles an RTGS transfer in one call (§4.4). Rejects
    /// amounts below `rtgs_minimum_amount` before ever touching the ledger
    /// -- RTGS exists specifically for large transfers NEFT's tariff table
    /// was not built to price.
    pub async fn submit(&self, source_account_id: AccountId, beneficiary: &Beneficiary, amount: Money, initiated_by: UserId) -> Result<EftTransaction> {
        if beneficiary.status != BeneficiaryStatus::Active {
            return Err(Error::Validation("beneficiary is not active".into()));
        }
        if amount < self.config.rtgs_minimum_amount {
            return Err(Error::RtgsBelowMin);
        }

        let now = self.clock.now();
        if !in_window(now, &self.config) {
            return Err(Error::RtgsClosed);
        }

        let charges = charge_for(&self.config.rtgs_tariff, amount);
        let total_amount = amount + charges;

        let eft_reference = ids::eft_reference();
        let hold = self
            .ledger
            .hold_debit(source_account_id, total_amount, TransactionCategory::Rtgs, initiated_by, Some(eft_reference.clone()))
            .await?;

        let mut eft = EftTransaction {
            id: uuid::Uuid::new_v4(),
            eft_reference: eft_reference.clone(),
            eft_type: EftType::Rtgs,
            source_account_id,
            beneficiary_id: beneficiary.id,
            beneficiary_snapshot: BeneficiarySnapshot::from(beneficiary),
            amount,
            charges,
            total_amount,
            status: EftStatus::Processing,
            batch_id: None,
            batch_time: None,
            estimated_completion: None,
            actual_completion: None,
            transaction_id: hold.id,
            failure_reason: None,
            initiated_by,
            processed_by: None,
            created_at: now,
        };
        self.db.insert_eft(&eft).await?;
        self.db.mark_beneficiary_used(beneficiary.id, now).await?;

        let outcome = self.adapter.submit(&eft_reference, &beneficiary.ifsc_code, amount).await;
        let completed_at = self.clock.now();

        match outcome {
            Ok(ExternalOutcome::Accepted { processed_by }) => {
                self.ledger.settle_hold(&hold, HoldOutcome::Commit).await?;
                self.db
                    .update_eft_completion(eft.id, EftStatus::Completed, None, Some(completed_at), None, Some(&processed_by))
                    .await?;
                eft.status = EftStatus::Completed;
                eft.actual_completion = Some(completed_at);
                eft.processed_by = Some(processed_by);
            }
            Ok(ExternalOutcome::Rejected { reason }) => {
                self.ledger.settle_hold(&hold, HoldOutcome::Fail(reason.clone())).await?;
                self.db
                    .update_eft_completion(eft.id, EftStatus::Failed, None, Some(completed_at), Some(&reason), None)
                    .await?;
                eft.status = EftStatus::Failed;
                eft.actual_completion = Some(completed_at);
                eft.failure_reason = Some(reason);
            }
            Err(e) => {
                let reason = e.to_string();
                self.ledger.settle_hold(&hold, HoldOutcome::Fail(reason.clone())).await?;
                self.db
                    .update_eft_completion(eft.id, EftStatus::Failed, None, Some(completed_at), Some(&reason), None)
                    .await?;
                eft.status = EftStatus::Failed;
                eft.actual_completion = Some(completed_at);
                eft.failure_reason = Some(reason);
            }
        }

        Ok(eft)
    }

    pub async fn get(&self, id: EftId) -> Result<EftTransaction> {
        self.db.get_eft(id).await
    }

    pub async fn get_by_reference(&self, eft_reference: &str) -> Result<EftTransaction> {
        self.db.get_eft_by_reference(eft_reference).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::FixedClock;
    use rust_decimal_macros::dec;

    fn config() -> BankingConfig {
        BankingConfig::default()
    }

    #[test]
    fn window_rejects_weekends() {
        // 2026-08-01 is a Saturday.
        let saturday = FixedClock::ymd_hms(2026, 8, 1, 10, 0, 0).now();
        assert!(!in_window(saturday, &config()));
    }

    #[test]
    fn window_accepts_weekday_business_hours() {
        // 2026-07-29 is a Wednesday.
        let wednesday = FixedClock::ymd_hms(2026, 7, 29, 10, 0, 0).now();
        assert!(in_window(wednesday, &config()));
    }

    #[test]
    fn window_rejects_outside_business_hours() {
        let early = FixedClock::ymd_hms(2026, 7, 29, 7, 0, 0).now();
        assert!(!in_window(early, &config()));
    }

    #[test]
    fn minimum_amount_floor_matches_config() {
        let cfg = config();
        assert!(dec!(199_999) < cfg.rtgs_minimum_amount);
        assert!(dec!(200_000) >= cfg.rtgs_minimum_amount);
    }
}
