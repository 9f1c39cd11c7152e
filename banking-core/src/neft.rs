//! NEFT rail (§4.3): batched, deferred settlement. A submit places a hold
//! synchronously; the actual transfer waits for the next hourly batch tick,
//! which this module also owns.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Timelike, Utc};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::{charge_for, BankingConfig};
use crate::database::DatabaseClient;
use crate::external::{ExternalBankAdapter, ExternalOutcome};
use crate::ids::{self, Clock};
use crate::ledger::{HoldOutcome, Ledger};
use crate::types::*;
use crate::{Error, Result};

/// Outcome of one hourly batch tick: how many EFTs it found and how they
/// resolved, or a note that another tick already claimed this hour.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub batch_id: String,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub already_claimed: bool,
}

/// Owns NEFT submission and the hourly batch tick. The batch tick is
/// idempotent two ways at once (§9 P6): a `tokio::sync::Mutex` keeps two
/// ticks in the same process from overlapping, and `try_start_batch`'s
/// `ON CONFLICT DO NOTHING` keeps a second process (or a retried tick after
/// a restart) from reprocessing an hour another process already claimed.
pub struct NeftService<A: ExternalBankAdapter> {
    db: Arc<DatabaseClient>,
    ledger: Arc<Ledger>,
    adapter: A,
    clock: Arc<dyn Clock>,
    config: BankingConfig,
    batch_lock: Mutex<()>,
}

impl<A: ExternalBankAdapter> NeftService<A> {
    pub fn new(db: Arc<DatabaseClient>, ledger: Arc<Ledger>, adapter: A, clock: Arc<dyn Clock>, config: BankingConfig) -> Self {
        Self {
            db,
            ledger,
            adapter,
            clock,
            config,
            batch_lock: Mutex::new(()),
        }
    }

    /// Submits a transfer for the next batch (§4.3 step 1): tariff lookup,
    /// then a synchronous hold for `amount + charges` so the money is
    /// reserved the moment the customer hits submit, long before any batch
    /// runs. Always accepted regardless of the operating window -- a submit
    /// outside 08:00-19:00 is simply scheduled for the window's next slot
    /// (§7 NEFT_OUTSIDE_WINDOW).
    pub async fn submit(&self, source_account_id: AccountId, beneficiary: &Beneficiary, amount: Money, initiated_by: UserId) -> Result<EftTransaction> {
        if beneficiary.status != BeneficiaryStatus::Active {
            return Err(Error::Validation("beneficiary is not active".into()));
        }
        if amount <= Money::ZERO {
            return Err(Error::Validation("amount must be positive".into()));
        }

        let now = self.clock.now();

        let charges = charge_for(&self.config.neft_tariff, amount);
        let total_amount = amount + charges;

        let eft_reference = ids::eft_reference();
        let hold = self
            .ledger
            .hold_debit(source_account_id, total_amount, TransactionCategory::Neft, initiated_by, Some(eft_reference.clone()))
            .await?;

        // Outside the operating window the submission is still accepted and
        // held (§4.3, §7 NEFT_OUTSIDE_WINDOW) -- only the batch it lands in
        // moves, to the next window's first slot.
        let batch_time = next_batch_time(now, &self.config.neft_window);
        let estimated_completion = batch_time + ChronoDuration::minutes(self.config.neft_estimated_minutes);

        let eft = EftTransaction {
            id: uuid::Uuid::new_v4(),
            eft_reference,
            eft_type: EftType::Neft,
            source_account_id,
            beneficiary_id: beneficiary.id,
            beneficiary_snapshot: BeneficiarySnapshot::from(beneficiary),
            amount,
            charges,
            total_amount,
            status: EftStatus::Pending,
            batch_id: None,
            batch_time: Some(batch_time),
            estimated_completion: Some(estimated_completion),
            actual_completion: None,
            transaction_id: hold.id,
            failure_reason: None,
            initiated_by,
            processed_by: None,
            created_at: now,
        };
        self.db.insert_eft(&eft).await?;
        self.db.mark_beneficiary_used(beneficiary.id, now).await?;
        Ok(eft)
    }

    /// Runs one hourly batch (§4.3 step 2). Safe to call more than once per
    /// hour, and safe to call concurrently with itself from a scheduler that
    /// double-fires: the second caller always observes `already_claimed`.
    pub async fn batch_tick(&self) -> Result<BatchReport> {
        let _guard = self.batch_lock.lock().await;

        let now = self.clock.now();
        let batch_id = ids::neft_batch_id(now);

        if !self.db.try_start_batch(&batch_id, now).await? {
            info!("NEFT batch {} already claimed, skipping", batch_id);
            return Ok(BatchReport {
                batch_id,
                total: 0,
                successful: 0,
                failed: 0,
                already_claimed: true,
            });
        }

        let backlog = self.db.list_eft_pending_and_queued().await?;
        let total = backlog.len();
        let mut successful = 0;
        let mut failed = 0;

        for eft in backlog {
            match self.process_one(&eft, &batch_id, now).await {
                Ok(true) => successful += 1,
                Ok(false) => failed += 1,
                Err(e) => {
                    warn!("NEFT batch {} failed to process eft {}: {}", batch_id, eft.eft_reference, e);
                    failed += 1;
                }
            }
        }

        self.db.complete_batch(&batch_id, self.clock.now(), total as i32, successful as i32, failed as i32).await?;
        info!("NEFT batch {} complete: {} total, {} successful, {} failed", batch_id, total, successful, failed);

        Ok(BatchReport {
            batch_id,
            total,
            successful,
            failed,
            already_claimed: false,
        })
    }

    /// One EFT's trip through a batch: mark QUEUED->PROCESSING, call the
    /// external rail, then settle the hold and flip the EFT to its terminal
    /// status. Returns `Ok(true)` on success, `Ok(false)` on a clean business
    /// failure (rail rejected it) so the caller can tally without treating
    /// it as an unexpected error.
    async fn process_one(&self, eft: &EftTransaction, batch_id: &str, now: DateTime<Utc>) -> Result<bool> {
        self.db.update_eft_status(eft.id, EftStatus::Processing, Some(batch_id), None, None).await?;

        let hold = self.ledger.get_transaction(eft.transaction_id).await?;
        let outcome = self
            .adapter
            .submit(&eft.eft_reference, &eft.beneficiary_snapshot.ifsc_code, eft.amount)
            .await;

        match outcome {
            Ok(ExternalOutcome::Accepted { processed_by }) => {
                self.ledger.settle_hold(&hold, HoldOutcome::Commit).await?;
                self.db
                    .update_eft_completion(eft.id, EftStatus::Completed, Some(batch_id), Some(now), None, Some(&processed_by))
                    .await?;
                Ok(true)
            }
            Ok(ExternalOutcome::Rejected { reason }) => {
                self.ledger.settle_hold(&hold, HoldOutcome::Fail(reason.clone())).await?;
                self.db
                    .update_eft_completion(eft.id, EftStatus::Failed, Some(batch_id), Some(now), Some(&reason), None)
                    .await?;
                Ok(false)
            }
            Err(e) => {
                let reason = e.to_string();
                self.ledger.settle_hold(&hold, HoldOutcome::Fail(reason.clone())).await?;
                self.db
                    .update_eft_completion(eft.id, EftStatus::Failed, Some(batch_id), Some(now), Some(&reason), None)
                    .await?;
                Ok(false)
            }
        }
    }

    pub async fn get(&self, id: EftId) -> Result<EftTransaction> {
        self.db.get_eft(id).await
    }

    pub async fn get_by_reference(&self, eft_reference: &str) -> Result<EftTransaction> {
        self.db.get_eft_by_reference(eft_reference).await
    }

    pub async fn list_for_batch(&self, batch_id: &str) -> Result<Vec<EftTransaction>> {
        self.db.list_eft_by_batch_id(batch_id).await
    }
}

/// The next top-of-hour at or after `now` that falls inside `window`, used
/// as `batch_time` (§4.3 step 5, `nextTopOfHourInWindow`). A submit at 10:17
/// lands in the 11:00 batch, not the 10:00 one already in flight, since that
/// one may already be past its `try_start_batch` claim. A submit before the
/// window opens waits for today's first slot; a submit at or after the
/// window's last batch -- including any out-of-window submit -- waits for
/// tomorrow's first slot instead of landing on an hour no tick will serve.
fn next_batch_time(now: DateTime<Utc>, window: &crate::config::DailyWindow) -> DateTime<Utc> {
    let today_open = at_time(now, window.start_hour, window.start_minute);
    let today_close = at_time(now, window.end_hour, window.end_minute);

    if now < today_open {
        return today_open;
    }
    if now >= today_close {
        return today_open + ChronoDuration::days(1);
    }

    let truncated = now.with_minute(0).and_then(|t| t.with_second(0)).and_then(|t| t.with_nanosecond(0)).unwrap_or(now);
    let candidate = truncated + ChronoDuration::hours(1);
    if candidate >= today_close {
        today_open + ChronoDuration::days(1)
    } else {
        candidate
    }
}

fn at_time(dt: DateTime<Utc>, hour: u32, minute: u32) -> DateTime<Utc> {
    dt.with_hour(hour)
        .and_then(|t| t.with_minute(minute))
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(dt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::FixedClock;

    fn window() -> crate::config::DailyWindow {
        crate::config::DailyWindow::whole_hours(8, 19)
    }

    #[test]
    fn next_batch_rounds_up_to_the_hour() {
        let now = FixedClock::ymd_hms(2026, 7, 29, 10, 17, 42).now();
        let next = next_batch_time(now, &window());
        assert_eq!(next, FixedClock::ymd_hms(2026, 7, 29, 11, 0, 0).now());
    }

    #[test]
    fn exact_hour_still_advances_one_hour() {
        let now = FixedClock::ymd_hms(2026, 7, 29, 11, 0, 0).now();
        let next = next_batch_time(now, &window());
        assert_eq!(next, FixedClock::ymd_hms(2026, 7, 29, 12, 0, 0).now());
    }

    #[test]
    fn submit_before_the_window_opens_waits_for_todays_first_slot() {
        let now = FixedClock::ymd_hms(2026, 7, 29, 5, 30, 0).now();
        let next = next_batch_time(now, &window());
        assert_eq!(next, FixedClock::ymd_hms(2026, 7, 29, 8, 0, 0).now());
    }

    #[test]
    fn submit_after_the_last_batch_waits_for_tomorrows_first_slot() {
        // 18:17 is still in-window but its rounded-up batch (19:00) is not.
        let now = FixedClock::ymd_hms(2026, 7, 29, 18, 17, 0).now();
        let next = next_batch_time(now, &window());
        assert_eq!(next, FixedClock::ymd_hms(2026, 7, 30, 8, 0, 0).now());
    }

    #[test]
    fn submit_entirely_outside_the_window_waits_for_tomorrows_first_slot() {
        let now = FixedClock::ymd_hms(2026, 7, 29, 21, 0, 0).now();
        let next = next_batch_time(now, &window());
        assert_eq!(next, FixedClock::ymd_hms(2026, 7, 30, 8, 0, 0).now());
    }
}
