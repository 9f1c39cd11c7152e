//! Monotonic clock and reference/id minting.
//!
//! Every component that needs "now" or a fresh reference goes through here
//! instead of calling `Utc::now()`/`Uuid::new_v4()` directly, so tests can
//! swap in a fixed clock without threading a parameter through every call
//! site.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

/// Source of "now". `SystemClock` is the production implementation;
/// `FixedClock` pins time for deterministic window/tariff tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

impl FixedClock {
    pub fn ymd_hms(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> Self {
        Self(Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap())
    }
}

static REF_COUNTER: AtomicI64 = AtomicI64::new(0);

fn monotonic_nanos() -> i64 {
    // A process-local monotonic counter, not wall-clock nanos: guarantees
    // strict ordering even when two references are minted within the same
    // clock tick, which wall-clock nanos cannot guarantee on every platform.
    REF_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// `"TXN" + monotonic counter + 8 hex chars` per spec.
pub fn transaction_reference() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("TXN{}{}", monotonic_nanos(), &suffix[..8])
}

/// Opaque, system-assigned, globally unique EFT reference.
pub fn eft_reference() -> String {
    format!("EFT{}", Uuid::new_v4().simple())
}

/// `"NEFT" + YYYYMMDDHH`, the batch identifier for the hour starting at `at`.
pub fn neft_batch_id(at: DateTime<Utc>) -> String {
    format!("NEFT{}", at.format("%Y%m%d%H"))
}

/// Zero-padded customer number salted with a UUID fragment so it is globally
/// unique without a centrally allocated sequence.
pub fn customer_number() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("CUST{}", &suffix[..10].to_uppercase())
}

/// Zero-padded account number, same shape as `customer_number`.
pub fn account_number() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}", &suffix[..12])
}

/// Batch id stamped on every `Transaction` produced by one bulk-upload call
/// (§4.8), distinct from the NEFT `batch_id` which identifies an hourly tick.
pub fn bulk_upload_batch_id(at: DateTime<Utc>) -> String {
    format!("BULK{}{}", at.format("%Y%m%d%H%M%S"), monotonic_nanos())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn references_are_unique_and_prefixed() {
        let a = transaction_reference();
        let b = transaction_reference();
        assert_ne!(a, b);
        assert!(a.starts_with("TXN"));
    }

    #[test]
    fn batch_id_format() {
        let clock = FixedClock::ymd_hms(2026, 7, 29, 11, 0, 0);
        assert_eq!(neft_batch_id(clock.now()), "NEFT2026072911");
    }

    #[test]
    fn fixed_clock_is_stable() {
        let clock = FixedClock::ymd_hms(2026, 1, 1, 0, 0, 0);
        assert_eq!(clock.now(), clock.now());
    }
}
