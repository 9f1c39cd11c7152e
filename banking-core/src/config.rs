//! Runtime configuration, loaded the way the teacher's `config.rs` loads
//! `MonitorConfig`: environment variables layered over a hardcoded default,
//! with an optional on-disk JSON override for local development.

use std::fs;
use std::path::PathBuf;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One band of the NEFT/RTGS tariff table: amounts `<= upper_bound` (or
/// unbounded, when `upper_bound` is `None`) are charged `charge`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TariffBand {
    pub upper_bound: Option<Decimal>,
    pub charge: Decimal,
}

impl TariffBand {
    pub const fn new(upper_bound: Option<Decimal>, charge: Decimal) -> Self {
        Self { upper_bound, charge }
    }
}

fn default_neft_tariff() -> Vec<TariffBand> {
    vec![
        TariffBand::new(Some(dec!(10000)), dec!(2.50)),
        TariffBand::new(Some(dec!(100000)), dec!(5.00)),
        TariffBand::new(Some(dec!(200000)), dec!(15.00)),
        TariffBand::new(None, dec!(25.00)),
    ]
}

fn default_rtgs_tariff() -> Vec<TariffBand> {
    vec![
        TariffBand::new(Some(dec!(500000)), dec!(30.00)),
        TariffBand::new(None, dec!(55.00)),
    ]
}

/// Charge for `amount` given an ascending, last-band-unbounded tariff table.
pub fn charge_for(tariff: &[TariffBand], amount: Decimal) -> Decimal {
    for band in tariff {
        match band.upper_bound {
            Some(bound) if amount <= bound => return band.charge,
            Some(_) => continue,
            None => return band.charge,
        }
    }
    tariff
        .last()
        .map(|b| b.charge)
        .unwrap_or(Decimal::ZERO)
}

/// A time-of-day operating window, e.g. NEFT's 08:00-19:00 or RTGS's
/// 09:00-16:30. Bounds are inclusive at the start and exclusive at the end,
/// compared as `(hour, minute)` pairs so a half-hour cutoff like RTGS's can
/// be expressed exactly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DailyWindow {
    pub start_hour: u32,
    pub end_hour: u32,
    #[serde(default)]
    pub start_minute: u32,
    #[serde(default)]
    pub end_minute: u32,
}

impl DailyWindow {
    pub const fn whole_hours(start_hour: u32, end_hour: u32) -> Self {
        Self { start_hour, end_hour, start_minute: 0, end_minute: 0 }
    }

    pub fn contains(&self, hour: u32, minute: u32) -> bool {
        let now = (hour, minute);
        now >= (self.start_hour, self.start_minute) && now < (self.end_hour, self.end_minute)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankingConfig {
    pub database_url: String,
    pub max_db_connections: usize,

    pub neft_window: DailyWindow,
    pub neft_tariff: Vec<TariffBand>,
    pub neft_estimated_minutes: i64,

    pub rtgs_window: DailyWindow,
    pub rtgs_weekdays_only: bool,
    pub rtgs_minimum_amount: Decimal,
    pub rtgs_tariff: Vec<TariffBand>,

    /// Probability in [0, 1] that the simulated external bank adapter
    /// reports failure. A test affordance per spec.md §9 Open Questions,
    /// not a production value — kept configurable so it can be dialed to
    /// zero or one in integration tests.
    pub external_failure_rate: f64,
    pub external_call_timeout_secs: u64,

    pub default_minimum_balance: Decimal,
    pub session_token_lifetime_secs: u64,
}

impl Default for BankingConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/banking".to_string(),
            max_db_connections: 16,
            neft_window: DailyWindow::whole_hours(8, 19),
            neft_tariff: default_neft_tariff(),
            neft_estimated_minutes: 30,
            rtgs_window: DailyWindow { start_hour: 9, end_hour: 16, start_minute: 0, end_minute: 30 },
            rtgs_weekdays_only: true,
            rtgs_minimum_amount: dec!(200000),
            rtgs_tariff: default_rtgs_tariff(),
            external_failure_rate: 0.05,
            external_call_timeout_secs: 10,
            default_minimum_balance: dec!(0),
            session_token_lifetime_secs: 3600,
        }
    }
}

fn config_override_path() -> PathBuf {
    PathBuf::from("banking_config.json")
}

/// Load config from environment variables, falling back to `Default`, then
/// apply an on-disk JSON override if `banking_config.json` exists. Mirrors
/// the teacher's `load_monitor_config` three-way log-and-fall-back shape.
pub fn load_banking_config() -> BankingConfig {
    let mut config = BankingConfig::default();

    if let Ok(url) = std::env::var("DATABASE_URL") {
        config.database_url = url;
    }
    if let Ok(rate) = std::env::var("EXTERNAL_FAILURE_RATE") {
        match rate.parse::<f64>() {
            Ok(r) => config.external_failure_rate = r,
            Err(e) => tracing::warn!("Invalid EXTERNAL_FAILURE_RATE '{}': {}", rate, e),
        }
    }

    match load_config_override() {
        Ok(Some(overrides)) => {
            tracing::info!("Applying on-disk configuration override");
            config = overrides;
        }
        Ok(None) => {
            tracing::info!("No on-disk configuration override found, using environment/default");
        }
        Err(e) => {
            tracing::error!("Error loading configuration override: {}, using environment/default", e);
        }
    }

    config
}

fn load_config_override() -> Result<Option<BankingConfig>> {
    let path = config_override_path();
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(&path).map_err(Error::Io)?;
    let config: BankingConfig = serde_json::from_str(&contents)
        .map_err(|e| Error::Internal(format!("Failed to parse config override: {e}")))?;
    Ok(Some(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neft_tariff_bands() {
        let tariff = default_neft_tariff();
        assert_eq!(charge_for(&tariff, dec!(5000)), dec!(2.50));
        assert_eq!(charge_for(&tariff, dec!(10000)), dec!(2.50));
        assert_eq!(charge_for(&tariff, dec!(10001)), dec!(5.00));
        assert_eq!(charge_for(&tariff, dec!(100000)), dec!(5.00));
        assert_eq!(charge_for(&tariff, dec!(100001)), dec!(15.00));
        assert_eq!(charge_for(&tariff, dec!(200000)), dec!(15.00));
        assert_eq!(charge_for(&tariff, dec!(200001)), dec!(25.00));
        assert_eq!(charge_for(&tariff, dec!(5_000_000)), dec!(25.00));
    }

    #[test]
    fn rtgs_tariff_bands() {
        let tariff = default_rtgs_tariff();
        assert_eq!(charge_for(&tariff, dec!(200000)), dec!(30.00));
        assert_eq!(charge_for(&tariff, dec!(500000)), dec!(30.00));
        assert_eq!(charge_for(&tariff, dec!(500001)), dec!(55.00));
    }

    #[test]
    fn default_config_is_sane() {
        let config = BankingConfig::default();
        assert_eq!(config.neft_window.start_hour, 8);
        assert_eq!(config.neft_window.end_hour, 19);
        assert_eq!(config.rtgs_minimum_amount, dec!(200000));
    }

    #[test]
    fn rtgs_window_cuts_off_at_the_half_hour() {
        let window = BankingConfig::default().rtgs_window;
        assert!(window.contains(16, 29));
        assert!(!window.contains(16, 30));
        assert!(!window.contains(8, 59));
        assert!(window.contains(9, 0));
    }
}
