//! Core funds-movement engine for the retail banking service: the ledger,
//! the NEFT/RTGS external transfer rails, in-network QR/UPI payments, the
//! beneficiary lifecycle, and the identity/onboarding plane sit behind this
//! crate. `http.rs` is a thin actix-web skin over it; everything that
//! matters is callable directly, which is what the integration tests do.

pub mod authz;
pub mod beneficiary;
pub mod bulk;
pub mod config;
pub mod database;
pub mod external;
pub mod http;
pub mod ids;
pub mod ledger;
pub mod neft;
pub mod onboarding;
pub mod qr;
pub mod rtgs;
pub mod types;

pub use config::BankingConfig;
pub use ids::Clock;

use thiserror::Error;

/// Every failure mode the core can produce. `http.rs` maps each variant to
/// an HTTP status; nothing below this line knows about HTTP.
#[derive(Debug, Error)]
pub enum Error {
    #[error("authentication required")]
    Unauthenticated,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid user state: {0}")]
    InvalidUserState(String),

    #[error("invalid customer state: {0}")]
    InvalidCustomerState(String),

    #[error("invalid beneficiary state: {0}")]
    InvalidBeneficiaryState(String),

    #[error("invalid EFT state: {0}")]
    InvalidEftState(String),

    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("transaction would breach minimum balance")]
    MinBalanceBreach,

    #[error("account is not active")]
    AccountNotActive,

    #[error("RTGS is closed outside its operating window")]
    RtgsClosed,

    #[error("amount is below the RTGS floor")]
    RtgsBelowMin,

    #[error("NEFT accepts submissions only within its operating window")]
    NeftOutsideWindow,

    #[error("external bank rail failure: {0}")]
    ExternalFailure(String),

    #[error("conflicting concurrent update: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
