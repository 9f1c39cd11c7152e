//! Banking Core Binary

use std::sync::Arc;
use std::time::Duration;

use banking_core::authz::{Authenticator, DefaultPasswordHasher, InMemorySessionIssuer, LoginService};
use banking_core::beneficiary::{BeneficiaryRegistry, StaticIfscValidator};
use banking_core::bulk::BulkUploadService;
use banking_core::config::load_banking_config;
use banking_core::database::DatabaseClient;
use banking_core::external::SimulatedExternalBankAdapter;
use banking_core::http::{start_server, AppState};
use banking_core::ids::SystemClock;
use banking_core::ledger::Ledger;
use banking_core::neft::NeftService;
use banking_core::onboarding::OnboardingService;
use banking_core::qr::QrPaymentService;
use banking_core::rtgs::RtgsService;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    tracing::info!("Starting banking core");

    let config = load_banking_config();
    tracing::info!("Configuration:");
    tracing::info!("  Database: {}", config.database_url);
    tracing::info!("  NEFT window: {:02}:00-{:02}:00", config.neft_window.start_hour, config.neft_window.end_hour);
    tracing::info!("  RTGS window: {:02}:00-{:02}:00 (weekdays only: {})", config.rtgs_window.start_hour, config.rtgs_window.end_hour, config.rtgs_weekdays_only);

    let mut db = DatabaseClient::new(&config.database_url, config.max_db_connections).await?;
    db.run_migrations().await?;
    let db = Arc::new(db);

    let clock = Arc::new(SystemClock) as Arc<dyn banking_core::ids::Clock>;
    let ledger = Arc::new(Ledger::new(db.clone(), clock.clone()));

    let adapter = || SimulatedExternalBankAdapter::new(config.external_failure_rate, Duration::from_secs(config.external_call_timeout_secs));
    let session_issuer = Arc::new(InMemorySessionIssuer::default());

    let state = Arc::new(AppState {
        db: db.clone(),
        ledger: ledger.clone(),
        clock: clock.clone(),
        config: config.clone(),
        authenticator: Authenticator::new(db.clone(), session_issuer.clone()),
        login: LoginService::new(db.clone(), DefaultPasswordHasher, session_issuer.clone()),
        onboarding: OnboardingService::new(db.clone(), clock.clone()),
        beneficiaries: BeneficiaryRegistry::new(db.clone(), StaticIfscValidator::default()),
        neft: NeftService::new(db.clone(), ledger.clone(), adapter(), clock.clone(), config.clone()),
        rtgs: RtgsService::new(db.clone(), ledger.clone(), adapter(), clock.clone(), config.clone()),
        qr: QrPaymentService::new(db.clone(), ledger.clone(), clock.clone()),
        bulk: BulkUploadService::new(ledger.clone(), clock.clone()),
    });

    let bind_address = std::env::var("API_BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    // NEFT is deferred settlement: something has to actually run the hourly
    // batch. A ticker task stands in for a real cron/scheduler deployment.
    let batch_neft = NeftService::new(db.clone(), ledger.clone(), adapter(), clock.clone(), config.clone());
    let batch_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60 * 60));
        loop {
            interval.tick().await;
            match batch_neft.batch_tick().await {
                Ok(report) if !report.already_claimed => {
                    tracing::info!("NEFT batch {} processed: {} total, {} successful, {} failed", report.batch_id, report.total, report.successful, report.failed);
                }
                Ok(_) => {}
                Err(e) => tracing::error!("NEFT batch tick failed: {}", e),
            }
        }
    });

    tracing::info!("Press Ctrl+C to stop.");
    let result = tokio::select! {
        result = start_server(state, &bind_address) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
            Ok(())
        }
    };

    batch_task.abort();
    result?;
    Ok(())
}
