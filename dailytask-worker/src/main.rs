//! # DailyTask Worker
//!
//! Runs the daily reminder scan until SIGTERM or Ctrl+C.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p dailytask-worker
//! ```

use dailytask_shared::db::migrations::run_migrations;
use dailytask_shared::db::pool::{close_pool, create_pool, DatabaseConfig};
use dailytask_worker::config::WorkerConfig;
use dailytask_worker::mailer::LogMailer;
use dailytask_worker::reminder::{DatabaseCandidates, ReminderJob, ReminderScheduler};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "dailytask_worker=debug,dailytask_shared=info".into());

    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
    token.cancel();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("DailyTask Worker v{} starting", env!("CARGO_PKG_VERSION"));

    let config = WorkerConfig::from_env()?;

    let pool = create_pool(
        DatabaseConfig::new(config.database_url.clone())
            .with_max_connections(config.max_connections),
    )
    .await?;
    run_migrations(&pool).await?;

    let job = ReminderJob::new(
        Arc::new(DatabaseCandidates::new(pool.clone())),
        Arc::new(LogMailer),
        chrono::Duration::hours(config.window_hours),
    );
    let scheduler = ReminderScheduler::new(job, config.reminder_hour_utc);

    tokio::spawn(shutdown_signal(scheduler.shutdown_token()));
    scheduler.run().await;

    close_pool(pool).await;
    tracing::info!("Worker stopped");

    Ok(())
}
