//! Batch runner for the analysis engine.
//!
//! An external scheduler (cron, systemd timer) invokes one subcommand per
//! cadence; the process connects, runs, prints a summary through tracing and
//! exits.

use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;

use motorent_api::{
    config::AppConfig,
    db,
    logging::init_tracing,
    services::{
        anomaly_detection::AnomalyDetectionService, financial_snapshots::FinancialSnapshotService,
    },
};

#[derive(Parser)]
#[command(name = "motorent-api", about = "Rental-fleet financial analysis engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the anomaly detectors without producing a snapshot
    Detect,
    /// Compute today's snapshot (runs detection first)
    Daily,
    /// Compute the current ISO week's snapshot
    Weekly,
    /// Compute the current month's snapshot
    Monthly,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = AppConfig::load()?;
    init_tracing(&cfg.log_level, cfg.log_json);

    let pool = Arc::new(db::establish_connection_from_app_config(&cfg).await?);
    if cfg.auto_migrate {
        db::run_migrations(&pool).await?;
    }

    match cli.command {
        Command::Detect => {
            let detection = AnomalyDetectionService::new(pool, cfg.analysis.clone());
            let summary = detection.run_all(chrono::Utc::now()).await;
            info!(total = summary.total, "detection pass complete");
            for (name, count) in &summary.per_detector {
                info!(detector = name, created = count, "detector result");
            }
        }
        Command::Daily => {
            let snapshots = FinancialSnapshotService::new(pool, cfg.analysis.clone());
            let snapshot = snapshots.run_daily().await?;
            info!(
                period_key = %snapshot.period_key,
                alerts = snapshot.alerts_generated,
                "daily snapshot stored"
            );
        }
        Command::Weekly => {
            let snapshots = FinancialSnapshotService::new(pool, cfg.analysis.clone());
            let snapshot = snapshots.run_weekly().await?;
            info!(
                period_key = %snapshot.period_key,
                alerts = snapshot.alerts_generated,
                "weekly snapshot stored"
            );
        }
        Command::Monthly => {
            let snapshots = FinancialSnapshotService::new(pool, cfg.analysis.clone());
            let snapshot = snapshots.run_monthly().await?;
            info!(
                period_key = %snapshot.period_key,
                alerts = snapshot.alerts_generated,
                "monthly snapshot stored"
            );
        }
    }

    Ok(())
}
