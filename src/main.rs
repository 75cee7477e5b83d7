use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use seller_repricer::marketplace::KaspiConnector;
use seller_repricer::scheduler::RepricingScheduler;
use seller_repricer::store::{self, SqliteCredentialSource, SqliteProductStore};
use seller_repricer::utils::telemetry;
use seller_repricer::{AppConfig, Repricer};

#[derive(Debug, Parser)]
#[command(name = "seller-repricer", version, about = "Keeps marketplace offers just below the cheapest competitor")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the scheduler until Ctrl-C or SIGTERM
    Run,
    /// Run a single cycle and print the report
    Once,
    /// Reprice one seller's products now
    User { user_id: String },
    /// Enable repricing for a product
    Enable {
        product_id: String,
        /// Lowest price the repricer may set (0 for none)
        #[arg(long)]
        floor: Decimal,
        /// Do not reprice the owner's products right away
        #[arg(long)]
        no_trigger: bool,
    },
    /// Disable repricing for a product
    Disable { product_id: String },
    /// Apply database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::from_env().context("Failed to load configuration")?;
    let _log_guard = telemetry::init_tracing(&config.logging)?;
    telemetry::init_metrics(&config.metrics)?;

    let pool = store::connect(&config.database).await?;
    store::migrate(&pool).await?;
    if matches!(cli.command, Command::Migrate) {
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let repricer = Arc::new(
        Repricer::from_config(
            Arc::new(SqliteCredentialSource::new(pool.clone())),
            Arc::new(SqliteProductStore::new(pool.clone())),
            Arc::new(KaspiConnector::new(&config.marketplace)?),
            &config.repricing,
        )
        .with_shutdown(shutdown_rx.clone()),
    );

    match cli.command {
        Command::Run => run_daemon(repricer, &config, shutdown_rx).await?,
        Command::Once => print_json(&repricer.run_cycle().await?)?,
        Command::User { user_id } => print_json(&repricer.run_for_user(&user_id).await?)?,
        Command::Enable {
            product_id,
            floor,
            no_trigger,
        } => {
            let product = repricer.enable_repricing(&product_id, floor).await?;
            print_json(&product)?;
            if !no_trigger {
                print_json(&repricer.run_for_user(&product.user_id).await?)?;
            }
        }
        Command::Disable { product_id } => {
            print_json(&repricer.disable_repricing(&product_id).await?)?;
        }
        Command::Migrate => {}
    }

    pool.close().await;
    Ok(())
}

async fn run_daemon(
    repricer: Arc<Repricer>,
    config: &AppConfig,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    info!("Starting seller repricer");

    let mut scheduler = RepricingScheduler::new(Arc::clone(&repricer), config.scheduler.clone()).await?;
    scheduler.start().await?;

    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            break;
        }
    }

    info!("Shutting down...");
    scheduler.shutdown().await?;
    repricer.wait_idle().await;

    let stats = scheduler.stats().await;
    info!(
        completed_cycles = stats.completed_cycles,
        failed_cycles = stats.failed_cycles,
        skipped_ticks = stats.skipped_ticks,
        "Scheduler stopped"
    );
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
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
}
