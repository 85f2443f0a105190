//! Wall-E Server
//!
//! Deposit intake API plus the settlement, completion, notification, outbox
//! and capture processors, in one process.

mod api;
mod config;
mod pipeline;
mod server;
mod shutdown;
mod state;

use clap::{Parser, Subcommand};
use config::{ConfigLoader, get_database_url, get_wallet_database_url};
use pipeline::spawn_pipeline;
use server::{build_router, run_server};
use shutdown::spawn_shutdown_watch;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use walle_core::bus::{EventBus, InMemoryBus};
use walle_core::events::EventProducer;
use walle_core::framework::DatabaseProcessor;
use walle_core::processors::{CaptureJob, Intake};
use walle_core::store::{BalanceStore, LedgerStore};

/// Wall-E - Deposit event pipeline
#[derive(Parser, Debug)]
#[command(name = "walle-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./walle-config.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Serve the intake API and run the pipeline (default)
    Serve,
    /// Run one capture pass over the trailing window and exit
    Capture,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    // Parse command line arguments
    let args = Args::parse();

    tracing::info!("Starting walle-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = ConfigLoader::new(&args.config, args.listen);
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    tracing::info!("Configuration loaded from {:?}", args.config);

    // Get database URLs from environment
    let database_url = get_database_url().map_err(|e| {
        tracing::error!("DATABASE_URL environment variable not set");
        e
    })?;
    let wallet_database_url = get_wallet_database_url(&database_url);

    tracing::info!("Connecting to ledger database...");
    let ledger_pool = connect(&database_url).await?;
    let wallet_pool = if wallet_database_url == database_url {
        ledger_pool.clone()
    } else {
        tracing::info!("Connecting to wallet database...");
        connect(&wallet_database_url).await?
    };
    tracing::info!("Database connections established");

    // Run migrations if requested
    if args.migrate {
        run_migrations(&ledger_pool, &wallet_pool).await?;
    }

    let ledger: Arc<dyn LedgerStore> = Arc::new(DatabaseProcessor::new(ledger_pool.clone()));
    let balances: Arc<dyn BalanceStore> = Arc::new(DatabaseProcessor::new(wallet_pool.clone()));

    let result = match args.command.unwrap_or(Command::Serve) {
        Command::Capture => {
            let job = CaptureJob::new(ledger, loaded_config.pipeline.capture);
            job.run_once()
                .await
                .map(|report| {
                    tracing::info!(
                        window_start = %report.window.start,
                        window_end = %report.window.end,
                        captured = report.captured.len(),
                        "Capture pass finished"
                    );
                })
                .map_err(anyhow::Error::from)
        }
        Command::Serve => {
            let (_shutdown_tx, shutdown_rx) = spawn_shutdown_watch();

            let bus: Arc<dyn EventBus> = Arc::new(InMemoryBus::new(
                loaded_config.pipeline.bus.redelivery_timeout,
            ));

            let processor_handles = spawn_pipeline(
                &loaded_config.pipeline,
                bus.clone(),
                ledger.clone(),
                balances,
                shutdown_rx.clone(),
            )?;

            let state = AppState::new(Intake::new(ledger, EventProducer::new(bus)));
            let router = build_router(state);

            let listen_addr = loaded_config.server.listen;
            tracing::info!("Starting HTTP server on {}", listen_addr);
            let result = run_server(router, listen_addr, shutdown_rx).await;

            tracing::info!("Waiting for processors to drain...");
            for handle in processor_handles {
                if let Err(e) = handle.await {
                    tracing::error!("Processor task failed: {}", e);
                }
            }
            result.map_err(Into::into)
        }
    };

    // Close database connections gracefully
    tracing::info!("Closing database connections...");
    ledger_pool.close().await;
    wallet_pool.close().await;
    tracing::info!("Shutdown complete");

    result
}

async fn connect(url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })
}

/// Apply both migration sets. When both stores share one database each
/// migrator must tolerate the other's applied versions.
async fn run_migrations(ledger_pool: &PgPool, wallet_pool: &PgPool) -> anyhow::Result<()> {
    tracing::info!("Running database migrations...");

    let mut ledger_migrator = sqlx::migrate!("../migrations/ledger");
    ledger_migrator.set_ignore_missing(true);
    ledger_migrator.run(ledger_pool).await.map_err(|e| {
        tracing::error!("Failed to run ledger migrations: {}", e);
        e
    })?;

    let mut wallet_migrator = sqlx::migrate!("../migrations/wallet");
    wallet_migrator.set_ignore_missing(true);
    wallet_migrator.run(wallet_pool).await.map_err(|e| {
        tracing::error!("Failed to run wallet migrations: {}", e);
        e
    })?;

    tracing::info!("Migrations completed successfully");
    Ok(())
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
