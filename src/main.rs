mod adapters;
mod alerts;
mod api;
mod config;
mod enricher;
mod error;
mod matcher;
mod opportunity;
mod profit;
mod scheduler;
mod types;

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::adapters::{KalshiAdapter, PolymarketAdapter};
use crate::alerts::{AlertEvaluator, AlertStore};
use crate::api::{router, ApiState};
use crate::config::Config;
use crate::error::Result;
use crate::matcher::TokenOverlapScorer;
use crate::scheduler::ScanScheduler;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let pool = sqlx::SqlitePool::connect(&format!("sqlite:{}?mode=rwc", cfg.db_path)).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database ready at {}", cfg.db_path);

    // --- Alert storage + evaluation ---
    let alert_store = AlertStore::new(pool.clone());
    let evaluator = Arc::new(AlertEvaluator::new(alert_store.clone()));

    // --- Platform adapters ---
    let polymarket = Arc::new(PolymarketAdapter::new(&cfg)?);
    let kalshi = Arc::new(KalshiAdapter::new(&cfg)?);
    info!(
        "Adapters ready: polymarket={} kalshi={}",
        cfg.gamma_api_url, cfg.kalshi_api_url,
    );

    // --- Scan scheduler (background, every SCAN_INTERVAL_SECS) ---
    let (scan_scheduler, handle) = ScanScheduler::new(
        polymarket,
        kalshi,
        Box::new(TokenOverlapScorer::new()),
        Arc::clone(&evaluator),
        cfg.clone(),
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_task = tokio::spawn(async move { scan_scheduler.run(shutdown_rx).await });
    info!(
        "Scan scheduler started (interval={}s, min_similarity={}, min_spread={}%)",
        cfg.scan_interval_secs, cfg.min_similarity, cfg.min_spread_percent,
    );

    // --- HTTP API server ---
    let api_state = ApiState {
        scheduler: handle,
        alerts: alert_store,
        evaluator,
        config: Arc::new(cfg.clone()),
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    // Stop the scan loop before dropping the pool.
    let _ = shutdown_tx.send(true);
    let _ = scheduler_task.await;

    Ok(())
}
