// ===============================
// src/main.rs
// ===============================
/*
 # live config as exported to metrics
 curl -s localhost:9898/metrics | egrep '^config_(feed_mode|venue_mode|symbol|dry_run)'

 # loop health and position
 curl -s localhost:9898/metrics | egrep '^(ticks_total|net_delta_usd|resting_order)'
*/
mod book;
mod config;
mod domain;
mod feed;
mod ledger;
mod lifecycle;
mod maker;
mod metrics;
mod quote;
mod reconcile;
mod risk;
mod venue;
mod venue_live;
mod venue_sim;
mod volatility;

use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::book::BookCache;
use crate::config::{FeedMode, VenueMode};
use crate::domain::{Fill, WallClock};
use crate::maker::MarketMaker;
use crate::venue::ExecutionVenue;

#[tokio::main]
async fn main() {
    // ---- Logging ----
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // ---- Load config ----
    let cfg = config::load();

    // ---- Metrics ----
    metrics::init();
    tokio::spawn(metrics::serve_metrics(cfg.metrics_port));

    // A dry run quotes against the sim venue no matter what VENUE_MODE says.
    let venue_mode = if cfg.dry_run && cfg.venue_mode == VenueMode::Live {
        warn!("DRY_RUN=1 overrides VENUE_MODE=live, using sim venue");
        VenueMode::Mock
    } else {
        cfg.venue_mode.clone()
    };

    info!(
        symbol = %cfg.symbol,
        feed_mode = %cfg.feed_mode.as_str(),
        venue_mode = %venue_mode.as_str(),
        dry_run = cfg.dry_run,
        max_delta_usd = cfg.max_delta_usd,
        target_order_usd = cfg.target_order_usd,
        loop_interval_ms = cfg.loop_interval_ms,
        "startup config"
    );

    metrics::CONFIG_FEED_MODE
        .with_label_values(&[cfg.feed_mode.as_str()])
        .set(1);
    metrics::CONFIG_VENUE_MODE
        .with_label_values(&[venue_mode.as_str()])
        .set(1);
    metrics::CONFIG_SYMBOL
        .with_label_values(&[cfg.symbol.as_str()])
        .set(1);
    metrics::CONFIG_DRY_RUN.set(if cfg.dry_run { 1 } else { 0 });

    // ---- Ledger (optional): recover position, then spawn the writer ----
    let mut initial_delta = 0.0;
    let mut ledger_tx: Option<mpsc::Sender<Fill>> = None;
    if let Some(path) = cfg.ledger_file.clone() {
        match ledger::recover_net_delta(&path).await {
            Ok(delta) => initial_delta = delta,
            Err(e) => warn!(?e, %path, "ledger recovery failed, starting from zero"),
        }
        let (tx, rx) = mpsc::channel::<Fill>(8192);
        tokio::spawn(ledger::run(rx, path));
        ledger_tx = Some(tx);
    }

    // ---- Market data ----
    let books = BookCache::new();
    match cfg.feed_mode {
        FeedMode::Mock => {
            tokio::spawn(feed::run_mock(books.clone(), cfg.symbol.clone()));
        }
        FeedMode::Hyperliquid => {
            tokio::spawn(feed::run_hyperliquid(
                books.clone(),
                cfg.symbol.clone(),
                cfg.ws_url.clone(),
            ));
        }
    }

    // ---- Shutdown signal ----
    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(?e, "ctrl_c listener failed");
            return;
        }
        info!("shutdown requested");
        let _ = stop_tx.send(true);
    });

    // ---- Control loop ----
    match venue_mode {
        VenueMode::Mock => {
            let venue = venue_sim::SimVenue::new(
                books.clone(),
                cfg.sim_fill_after_ms,
                cfg.sim_immediate_fill_pct,
            );
            run_loop(&cfg, books, venue, initial_delta, ledger_tx, stop_rx).await;
        }
        VenueMode::Live => {
            let venue = venue_live::LiveVenue::from_env(cfg.rest_url.clone());
            run_loop(&cfg, books, venue, initial_delta, ledger_tx, stop_rx).await;
        }
    }

    info!("stopped");
}

async fn run_loop<V: ExecutionVenue>(
    cfg: &config::Config,
    books: BookCache,
    venue: V,
    initial_delta: f64,
    ledger_tx: Option<mpsc::Sender<Fill>>,
    stop_rx: watch::Receiver<bool>,
) {
    let mut mm = MarketMaker::new(cfg, books, venue, WallClock, initial_delta, ledger_tx);
    mm.run(stop_rx).await;
}
