// ===============================
// src/metrics.rs
// ===============================
use once_cell::sync::Lazy;
use prometheus::{
    Counter, Encoder, Gauge, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

// Single custom registry; everything below is registered here.
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

// -------- Loop health --------
pub static TICKS: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("ticks_total", "control loop ticks").unwrap());

pub static TICKS_SKIPPED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("ticks_skipped_total", "ticks skipped for missing/bad book data").unwrap()
});

// -------- Order lifecycle --------
pub static ORDERS_SUBMITTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("orders_submitted_total", "limit orders submitted"),
        &["side"],
    )
    .unwrap()
});

pub static ORDERS_CANCELLED: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("orders_cancelled_total", "stale orders cancelled").unwrap());

pub static FILLS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("fills_total", "confirmed fills (kind: resting|immediate|flatten)"),
        &["side", "kind"],
    )
    .unwrap()
});

pub static FLATTENS: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("flattens_total", "emergency flatten orders issued").unwrap());

pub static VENUE_ERRORS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("venue_errors_total", "venue call failures (op: submit|cancel|market|fills)"),
        &["op"],
    )
    .unwrap()
});

pub static RESTING_ORDER: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("resting_order", "1 while a limit order is resting, else 0").unwrap()
});

// -------- Position & PnL --------
pub static REBATE_TOTAL: Lazy<Counter> =
    Lazy::new(|| Counter::new("rebate_total_usd", "total rebates earned in USD").unwrap());

pub static NET_DELTA: Lazy<Gauge> =
    Lazy::new(|| Gauge::new("net_delta_usd", "current net delta exposure in USD").unwrap());

pub static REALIZED_PNL: Lazy<Gauge> =
    Lazy::new(|| Gauge::new("realized_pnl_usd", "cumulative realized PnL in USD").unwrap());

pub static VOL_RATIO: Lazy<Gauge> =
    Lazy::new(|| Gauge::new("vol_ratio", "current volatility window ratio").unwrap());

// ---- Config visibility ----
pub static CONFIG_FEED_MODE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(Opts::new("config_feed_mode", "feed mode (label: mode)"), &["mode"]).unwrap()
});

pub static CONFIG_VENUE_MODE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(Opts::new("config_venue_mode", "venue mode (label: mode)"), &["mode"])
        .unwrap()
});

pub static CONFIG_SYMBOL: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("config_symbol", "configured symbol (label: symbol)"),
        &["symbol"],
    )
    .unwrap()
});

pub static CONFIG_DRY_RUN: Lazy<IntGauge> =
    Lazy::new(|| IntGauge::new("config_dry_run", "1 if dry-run mode forced the sim venue").unwrap());

pub fn init() {
    for m in [
        REGISTRY.register(Box::new(TICKS.clone())),
        REGISTRY.register(Box::new(TICKS_SKIPPED.clone())),
        REGISTRY.register(Box::new(ORDERS_SUBMITTED.clone())),
        REGISTRY.register(Box::new(ORDERS_CANCELLED.clone())),
        REGISTRY.register(Box::new(FILLS.clone())),
        REGISTRY.register(Box::new(FLATTENS.clone())),
        REGISTRY.register(Box::new(VENUE_ERRORS.clone())),
        REGISTRY.register(Box::new(RESTING_ORDER.clone())),
        REGISTRY.register(Box::new(REBATE_TOTAL.clone())),
        REGISTRY.register(Box::new(NET_DELTA.clone())),
        REGISTRY.register(Box::new(REALIZED_PNL.clone())),
        REGISTRY.register(Box::new(VOL_RATIO.clone())),
        REGISTRY.register(Box::new(CONFIG_FEED_MODE.clone())),
        REGISTRY.register(Box::new(CONFIG_VENUE_MODE.clone())),
        REGISTRY.register(Box::new(CONFIG_SYMBOL.clone())),
        REGISTRY.register(Box::new(CONFIG_DRY_RUN.clone())),
    ] {
        let _ = m;
    }
}

// Encode all metrics in Prometheus text format
fn encode_metrics() -> Vec<u8> {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buf = Vec::new();
    if encoder.encode(&families, &mut buf).is_err() || buf.is_empty() {
        buf.extend_from_slice(b"# no metrics\n");
    }
    buf
}

// Serve one HTTP request (GET / or /metrics) — tiny HTTP 1.1 responder
fn handle_client(mut stream: TcpStream) {
    let mut _req_buf = [0u8; 1024];
    let _ = stream.read(&mut _req_buf);

    let body = encode_metrics();
    let header = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );

    let _ = stream.write_all(header.as_bytes());
    let _ = stream.write_all(&body);
    let _ = stream.flush();
}

// Run the metrics server in a dedicated OS thread (keeps the Tokio runtime clean)
pub async fn serve_metrics(port: u16) {
    thread::spawn(move || {
        let addr = format!("0.0.0.0:{port}");
        let listener = TcpListener::bind(&addr)
            .unwrap_or_else(|e| panic!("metrics bind {} failed: {}", addr, e));
        eprintln!("metrics listening on http://{addr}/ (and /metrics)");

        for conn in listener.incoming() {
            match conn {
                Ok(stream) => handle_client(stream),
                Err(e) => eprintln!("metrics accept error: {}", e),
            }
        }
    });
}
