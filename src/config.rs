// ===============================
// src/config.rs
// ===============================
use std::env;

use dotenvy::dotenv;

/// Where top-of-book snapshots come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FeedMode {
    Mock,
    Hyperliquid,
}

impl FeedMode {
    pub fn from_env(key: &str, default_mode: FeedMode) -> FeedMode {
        match env::var(key).unwrap_or_default().to_ascii_lowercase().as_str() {
            "mock" => FeedMode::Mock,
            "hyperliquid" | "hl" => FeedMode::Hyperliquid,
            _ => default_mode,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedMode::Mock => "mock",
            FeedMode::Hyperliquid => "hyperliquid",
        }
    }
}

/// Where orders go.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VenueMode {
    Mock,
    Live,
}

impl VenueMode {
    pub fn from_env(key: &str, default_mode: VenueMode) -> VenueMode {
        match env::var(key).unwrap_or_default().to_ascii_lowercase().as_str() {
            "mock" | "sim" => VenueMode::Mock,
            "live" => VenueMode::Live,
            _ => default_mode,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VenueMode::Mock => "mock",
            VenueMode::Live => "live",
        }
    }
}

/// Static configuration, read once at startup. The control loop never
/// re-reads the environment.
#[derive(Clone, Debug)]
pub struct Config {
    // instrument
    pub symbol: String,
    pub tick_size: f64,

    // quoting
    pub target_order_usd: f64,
    pub min_order_usd: f64,
    pub base_offset_ticks: u32,
    pub vol_threshold: f64,
    pub vol_window: usize,

    // risk
    pub max_delta_usd: f64,
    pub flatten_ratio: f64,    // flatten when |delta| >= ratio * max
    pub size_taper_ratio: f64, // full size while headroom >= ratio * target

    // fees
    pub maker_fee: f64,
    pub rebate_rate: f64,

    // timing
    pub stale_timeout_ms: i64,
    pub loop_interval_ms: u64,

    // modes & endpoints
    pub dry_run: bool,
    pub feed_mode: FeedMode,
    pub venue_mode: VenueMode,
    pub ws_url: String,
    pub rest_url: String,
    pub account: String,

    // files / metrics
    pub ledger_file: Option<String>,
    pub metrics_port: u16,

    // sim venue behaviour
    pub sim_fill_after_ms: i64,
    pub sim_immediate_fill_pct: u8,
}

fn env_f64(key: &str, default: f64) -> f64 {
    env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key).unwrap_or_default().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => true,
        "0" | "false" | "no" => false,
        _ => default,
    }
}

pub fn load() -> Config {
    // Read .env first so SYMBOL, LEDGER_FILE, etc. are visible.
    let _ = dotenv();

    let symbol = env::var("SYMBOL").unwrap_or_else(|_| "SOL".to_string());

    let feed_mode = FeedMode::from_env("FEED_MODE", FeedMode::Mock);
    let venue_mode = VenueMode::from_env("VENUE_MODE", VenueMode::Mock);

    let ws_url = env::var("HL_WS_URL")
        .unwrap_or_else(|_| "wss://api.hyperliquid.xyz/ws".to_string());
    let rest_url = env::var("HL_REST_URL")
        .unwrap_or_else(|_| "https://api.hyperliquid.xyz".to_string());
    let account = env::var("HL_ACCOUNT").unwrap_or_default();

    let metrics_port = env::var("METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(9898);

    Config {
        symbol,
        tick_size: env_f64("TICK_SIZE", 0.01),

        target_order_usd: env_f64("TARGET_ORDER_USD", 10.0),
        min_order_usd: env_f64("MIN_ORDER_USD", 1.0),
        base_offset_ticks: env::var("BASE_OFFSET_TICKS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(20),
        vol_threshold: env_f64("VOL_THRESHOLD", 0.01),
        vol_window: env::var("VOL_WINDOW")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5),

        max_delta_usd: env_f64("MAX_DELTA_USD", 100.0),
        flatten_ratio: env_f64("FLATTEN_RATIO", 0.95),
        size_taper_ratio: env_f64("SIZE_TAPER_RATIO", 0.9),

        maker_fee: env_f64("MAKER_FEE", 0.0),
        rebate_rate: env_f64("REBATE_RATE", 0.00003),

        stale_timeout_ms: env::var("STALE_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5_000),
        loop_interval_ms: env::var("LOOP_INTERVAL_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(500),

        dry_run: env_bool("DRY_RUN", false),
        feed_mode,
        venue_mode,
        ws_url,
        rest_url,
        account,

        ledger_file: env::var("LEDGER_FILE").ok(),
        metrics_port,

        sim_fill_after_ms: env::var("SIM_FILL_AFTER_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(2_000),
        sim_immediate_fill_pct: env::var("SIM_IMMEDIATE_FILL_PCT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(20),
    }
}
