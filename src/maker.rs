// ===============================
// src/maker.rs
// ===============================
//
// The control loop. One tick runs strictly in sequence: cache read ->
// volatility/gauges -> lifecycle transition -> at most one venue call ->
// reconciliation. At most one venue call is ever outstanding, which is what
// makes the single-resting-order invariant enforceable.
//
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::book::BookCache;
use crate::config::Config;
use crate::domain::{Clock, Fill, OrderbookTop, RestingOrder};
use crate::lifecycle::OrderLifecycle;
use crate::metrics;
use crate::quote::QuoteEngine;
use crate::reconcile::FillReconciler;
use crate::risk::RiskManager;
use crate::venue::{ExecutionVenue, SubmitOutcome, VenueError};
use crate::volatility::VolatilityWindow;

/// What one tick did; logged at debug and asserted on in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Cache miss or malformed snapshot: tick skipped.
    NoData,
    /// Order still outstanding, nothing to do.
    Resting,
    /// Stale order cancelled; no resubmission this tick.
    Cancelled,
    /// Resting order confirmed filled.
    Filled,
    /// Submission filled on arrival.
    FilledImmediate,
    /// New resting order placed.
    Quoted,
    /// Emergency flatten order executed.
    Flattened,
    /// Risk budget exhausted or size below minimum; no quote.
    Skipped,
    /// Venue call failed; state fell back to safe.
    VenueFailed,
}

pub struct MarketMaker<V: ExecutionVenue, C: Clock> {
    symbol: String,
    account: String,
    loop_interval_ms: u64,
    books: BookCache,
    venue: V,
    clock: C,
    vol: VolatilityWindow,
    quotes: QuoteEngine,
    risk: RiskManager,
    lifecycle: OrderLifecycle,
    reconciler: FillReconciler,
}

impl<V: ExecutionVenue, C: Clock> MarketMaker<V, C> {
    pub fn new(
        cfg: &Config,
        books: BookCache,
        venue: V,
        clock: C,
        initial_delta_usd: f64,
        ledger_tx: Option<mpsc::Sender<Fill>>,
    ) -> Self {
        Self {
            symbol: cfg.symbol.clone(),
            account: cfg.account.clone(),
            loop_interval_ms: cfg.loop_interval_ms,
            books,
            venue,
            clock,
            vol: VolatilityWindow::new(cfg.vol_window),
            quotes: QuoteEngine {
                tick_size: cfg.tick_size,
                base_offset_ticks: cfg.base_offset_ticks,
                vol_threshold: cfg.vol_threshold,
                target_order_usd: cfg.target_order_usd,
                min_order_usd: cfg.min_order_usd,
                size_taper_ratio: cfg.size_taper_ratio,
            },
            risk: RiskManager::new(cfg.max_delta_usd, cfg.flatten_ratio, initial_delta_usd),
            lifecycle: OrderLifecycle::new(crate::domain::Side::Buy, cfg.stale_timeout_ms),
            reconciler: FillReconciler::new(cfg.maker_fee, cfg.rebate_rate, ledger_tx),
        }
    }

    pub fn risk(&self) -> &RiskManager {
        &self.risk
    }

    pub fn lifecycle(&self) -> &OrderLifecycle {
        &self.lifecycle
    }

    pub fn vol(&self) -> &VolatilityWindow {
        &self.vol
    }

    pub fn venue(&self) -> &V {
        &self.venue
    }

    /// One tick. Never fatal: every failure path degrades to "no quoting".
    pub async fn step(&mut self) -> StepOutcome {
        let top = match self.books.top_of_book(&self.symbol) {
            Some(t) => t,
            None => {
                metrics::TICKS_SKIPPED.inc();
                return StepOutcome::NoData;
            }
        };

        self.vol.push(top.mid());
        metrics::VOL_RATIO.set(self.vol.ratio());
        metrics::NET_DELTA.set(self.risk.exposure());

        if !self.lifecycle.is_idle() {
            return self.drive_resting().await;
        }
        if self.risk.should_flatten() {
            return self.flatten(top.mid()).await;
        }
        self.try_quote(&top).await
    }

    /// Resting -> {Cancelled, Filled, Resting}. Stale check first, then one
    /// fill poll; the cancel race against the matching engine is resolved by
    /// always treating the order as gone.
    async fn drive_resting(&mut self) -> StepOutcome {
        if self.lifecycle.is_stale(self.clock.now_ms()) {
            let order = match self.lifecycle.take_cancelled() {
                Some(o) => o,
                None => return StepOutcome::Resting,
            };
            match self.venue.cancel(&self.symbol, order.id).await {
                Ok(()) => info!(id = order.id, submitted_at = order.submitted_at_ms, "stale order cancelled"),
                Err(VenueError::UnknownOrder) => {
                    warn!(id = order.id, "order gone on cancel, treating as done")
                }
                Err(e) => {
                    metrics::VENUE_ERRORS.with_label_values(&["cancel"]).inc();
                    warn!(?e, id = order.id, "cancel failed, treating order as gone");
                }
            }
            metrics::ORDERS_CANCELLED.inc();
            metrics::RESTING_ORDER.set(0);
            return StepOutcome::Cancelled;
        }

        let fills = match self.venue.recent_fills(&self.account).await {
            Ok(f) => f,
            Err(e) => {
                metrics::VENUE_ERRORS.with_label_values(&["fills"]).inc();
                warn!(?e, "fill poll failed");
                return StepOutcome::Resting;
            }
        };

        let resting_id = self.lifecycle.resting().map(|o| o.id);
        let hit = fills.iter().find(|f| Some(f.order_id) == resting_id).copied();
        if let Some(ev) = hit {
            if let Some(order) = self.lifecycle.complete_fill() {
                self.vol.clear();
                let ts = self.clock.now_ms();
                self.reconciler
                    .on_fill(&mut self.risk, order.side, ev.price, ev.size, ts)
                    .await;
                metrics::FILLS
                    .with_label_values(&[order.side.as_str(), "resting"])
                    .inc();
                metrics::RESTING_ORDER.set(0);
                return StepOutcome::Filled;
            }
        }
        StepOutcome::Resting
    }

    /// Idle -> Resting (or immediate fill). Stays Idle on failure; the next
    /// tick retries with a fresh snapshot.
    async fn try_quote(&mut self, top: &OrderbookTop) -> StepOutcome {
        let side = self.lifecycle.quoting_side();
        let size_usd = self.quotes.size_usd(self.risk.exposure());
        if size_usd <= 0.0 {
            return StepOutcome::Skipped;
        }
        let price = self.quotes.price(side, top.best_bid, top.best_ask, self.vol.ratio());
        if price <= 0.0 {
            return StepOutcome::Skipped;
        }
        let size = size_usd / price;

        match self.venue.submit_limit(&self.symbol, side, size, price, true).await {
            Ok(SubmitOutcome::Resting(id)) => {
                self.lifecycle.accept_resting(RestingOrder {
                    id,
                    side,
                    price,
                    size,
                    submitted_at_ms: self.clock.now_ms(),
                });
                metrics::ORDERS_SUBMITTED.with_label_values(&[side.as_str()]).inc();
                metrics::RESTING_ORDER.set(1);
                info!(id, side = side.as_str(), px = price, sz = size, "resting order placed");
                StepOutcome::Quoted
            }
            Ok(SubmitOutcome::Filled(fill)) => {
                metrics::ORDERS_SUBMITTED.with_label_values(&[side.as_str()]).inc();
                self.lifecycle.complete_immediate();
                self.vol.clear();
                let ts = self.clock.now_ms();
                self.reconciler
                    .on_fill(&mut self.risk, side, fill.price, fill.size, ts)
                    .await;
                metrics::FILLS
                    .with_label_values(&[side.as_str(), "immediate"])
                    .inc();
                StepOutcome::FilledImmediate
            }
            Err(e) => {
                metrics::VENUE_ERRORS.with_label_values(&["submit"]).inc();
                error!(?e, side = side.as_str(), px = price, "submit failed, staying idle");
                StepOutcome::VenueFailed
            }
        }
    }

    /// Exposure hit the flatten threshold: de-risk with a marketable order
    /// sized to bring the net delta to zero. Never a resting order here —
    /// the goal is guaranteed de-risking, not rebate capture.
    async fn flatten(&mut self, mid: f64) -> StepOutcome {
        let side = self.risk.flatten_side();
        let size = self.risk.flatten_size(mid);
        if size <= 0.0 {
            return StepOutcome::Skipped;
        }
        metrics::FLATTENS.inc();
        warn!(
            side = side.as_str(),
            sz = size,
            delta = self.risk.exposure(),
            "exposure at flatten threshold, sending market order"
        );
        match self.venue.submit_market(&self.symbol, side, size).await {
            Ok(fill) => {
                self.vol.clear();
                let ts = self.clock.now_ms();
                self.reconciler
                    .on_fill(&mut self.risk, side, fill.price, fill.size, ts)
                    .await;
                metrics::FILLS.with_label_values(&[side.as_str(), "flatten"]).inc();
                StepOutcome::Flattened
            }
            Err(e) => {
                metrics::VENUE_ERRORS.with_label_values(&["market"]).inc();
                error!(?e, "flatten order failed");
                StepOutcome::VenueFailed
            }
        }
    }

    /// Drive ticks until shutdown is signalled, then wind down.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(Duration::from_millis(self.loop_interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    metrics::TICKS.inc();
                    let outcome = self.step().await;
                    tracing::debug!(?outcome, "tick");
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        self.shutdown().await;
    }

    /// Graceful wind-down: cancel the resting order, then flatten any
    /// remaining exposure. Each step is best-effort and swallows its own
    /// errors so a failure in one never blocks the other.
    pub async fn shutdown(&mut self) {
        if let Some(order) = self.lifecycle.take_cancelled() {
            match self.venue.cancel(&self.symbol, order.id).await {
                Ok(()) => info!(id = order.id, "shutdown: resting order cancelled"),
                Err(e) => warn!(?e, id = order.id, "shutdown: cancel failed, continuing"),
            }
        }

        let exposure = self.risk.exposure();
        if exposure.abs() < 1e-9 {
            info!("shutdown: flat, nothing to do");
            return;
        }
        match self.books.top_of_book(&self.symbol) {
            Some(top) => {
                let side = self.risk.flatten_side();
                let size = self.risk.flatten_size(top.mid());
                match self.venue.submit_market(&self.symbol, side, size).await {
                    Ok(fill) => {
                        let ts = self.clock.now_ms();
                        self.reconciler
                            .on_fill(&mut self.risk, side, fill.price, fill.size, ts)
                            .await;
                        info!(delta = self.risk.exposure(), "shutdown: exposure flattened");
                    }
                    Err(e) => warn!(?e, exposure, "shutdown: flatten failed, exposure remains"),
                }
            }
            None => warn!(exposure, "shutdown: no market data, exposure remains"),
        }
    }
}
