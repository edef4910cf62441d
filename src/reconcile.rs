// ===============================
// src/reconcile.rs
// ===============================
//
// Turns a confirmed fill into durable state: position, realized PnL, rebate
// counters, metrics and a ledger line. All state moves in one synchronous
// block per fill; the only await is the ledger handoff, which happens after
// the books are consistent.
//
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::domain::{Fill, Side};
use crate::metrics;
use crate::risk::RiskManager;

pub struct FillReconciler {
    maker_fee: f64,
    rebate_rate: f64,
    ledger_tx: Option<mpsc::Sender<Fill>>,
    cum_rebate: f64,
    realized_pnl: f64,
}

impl FillReconciler {
    pub fn new(maker_fee: f64, rebate_rate: f64, ledger_tx: Option<mpsc::Sender<Fill>>) -> Self {
        Self {
            maker_fee,
            rebate_rate,
            ledger_tx,
            cum_rebate: 0.0,
            realized_pnl: 0.0,
        }
    }

    pub fn cum_rebate(&self) -> f64 {
        self.cum_rebate
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    /// Apply one confirmed fill. Position, counters and the ledger entry
    /// always move together.
    pub async fn on_fill(
        &mut self,
        risk: &mut RiskManager,
        side: Side,
        price: f64,
        size: f64,
        ts_ms: i64,
    ) -> Fill {
        let notional = price * size;
        let rebate = notional * self.rebate_rate;
        let fill = Fill {
            side,
            price,
            size,
            fee: notional * (self.maker_fee - self.rebate_rate),
            pnl: side.opposite().sign() * notional, // sell realizes +, buy -
            ts_ms,
        };

        risk.apply_fill(side, price, size);
        self.cum_rebate += rebate;
        self.realized_pnl += fill.pnl;

        metrics::REBATE_TOTAL.inc_by(rebate);
        metrics::REALIZED_PNL.set(self.realized_pnl);
        metrics::NET_DELTA.set(risk.exposure());

        info!(
            side = side.as_str(),
            px = price,
            sz = size,
            pnl = fill.pnl,
            delta = risk.exposure(),
            "fill reconciled"
        );

        if let Some(tx) = &self.ledger_tx {
            if let Err(e) = tx.send(fill.clone()).await {
                error!(?e, "ledger channel closed, fill not recorded");
            }
        }
        fill
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn risk() -> RiskManager {
        RiskManager::new(10_000.0, 0.95, 0.0)
    }

    #[tokio::test]
    async fn buy_fill_updates_position_and_counters() {
        let mut rec = FillReconciler::new(0.0, 0.00003, None);
        let mut rm = risk();
        let fill = rec.on_fill(&mut rm, Side::Buy, 99.99, 10.0, 5).await;

        // Scenario from the quoting cycle: 10 @ 99.99 -> +999.90 delta
        assert!((rm.exposure() - 999.9).abs() < 1e-9);
        assert!((fill.pnl + 999.9).abs() < 1e-9); // buying realizes cost basis
        // fee is net of rebate and negative with a zero maker fee
        assert!((fill.fee + 999.9 * 0.00003).abs() < 1e-9);
        assert!((rec.cum_rebate() - 999.9 * 0.00003).abs() < 1e-9);
        assert_eq!(fill.ts_ms, 5);
    }

    #[tokio::test]
    async fn sell_fill_realizes_positive_notional() {
        let mut rec = FillReconciler::new(0.0002, 0.00003, None);
        let mut rm = risk();
        let fill = rec.on_fill(&mut rm, Side::Sell, 100.0, 2.0, 0).await;

        assert!((rm.exposure() + 200.0).abs() < 1e-9);
        assert!((fill.pnl - 200.0).abs() < 1e-9);
        // maker fee above rebate -> net positive fee
        assert!((fill.fee - 200.0 * (0.0002 - 0.00003)).abs() < 1e-12);
        assert!((rec.realized_pnl() - 200.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn round_trip_nets_out() {
        let mut rec = FillReconciler::new(0.0, 0.00003, None);
        let mut rm = risk();
        rec.on_fill(&mut rm, Side::Buy, 100.0, 1.0, 0).await;
        rec.on_fill(&mut rm, Side::Sell, 101.0, 1.0, 1).await;
        assert!((rm.exposure() + 1.0).abs() < 1e-9); // bought 100, sold 101
        assert!((rec.realized_pnl() - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn fills_land_on_the_ledger_channel() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut rec = FillReconciler::new(0.0, 0.00003, Some(tx));
        let mut rm = risk();
        rec.on_fill(&mut rm, Side::Buy, 99.99, 10.0, 9).await;

        let fill = rx.recv().await.unwrap();
        assert_eq!(fill.side, Side::Buy);
        assert_eq!(fill.ts_ms, 9);
        assert!((fill.signed_notional() - 999.9).abs() < 1e-9);
    }
}
