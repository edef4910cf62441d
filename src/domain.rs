// ===============================
// src/domain.rs
// ===============================
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Quoting / fill side. The loop quotes one side at a time and flips
/// after every completed fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn sign(&self) -> f64 {
        match self {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
        }
    }
    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

/// Best bid/ask read from the shared book cache. Invariant: best_bid < best_ask
/// (the cache accessor refuses to return a crossed snapshot).
#[derive(Debug, Clone, Copy)]
pub struct OrderbookTop {
    pub best_bid: f64,
    pub best_ask: f64,
    pub observed_at_ms: i64,
}

impl OrderbookTop {
    pub fn mid(&self) -> f64 {
        (self.best_bid + self.best_ask) / 2.0
    }
}

/// The single outstanding limit order. At most one exists at any time;
/// ownership lives in the order lifecycle.
#[derive(Debug, Clone)]
pub struct RestingOrder {
    pub id: u64,
    pub side: Side,
    pub price: f64,
    pub size: f64, // base units
    pub submitted_at_ms: i64,
}

/// One confirmed fill, as appended to the JSONL ledger. Never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub side: Side,
    pub price: f64,
    pub size: f64, // base units
    pub fee: f64,  // net of rebate; negative = net rebate earned
    pub pnl: f64,  // realized notional: +px*sz on sell, -px*sz on buy
    pub ts_ms: i64,
}

impl Fill {
    /// Signed USD notional this fill adds to the net position.
    pub fn signed_notional(&self) -> f64 {
        self.side.sign() * self.price * self.size
    }
}

/// Time source for the control loop so that staleness checks can be
/// driven deterministically in tests.
pub trait Clock {
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WallClock;

impl Clock for WallClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_sign_and_flip() {
        assert_eq!(Side::Buy.sign(), 1.0);
        assert_eq!(Side::Sell.sign(), -1.0);
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
    }

    #[test]
    fn fill_signed_notional() {
        let f = Fill {
            side: Side::Buy,
            price: 99.99,
            size: 10.0,
            fee: 0.0,
            pnl: -999.9,
            ts_ms: 0,
        };
        assert!((f.signed_notional() - 999.9).abs() < 1e-9);
    }
}
