// ===============================
// src/risk.rs
// ===============================
use crate::domain::Side;

/// Owns the net position and the exposure cap. The position is only ever
/// mutated through `apply_fill`, which the fill reconciler calls after a
/// confirmed fill.
#[derive(Debug)]
pub struct RiskManager {
    max_delta_usd: f64,
    flatten_ratio: f64,
    net_delta_usd: f64,
}

impl RiskManager {
    pub fn new(max_delta_usd: f64, flatten_ratio: f64, initial_delta_usd: f64) -> Self {
        Self {
            max_delta_usd,
            flatten_ratio,
            net_delta_usd: initial_delta_usd,
        }
    }

    /// Signed net exposure in USD (long positive).
    pub fn exposure(&self) -> f64 {
        self.net_delta_usd
    }

    /// True once exposure reaches the flatten threshold (default 95% of the
    /// hard cap). Reacting below the cap matters: the next fill could
    /// otherwise overshoot it.
    pub fn should_flatten(&self) -> bool {
        self.net_delta_usd.abs() >= self.flatten_ratio * self.max_delta_usd
    }

    /// Side of the marketable order that brings exposure back to zero.
    pub fn flatten_side(&self) -> Side {
        if self.net_delta_usd > 0.0 {
            Side::Sell
        } else {
            Side::Buy
        }
    }

    /// Size in base units of the flattening order at the current mid.
    pub fn flatten_size(&self, mid: f64) -> f64 {
        if mid <= 0.0 {
            return 0.0;
        }
        self.net_delta_usd.abs() / mid
    }

    /// Apply a confirmed fill to the position. Buy adds notional, sell
    /// removes it.
    pub fn apply_fill(&mut self, side: Side, price: f64, size: f64) {
        self.net_delta_usd += side.sign() * price * size;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_triggers_at_threshold() {
        // netDelta 96 vs cap 100: 96 >= 95 -> flatten, sell side
        let risk = RiskManager::new(100.0, 0.95, 96.0);
        assert!(risk.should_flatten());
        assert_eq!(risk.flatten_side(), Side::Sell);

        let calm = RiskManager::new(100.0, 0.95, 94.9);
        assert!(!calm.should_flatten());
    }

    #[test]
    fn flatten_triggers_on_short_side_too() {
        let risk = RiskManager::new(100.0, 0.95, -95.0);
        assert!(risk.should_flatten());
        assert_eq!(risk.flatten_side(), Side::Buy);
    }

    #[test]
    fn flatten_size_is_exposure_over_mid() {
        let risk = RiskManager::new(100.0, 0.95, 96.0);
        assert!((risk.flatten_size(100.01) - 96.0 / 100.01).abs() < 1e-12);
        assert_eq!(risk.flatten_size(0.0), 0.0);
    }

    #[test]
    fn fills_move_exposure_by_signed_notional() {
        let mut risk = RiskManager::new(1000.0, 0.95, 0.0);
        risk.apply_fill(Side::Buy, 99.99, 10.0);
        assert!((risk.exposure() - 999.9).abs() < 1e-9);
        risk.apply_fill(Side::Sell, 99.99, 10.0);
        assert!(risk.exposure().abs() < 1e-9);
    }
}
