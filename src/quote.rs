// ===============================
// src/quote.rs
// ===============================
use crate::domain::Side;

/// Computes the limit price and USD size for the next quote. Pure; all
/// inputs come in as arguments, all tunables at construction.
#[derive(Debug, Clone)]
pub struct QuoteEngine {
    pub tick_size: f64,
    pub base_offset_ticks: u32,
    pub vol_threshold: f64,
    pub target_order_usd: f64,
    pub min_order_usd: f64,
    pub size_taper_ratio: f64,
}

impl QuoteEngine {
    /// Offset in ticks away from the touch. Grows linearly once volatility
    /// exceeds the threshold; never below 1 tick.
    pub fn tick_offset(&self, vol_ratio: f64) -> i64 {
        let scaled = self.base_offset_ticks as f64 * (1.0 + vol_ratio / self.vol_threshold);
        (scaled.round() as i64).max(1)
    }

    /// Side-specific quote price. A buy rests below the bid, a sell above
    /// the ask, so the quote can never cross the inside market.
    pub fn price(&self, side: Side, best_bid: f64, best_ask: f64, vol_ratio: f64) -> f64 {
        let offset = self.tick_offset(vol_ratio) as f64 * self.tick_size;
        match side {
            Side::Buy => best_bid - offset,
            Side::Sell => best_ask + offset,
        }
    }

    /// USD size to quote given current exposure. Full size while there is
    /// plenty of headroom, zero once the budget is spent, otherwise shrink
    /// toward the minimum instead of quoting dust.
    pub fn size_usd(&self, net_delta_usd: f64) -> f64 {
        let headroom = self.target_order_usd - net_delta_usd.abs();
        if headroom <= 0.0 {
            0.0
        } else if headroom >= self.size_taper_ratio * self.target_order_usd {
            self.target_order_usd
        } else {
            headroom.max(self.min_order_usd)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> QuoteEngine {
        QuoteEngine {
            tick_size: 0.01,
            base_offset_ticks: 1,
            vol_threshold: 0.01,
            target_order_usd: 10.0,
            min_order_usd: 1.0,
            size_taper_ratio: 0.9,
        }
    }

    #[test]
    fn offset_floor_is_one_tick() {
        let mut q = engine();
        q.base_offset_ticks = 0;
        assert_eq!(q.tick_offset(0.0), 1);
    }

    #[test]
    fn offset_monotonic_in_volatility() {
        let q = engine();
        let mut prev = 0;
        for i in 0..200 {
            let v = i as f64 * 0.001;
            let off = q.tick_offset(v);
            assert!(off >= prev, "offset shrank at v={v}");
            assert!(off >= 1);
            prev = off;
        }
    }

    #[test]
    fn quote_never_crosses_the_book() {
        let q = engine();
        for v in [0.0, 0.005, 0.02, 0.5] {
            let buy = q.price(Side::Buy, 100.00, 100.02, v);
            let sell = q.price(Side::Sell, 100.00, 100.02, v);
            assert!(buy < 100.00, "buy {buy} crossed bid at v={v}");
            assert!(sell > 100.02, "sell {sell} crossed ask at v={v}");
        }
    }

    #[test]
    fn calm_market_buy_quote_is_one_tick_below_bid() {
        // bid=100.00, ask=100.02, base 1 tick, no volatility -> 99.99
        let q = engine();
        let px = q.price(Side::Buy, 100.00, 100.02, 0.0);
        assert!((px - 99.99).abs() < 1e-9);
    }

    #[test]
    fn size_zero_when_budget_spent() {
        let q = engine();
        assert_eq!(q.size_usd(10.0), 0.0);
        assert_eq!(q.size_usd(-12.0), 0.0);
    }

    #[test]
    fn size_full_with_small_exposure() {
        let q = engine();
        assert_eq!(q.size_usd(0.0), 10.0);
        assert_eq!(q.size_usd(1.0), 10.0); // headroom 9 = 0.9 * target
        assert_eq!(q.size_usd(-0.5), 10.0);
    }

    #[test]
    fn size_tapers_then_clamps_to_minimum() {
        let q = engine();
        assert!((q.size_usd(5.0) - 5.0).abs() < 1e-9); // headroom 5
        assert!((q.size_usd(9.5) - 1.0).abs() < 1e-9); // headroom 0.5 < min
        assert!((q.size_usd(-9.5) - 1.0).abs() < 1e-9);
    }
}
