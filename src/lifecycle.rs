// ===============================
// src/lifecycle.rs
// ===============================
//
// Per-tick order state machine: Idle -> Resting -> {Filled, Cancelled} -> Idle.
// Owns the single resting order; a new submission is never accepted while one
// is outstanding, which rules out double-exposure races by construction.
// Pure state: the control loop makes the venue calls and reports the results
// back here.
//
use crate::domain::{RestingOrder, Side};

#[derive(Debug)]
pub struct OrderLifecycle {
    resting: Option<RestingOrder>,
    side: Side,
    stale_timeout_ms: i64,
}

impl OrderLifecycle {
    pub fn new(initial_side: Side, stale_timeout_ms: i64) -> Self {
        Self {
            resting: None,
            side: initial_side,
            stale_timeout_ms,
        }
    }

    /// Side the next quote goes on.
    pub fn quoting_side(&self) -> Side {
        self.side
    }

    pub fn resting(&self) -> Option<&RestingOrder> {
        self.resting.as_ref()
    }

    pub fn is_idle(&self) -> bool {
        self.resting.is_none()
    }

    /// Idle -> Resting. Rejects a second order outright instead of
    /// silently replacing the first one.
    pub fn accept_resting(&mut self, order: RestingOrder) {
        debug_assert!(self.resting.is_none(), "second resting order");
        if self.resting.is_none() {
            self.resting = Some(order);
        }
    }

    /// True once the outstanding order exceeded the stale timeout.
    pub fn is_stale(&self, now_ms: i64) -> bool {
        match &self.resting {
            Some(o) => now_ms - o.submitted_at_ms > self.stale_timeout_ms,
            None => false,
        }
    }

    /// Resting -> Cancelled -> Idle. Returns the abandoned order; also used
    /// when a cancel fails and the order is treated as gone.
    pub fn take_cancelled(&mut self) -> Option<RestingOrder> {
        self.resting.take()
    }

    /// Resting -> Filled -> Idle. Flips the quoting side for the next cycle
    /// and returns the filled order.
    pub fn complete_fill(&mut self) -> Option<RestingOrder> {
        let order = self.resting.take();
        if order.is_some() {
            self.side = self.side.opposite();
        }
        order
    }

    /// Fill that never rested (immediate fill on submission). Still ends
    /// the quoting cycle, so the side flips.
    pub fn complete_immediate(&mut self) {
        debug_assert!(self.resting.is_none());
        self.side = self.side.opposite();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(submitted_at_ms: i64) -> RestingOrder {
        RestingOrder {
            id: 42,
            side: Side::Buy,
            price: 99.99,
            size: 0.1,
            submitted_at_ms,
        }
    }

    #[test]
    fn starts_idle_on_configured_side() {
        let lc = OrderLifecycle::new(Side::Buy, 5_000);
        assert!(lc.is_idle());
        assert_eq!(lc.quoting_side(), Side::Buy);
        assert!(!lc.is_stale(i64::MAX));
    }

    #[test]
    fn fill_flips_side_and_returns_to_idle() {
        let mut lc = OrderLifecycle::new(Side::Buy, 5_000);
        lc.accept_resting(order(0));
        assert!(!lc.is_idle());
        let filled = lc.complete_fill().unwrap();
        assert_eq!(filled.id, 42);
        assert!(lc.is_idle());
        assert_eq!(lc.quoting_side(), Side::Sell);
    }

    #[test]
    fn cancel_keeps_side() {
        let mut lc = OrderLifecycle::new(Side::Buy, 5_000);
        lc.accept_resting(order(0));
        let gone = lc.take_cancelled().unwrap();
        assert_eq!(gone.id, 42);
        assert!(lc.is_idle());
        assert_eq!(lc.quoting_side(), Side::Buy);
    }

    #[test]
    fn staleness_respects_timeout() {
        let mut lc = OrderLifecycle::new(Side::Buy, 5_000);
        lc.accept_resting(order(1_000));
        assert!(!lc.is_stale(6_000)); // exactly at the boundary is not stale
        assert!(lc.is_stale(6_001));
    }

    #[test]
    fn immediate_fill_flips_side_without_resting() {
        let mut lc = OrderLifecycle::new(Side::Sell, 5_000);
        lc.complete_immediate();
        assert_eq!(lc.quoting_side(), Side::Buy);
        assert!(lc.is_idle());
    }
}
