// ===============================
// src/volatility.rs
// ===============================
use std::collections::VecDeque;

/// Rolling window of the most recent mid prices. Used to widen quotes when
/// the market gets jumpy. Cleared on every completed fill so the next cycle
/// starts from a fresh volatility regime.
#[derive(Debug)]
pub struct VolatilityWindow {
    window: VecDeque<f64>,
    cap: usize,
}

impl VolatilityWindow {
    pub fn new(cap: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(cap),
            cap,
        }
    }

    pub fn push(&mut self, mid: f64) {
        if self.window.len() == self.cap {
            self.window.pop_front();
        }
        self.window.push_back(mid);
    }

    pub fn clear(&mut self) {
        self.window.clear();
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    /// (max - min) / latest mid. Zero until the window is full, so a half
    /// empty window never narrows or widens quotes.
    pub fn ratio(&self) -> f64 {
        if self.window.len() < self.cap {
            return 0.0;
        }
        let mut hi = f64::MIN;
        let mut lo = f64::MAX;
        for &m in &self.window {
            if m > hi {
                hi = m;
            }
            if m < lo {
                lo = m;
            }
        }
        let latest = match self.window.back() {
            Some(&m) if m > 0.0 => m,
            _ => return 0.0,
        };
        (hi - lo) / latest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_until_full() {
        let mut w = VolatilityWindow::new(5);
        for px in [100.0, 101.0, 99.0, 102.0] {
            w.push(px);
            assert_eq!(w.ratio(), 0.0);
        }
        w.push(100.0);
        assert!(w.ratio() > 0.0);
    }

    #[test]
    fn ratio_is_range_over_latest() {
        let mut w = VolatilityWindow::new(3);
        w.push(100.0);
        w.push(90.0);
        w.push(110.0);
        // (110 - 90) / 110
        assert!((w.ratio() - 20.0 / 110.0).abs() < 1e-12);
    }

    #[test]
    fn evicts_oldest_beyond_capacity() {
        let mut w = VolatilityWindow::new(3);
        for px in [50.0, 100.0, 100.0, 100.0] {
            w.push(px);
        }
        // 50.0 fell out, window is flat now
        assert_eq!(w.ratio(), 0.0);
        assert_eq!(w.len(), 3);
    }

    #[test]
    fn clear_resets_regime() {
        let mut w = VolatilityWindow::new(2);
        w.push(100.0);
        w.push(120.0);
        assert!(w.ratio() > 0.0);
        w.clear();
        assert_eq!(w.len(), 0);
        assert_eq!(w.ratio(), 0.0);
    }
}
