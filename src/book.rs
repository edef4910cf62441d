// ===============================
// src/book.rs
// ===============================
//
// Shared top-of-book cache. The feed task overwrites the latest payload per
// symbol (last value wins); the control loop reads it once per tick. The
// payload is kept in the venue's raw shape:
//   { "bids": [{"px": "..."}, ...], "asks": [{"px": "..."}, ...] }
// and only the first level of each side is ever read.
//
use std::sync::{Arc, RwLock};

use ahash::AHashMap as HashMap;
use serde_json::Value;

use crate::domain::OrderbookTop;

#[derive(Clone)]
struct Entry {
    payload: Value,
    observed_at_ms: i64,
}

/// Cloneable handle; all clones share the same map.
#[derive(Clone, Default)]
pub struct BookCache {
    inner: Arc<RwLock<HashMap<String, Entry>>>,
}

impl BookCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the snapshot for a symbol. Called only by the feed.
    pub fn store(&self, symbol: &str, payload: Value, observed_at_ms: i64) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(symbol.to_string(), Entry { payload, observed_at_ms });
        }
    }

    /// Read the best bid/ask for a symbol. Fails soft: a missing key,
    /// malformed payload, empty levels or a crossed book all map to None —
    /// the caller just skips the tick.
    pub fn top_of_book(&self, symbol: &str) -> Option<OrderbookTop> {
        let entry = self.inner.read().ok()?.get(symbol).cloned()?;
        let best_bid = first_px(&entry.payload, "bids")?;
        let best_ask = first_px(&entry.payload, "asks")?;
        if !(best_bid > 0.0 && best_ask > 0.0 && best_bid < best_ask) {
            return None;
        }
        Some(OrderbookTop {
            best_bid,
            best_ask,
            observed_at_ms: entry.observed_at_ms,
        })
    }
}

fn first_px(payload: &Value, side: &str) -> Option<f64> {
    let px = payload.get(side)?.as_array()?.first()?.get("px")?;
    // Venues publish prices as strings; tolerate plain numbers too.
    match px {
        Value::String(s) => s.parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn book(bid: &str, ask: &str) -> Value {
        json!({
            "bids": [{"px": bid, "sz": "5.0"}, {"px": "99.0", "sz": "1.0"}],
            "asks": [{"px": ask, "sz": "3.0"}],
        })
    }

    #[test]
    fn reads_first_level_only() {
        let cache = BookCache::new();
        cache.store("SOL", book("100.00", "100.02"), 7);
        let top = cache.top_of_book("SOL").unwrap();
        assert_eq!(top.best_bid, 100.00);
        assert_eq!(top.best_ask, 100.02);
        assert_eq!(top.observed_at_ms, 7);
        assert!((top.mid() - 100.01).abs() < 1e-9);
    }

    #[test]
    fn missing_symbol_is_none() {
        let cache = BookCache::new();
        assert!(cache.top_of_book("SOL").is_none());
    }

    #[test]
    fn malformed_payloads_are_none() {
        let cache = BookCache::new();
        for bad in [
            json!({"bids": [], "asks": [{"px": "100.02"}]}),
            json!({"asks": [{"px": "100.02"}]}),
            json!({"bids": [{"px": "abc"}], "asks": [{"px": "100.02"}]}),
            json!("not an object"),
        ] {
            cache.store("SOL", bad, 0);
            assert!(cache.top_of_book("SOL").is_none());
        }
    }

    #[test]
    fn crossed_book_is_none() {
        let cache = BookCache::new();
        cache.store("SOL", book("100.02", "100.00"), 0);
        assert!(cache.top_of_book("SOL").is_none());
        cache.store("SOL", book("100.00", "100.00"), 0);
        assert!(cache.top_of_book("SOL").is_none());
    }

    #[test]
    fn last_write_wins() {
        let cache = BookCache::new();
        cache.store("SOL", book("100.00", "100.02"), 1);
        cache.store("SOL", book("101.00", "101.02"), 2);
        let top = cache.top_of_book("SOL").unwrap();
        assert_eq!(top.best_bid, 101.00);
        assert_eq!(top.observed_at_ms, 2);
    }
}
