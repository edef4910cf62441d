// ===============================
// src/venue_sim.rs
// ===============================
//
// In-process venue: marks orders against the shared book cache. A
// configurable share of limit submissions fills on arrival; the rest sit in
// a pending list and show up in recent_fills after a delay. Good enough to
// exercise every path of the order lifecycle without touching an exchange.
//
use std::collections::VecDeque;

use chrono::Utc;
use rand::Rng;
use tracing::debug;

use crate::book::BookCache;
use crate::domain::Side;
use crate::venue::{ExecutionVenue, FillEvent, SubmitOutcome, VenueError, VenueFill};

const FILL_FEED_CAP: usize = 64;

#[derive(Debug)]
struct PendingOrder {
    id: u64,
    price: f64,
    size: f64,
    fills_at_ms: i64,
}

pub struct SimVenue {
    books: BookCache,
    fill_after_ms: i64,
    immediate_fill_pct: u8,
    pending: Vec<PendingOrder>,
    fill_feed: VecDeque<FillEvent>,
}

impl SimVenue {
    pub fn new(books: BookCache, fill_after_ms: i64, immediate_fill_pct: u8) -> Self {
        Self {
            books,
            fill_after_ms,
            immediate_fill_pct,
            pending: Vec::new(),
            fill_feed: VecDeque::new(),
        }
    }

    fn promote_due(&mut self, now_ms: i64) {
        let mut i = 0;
        while i < self.pending.len() {
            if now_ms >= self.pending[i].fills_at_ms {
                let o = self.pending.remove(i);
                debug!(id = o.id, px = o.price, sz = o.size, "sim fill");
                if self.fill_feed.len() == FILL_FEED_CAP {
                    self.fill_feed.pop_front();
                }
                self.fill_feed.push_back(FillEvent {
                    order_id: o.id,
                    price: o.price,
                    size: o.size,
                });
            } else {
                i += 1;
            }
        }
    }
}

impl ExecutionVenue for SimVenue {
    async fn submit_limit(
        &mut self,
        _symbol: &str,
        _side: Side,
        size: f64,
        price: f64,
        _post_only: bool,
    ) -> Result<SubmitOutcome, VenueError> {
        let id = rand::thread_rng().gen::<u64>() | 1;
        if rand::thread_rng().gen_range(0..100) < self.immediate_fill_pct {
            return Ok(SubmitOutcome::Filled(VenueFill { price, size }));
        }
        self.pending.push(PendingOrder {
            id,
            price,
            size,
            fills_at_ms: Utc::now().timestamp_millis() + self.fill_after_ms,
        });
        Ok(SubmitOutcome::Resting(id))
    }

    async fn cancel(&mut self, _symbol: &str, order_id: u64) -> Result<(), VenueError> {
        let before = self.pending.len();
        self.pending.retain(|o| o.id != order_id);
        if self.pending.len() == before {
            // Already filled or never resting: same race a live venue has.
            return Err(VenueError::UnknownOrder);
        }
        Ok(())
    }

    async fn submit_market(
        &mut self,
        symbol: &str,
        side: Side,
        size: f64,
    ) -> Result<VenueFill, VenueError> {
        let top = self
            .books
            .top_of_book(symbol)
            .ok_or_else(|| VenueError::Transport("no market data to mark against".into()))?;
        // Marketable orders take the far touch.
        let price = match side {
            Side::Buy => top.best_ask,
            Side::Sell => top.best_bid,
        };
        Ok(VenueFill { price, size })
    }

    async fn recent_fills(&mut self, _account: &str) -> Result<Vec<FillEvent>, VenueError> {
        self.promote_due(Utc::now().timestamp_millis());
        Ok(self.fill_feed.iter().copied().collect())
    }
}
