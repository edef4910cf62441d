// ===============================
// src/venue.rs
// ===============================
//
// Capability interface for the execution venue. The control loop sees one
// trait; whether orders hit a real exchange or the in-process simulator is
// decided once at construction (see main.rs), never inside the loop.
//
use thiserror::Error;

use crate::domain::Side;

#[derive(Debug, Error)]
pub enum VenueError {
    /// Cancel/query referenced an order the venue no longer knows. The
    /// caller treats this as "already filled or already gone".
    #[error("order not found on venue")]
    UnknownOrder,
    #[error("venue rejected request: {0}")]
    Rejected(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Fill as reported by the venue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VenueFill {
    pub price: f64,
    pub size: f64, // base units
}

/// Tagged result of a limit submission. A fill during submission is a real
/// fill, not a sentinel order id.
#[derive(Debug, Clone, Copy)]
pub enum SubmitOutcome {
    Resting(u64),
    Filled(VenueFill),
}

/// Entry from the venue's recent-fills feed, matched against the resting
/// order id while polling.
#[derive(Debug, Clone, Copy)]
pub struct FillEvent {
    pub order_id: u64,
    pub price: f64,
    pub size: f64,
}

#[allow(async_fn_in_trait)]
pub trait ExecutionVenue {
    async fn submit_limit(
        &mut self,
        symbol: &str,
        side: Side,
        size: f64,
        price: f64,
        post_only: bool,
    ) -> Result<SubmitOutcome, VenueError>;

    async fn cancel(&mut self, symbol: &str, order_id: u64) -> Result<(), VenueError>;

    async fn submit_market(
        &mut self,
        symbol: &str,
        side: Side,
        size: f64,
    ) -> Result<VenueFill, VenueError>;

    /// Recent fills for the account; polled once per tick while an order
    /// is resting.
    async fn recent_fills(&mut self, account: &str) -> Result<Vec<FillEvent>, VenueError>;
}
