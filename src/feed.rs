// ===============================
// src/feed.rs
// ===============================
//
// Market data adapters. Both write the latest top-of-book payload into the
// shared BookCache (last value wins); the control loop never talks to them
// directly and tolerates a stale or missing snapshot.
//
// - run_mock        : random-walk top of book, steady cadence
// - run_hyperliquid : l2Book subscription over WS, ping every 10s,
//                     reconnect forever with backoff + jitter
//
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::{interval, sleep};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{error, info, warn};
use url::Url;

use crate::book::BookCache;

/// Random-walk generator around $100 with a fixed 2-tick spread. Prices are
/// formatted as strings so the cache accessor exercises the same parse path
/// as the live feed.
pub async fn run_mock(books: BookCache, symbol: String) {
    let mut bid: f64 = 100.00;
    loop {
        let step = rand::thread_rng().gen_range(-3..=3) as f64 * 0.01;
        bid = (bid + step).max(50.0);
        let payload = json!({
            "bids": [{"px": format!("{bid:.2}"), "sz": "50.0"}],
            "asks": [{"px": format!("{:.2}", bid + 0.02), "sz": "50.0"}],
        });
        books.store(&symbol, payload, Utc::now().timestamp_millis());
        sleep(Duration::from_millis(250)).await;
    }
}

/// Extract the cache payload from one l2Book frame, or None if the frame is
/// for another channel/coin or malformed.
fn l2_payload(frame: &Value, symbol: &str) -> Option<Value> {
    if frame.get("channel")?.as_str()? != "l2Book" {
        return None;
    }
    let data = frame.get("data")?;
    if data.get("coin")?.as_str()? != symbol {
        return None;
    }
    let levels = data.get("levels")?.as_array()?;
    if levels.len() < 2 {
        return None;
    }
    Some(json!({"bids": levels[0], "asks": levels[1]}))
}

/// Subscribe to the venue's l2Book stream and mirror it into the cache.
pub async fn run_hyperliquid(books: BookCache, symbol: String, ws_url: String) {
    let mut attempt: u32 = 0;
    loop {
        if let Err(e) = Url::parse(&ws_url) {
            error!(?e, %ws_url, "bad ws url");
            return;
        }

        info!(%ws_url, %symbol, "connecting l2Book feed");
        match connect_async(ws_url.as_str()).await {
            Ok((mut ws, _resp)) => {
                let sub = json!({
                    "method": "subscribe",
                    "subscription": {"type": "l2Book", "coin": symbol},
                });
                if let Err(e) = ws.send(Message::Text(sub.to_string())).await {
                    error!(?e, "subscribe send failed");
                } else {
                    info!("subscribed to l2Book for {}", symbol);
                    attempt = 0; // reset backoff

                    let mut ping = interval(Duration::from_secs(10));
                    loop {
                        tokio::select! {
                            frame = ws.next() => {
                                match frame {
                                    Some(Ok(m)) if m.is_text() => {
                                        let txt = match m.into_text() {
                                            Ok(t) => t,
                                            Err(e) => {
                                                warn!(?e, "failed to read text frame");
                                                continue;
                                            }
                                        };
                                        if let Ok(v) = serde_json::from_str::<Value>(&txt) {
                                            if let Some(payload) = l2_payload(&v, &symbol) {
                                                books.store(
                                                    &symbol,
                                                    payload,
                                                    Utc::now().timestamp_millis(),
                                                );
                                            }
                                        }
                                    }
                                    Some(Ok(_)) => {
                                        // ignore non-text frames
                                    }
                                    Some(Err(e)) => {
                                        error!(?e, "ws read error");
                                        break;
                                    }
                                    None => break,
                                }
                            }
                            _ = ping.tick() => {
                                let msg = Message::Text(r#"{"method":"ping"}"#.to_string());
                                if ws.send(msg).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    info!("l2Book feed disconnected, will reconnect");
                }
            }
            Err(e) => {
                error!(?e, "connect failed");
            }
        }

        // Exponential backoff + jitter
        attempt = attempt.saturating_add(1);
        let shift = attempt.min(6);
        let factor = 1u64 << shift;                  // 2,4,...,64
        let base_ms = 500u64.saturating_mul(factor); // 1s..32s
        let jitter = rand::thread_rng().gen_range(0..=250);
        sleep(Duration::from_millis(base_ms + jitter)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l2_frame_becomes_cache_payload() {
        let frame = json!({
            "channel": "l2Book",
            "data": {
                "coin": "SOL",
                "levels": [
                    [{"px": "100.00", "sz": "5"}],
                    [{"px": "100.02", "sz": "3"}],
                ],
            },
        });
        let payload = l2_payload(&frame, "SOL").unwrap();
        assert_eq!(payload["bids"][0]["px"], "100.00");
        assert_eq!(payload["asks"][0]["px"], "100.02");
    }

    #[test]
    fn wrong_coin_or_channel_is_ignored() {
        let other_coin = json!({
            "channel": "l2Book",
            "data": {"coin": "ETH", "levels": [[], []]},
        });
        assert!(l2_payload(&other_coin, "SOL").is_none());

        let other_channel = json!({"channel": "trades", "data": {"coin": "SOL"}});
        assert!(l2_payload(&other_channel, "SOL").is_none());

        let short_levels = json!({
            "channel": "l2Book",
            "data": {"coin": "SOL", "levels": [[]]},
        });
        assert!(l2_payload(&short_levels, "SOL").is_none());
    }
}
