// ===============================
// src/venue_live.rs
// ===============================
//
// Live venue adapter: signed JSON over REST. Order actions go to
// {rest}/exchange, account queries to {rest}/info. Transport and signing
// details stay in here; the control loop only sees the ExecutionVenue
// contract and its tagged results.
//
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use tracing::{error, info};

use crate::domain::Side;
use crate::venue::{ExecutionVenue, FillEvent, SubmitOutcome, VenueError, VenueFill};

pub struct LiveVenue {
    http: reqwest::Client,
    rest_base: String,
    api_key: String,
    api_secret: String,
}

impl LiveVenue {
    /// Credentials come from the environment; missing keys are a startup
    /// error, not something to limp along without.
    pub fn from_env(rest_base: String) -> Self {
        let api_key = std::env::var("VENUE_API_KEY").expect("VENUE_API_KEY missing");
        let api_secret = std::env::var("VENUE_API_SECRET").expect("VENUE_API_SECRET missing");
        Self {
            http: reqwest::Client::new(),
            rest_base,
            api_key,
            api_secret,
        }
    }

    fn sign(&self, timestamp_ms: i64, body: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.api_secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(timestamp_ms.to_string().as_bytes());
        mac.update(body.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    async fn post_signed(&self, path: &str, body: Value) -> Result<Value, VenueError> {
        let url = format!("{}{}", self.rest_base.trim_end_matches('/'), path);
        let payload = body.to_string();
        let ts = chrono::Utc::now().timestamp_millis();
        let sig = self.sign(ts, &payload);

        let rsp = self
            .http
            .post(url)
            .header("Content-Type", "application/json")
            .header("X-API-KEY", &self.api_key)
            .header("X-API-TIMESTAMP", ts.to_string())
            .header("X-API-SIGNATURE", sig)
            .body(payload)
            .send()
            .await?;

        if !rsp.status().is_success() {
            let code = rsp.status();
            let text = rsp.text().await.unwrap_or_default();
            error!(%code, %text, "venue request failed");
            return Err(VenueError::Rejected(format!("{code}: {text}")));
        }
        Ok(rsp.json::<Value>().await?)
    }
}

/// First entry of response.data.statuses, or the top-level error.
fn first_status(rsp: &Value) -> Result<&Value, VenueError> {
    if rsp.get("status").and_then(|s| s.as_str()) != Some("ok") {
        return Err(VenueError::Rejected(rsp.to_string()));
    }
    rsp.pointer("/response/data/statuses/0")
        .ok_or_else(|| VenueError::Rejected("missing order status".into()))
}

fn parse_submit_status(status: &Value) -> Result<SubmitOutcome, VenueError> {
    if let Some(oid) = status.pointer("/resting/oid").and_then(|v| v.as_u64()) {
        return Ok(SubmitOutcome::Resting(oid));
    }
    if let Some(filled) = status.get("filled") {
        let price = num_field(filled, "avgPx");
        let size = num_field(filled, "totalSz");
        if price > 0.0 && size > 0.0 {
            return Ok(SubmitOutcome::Filled(VenueFill { price, size }));
        }
    }
    let reason = status
        .get("error")
        .and_then(|e| e.as_str())
        .unwrap_or("unrecognized order status");
    Err(VenueError::Rejected(reason.to_string()))
}

fn parse_cancel_status(status: &Value) -> Result<(), VenueError> {
    if status.as_str() == Some("success") {
        return Ok(());
    }
    let reason = status
        .get("error")
        .and_then(|e| e.as_str())
        .unwrap_or("unrecognized cancel status");
    let lowered = reason.to_ascii_lowercase();
    if lowered.contains("never placed") || lowered.contains("unknown") || lowered.contains("not found")
    {
        return Err(VenueError::UnknownOrder);
    }
    Err(VenueError::Rejected(reason.to_string()))
}

fn parse_fills(rsp: &Value) -> Vec<FillEvent> {
    rsp.as_array()
        .map(|fills| {
            fills
                .iter()
                .filter_map(|f| {
                    let order_id = f.get("oid")?.as_u64()?;
                    let price = num_field(f, "px");
                    let size = num_field(f, "sz");
                    (price > 0.0 && size > 0.0).then_some(FillEvent {
                        order_id,
                        price,
                        size,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Numeric fields arrive as strings on the wire; tolerate bare numbers too.
fn num_field(v: &Value, key: &str) -> f64 {
    match v.get(key) {
        Some(Value::String(s)) => s.parse().unwrap_or(0.0),
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        _ => 0.0,
    }
}

impl ExecutionVenue for LiveVenue {
    async fn submit_limit(
        &mut self,
        symbol: &str,
        side: Side,
        size: f64,
        price: f64,
        post_only: bool,
    ) -> Result<SubmitOutcome, VenueError> {
        // "Alo" = add liquidity only; the venue rejects instead of crossing.
        let tif = if post_only { "Alo" } else { "Gtc" };
        let body = json!({
            "action": {
                "type": "order",
                "orders": [{
                    "coin": symbol,
                    "is_buy": side == Side::Buy,
                    "sz": format!("{size}"),
                    "limit_px": format!("{price}"),
                    "order_type": {"limit": {"tif": tif}},
                    "reduce_only": false,
                }],
            },
        });
        let rsp = self.post_signed("/exchange", body).await?;
        let out = parse_submit_status(first_status(&rsp)?)?;
        if let SubmitOutcome::Resting(oid) = out {
            info!(oid, side = side.as_str(), px = price, "limit order resting");
        }
        Ok(out)
    }

    async fn cancel(&mut self, symbol: &str, order_id: u64) -> Result<(), VenueError> {
        let body = json!({
            "action": {
                "type": "cancel",
                "cancels": [{"coin": symbol, "oid": order_id}],
            },
        });
        let rsp = self.post_signed("/exchange", body).await?;
        parse_cancel_status(first_status(&rsp)?)
    }

    async fn submit_market(
        &mut self,
        symbol: &str,
        side: Side,
        size: f64,
    ) -> Result<VenueFill, VenueError> {
        let body = json!({
            "action": {
                "type": "order",
                "orders": [{
                    "coin": symbol,
                    "is_buy": side == Side::Buy,
                    "sz": format!("{size}"),
                    "order_type": {"market": {}},
                    "reduce_only": false,
                }],
            },
        });
        let rsp = self.post_signed("/exchange", body).await?;
        match parse_submit_status(first_status(&rsp)?)? {
            SubmitOutcome::Filled(fill) => Ok(fill),
            SubmitOutcome::Resting(oid) => {
                // A marketable order must not rest; treat it as rejected.
                Err(VenueError::Rejected(format!("market order rested as {oid}")))
            }
        }
    }

    async fn recent_fills(&mut self, account: &str) -> Result<Vec<FillEvent>, VenueError> {
        let body = json!({"type": "userFills", "user": account});
        let rsp = self.post_signed("/info", body).await?;
        Ok(parse_fills(&rsp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_status_resting() {
        let rsp = json!({
            "status": "ok",
            "response": {"data": {"statuses": [{"resting": {"oid": 77}}]}},
        });
        let st = first_status(&rsp).unwrap();
        assert!(matches!(
            parse_submit_status(st).unwrap(),
            SubmitOutcome::Resting(77)
        ));
    }

    #[test]
    fn submit_status_filled() {
        let rsp = json!({
            "status": "ok",
            "response": {"data": {"statuses": [
                {"filled": {"totalSz": "10", "avgPx": "99.99"}}
            ]}},
        });
        let st = first_status(&rsp).unwrap();
        match parse_submit_status(st).unwrap() {
            SubmitOutcome::Filled(f) => {
                assert_eq!(f.size, 10.0);
                assert_eq!(f.price, 99.99);
            }
            _ => panic!("expected fill"),
        }
    }

    #[test]
    fn submit_status_error() {
        let rsp = json!({
            "status": "ok",
            "response": {"data": {"statuses": [{"error": "post only would cross"}]}},
        });
        let st = first_status(&rsp).unwrap();
        assert!(matches!(
            parse_submit_status(st),
            Err(VenueError::Rejected(_))
        ));
    }

    #[test]
    fn cancel_race_maps_to_unknown_order() {
        assert!(parse_cancel_status(&json!("success")).is_ok());
        let gone = json!({"error": "Order was never placed or already canceled"});
        assert!(matches!(
            parse_cancel_status(&gone),
            Err(VenueError::UnknownOrder)
        ));
        let other = json!({"error": "rate limited"});
        assert!(matches!(
            parse_cancel_status(&other),
            Err(VenueError::Rejected(_))
        ));
    }

    #[test]
    fn fills_parse_and_skip_garbage() {
        let rsp = json!([
            {"oid": 5, "px": "99.99", "sz": "10"},
            {"px": "1.0", "sz": "1.0"},
            {"oid": 6, "px": "bogus", "sz": "1"},
        ]);
        let fills = parse_fills(&rsp);
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].order_id, 5);
    }
}
