// ===============================
// src/ledger.rs
// ===============================
//
// Append-only JSONL fill ledger:
// - One line per fill, never mutated or deleted.
// - BufWriter, periodic flush (1s) and count-based flush.
// - Reopens the file and retries once if a write fails.
// - On startup the ledger is replayed to recover the net position, so a
//   restart does not forget what the bot is holding.
//
// ENV: set `LEDGER_FILE=/path/to/fills.jsonl` to enable (see config.rs).
//
use std::path::Path;

use thiserror::Error;
use tokio::{
    fs::{self, OpenOptions},
    io::{AsyncWriteExt, BufWriter},
    sync::mpsc,
    time::{interval, Duration, MissedTickBehavior},
};
use tracing::{error, info, warn};

use crate::domain::Fill;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Sum of signed fill notionals in the ledger; the recovered net delta in
/// USD. A missing file is an empty ledger, not an error. Malformed lines are
/// skipped with a warning so one torn write cannot brick a restart.
pub async fn recover_net_delta(path: &str) -> Result<f64, LedgerError> {
    if !Path::new(path).exists() {
        return Ok(0.0);
    }
    let raw = fs::read_to_string(path).await?;
    let mut delta = 0.0;
    let mut fills = 0usize;
    for line in raw.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Fill>(line) {
            Ok(fill) => {
                delta += fill.signed_notional();
                fills += 1;
            }
            Err(e) => warn!(?e, line, "ledger: skipping malformed line"),
        }
    }
    info!(%path, fills, delta, "ledger: recovered position");
    Ok(delta)
}

async fn open_writer(path: &str) -> BufWriter<tokio::fs::File> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = fs::create_dir_all(parent).await {
                error!(?e, %path, "ledger: create_dir_all failed");
            }
        }
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .unwrap_or_else(|e| panic!("ledger: open {} failed: {}", path, e));

    BufWriter::new(file)
}

pub async fn run(mut rx: mpsc::Receiver<Fill>, path: String) {
    info!(%path, "ledger: started");
    let mut writer = open_writer(&path).await;

    let mut tick = interval(Duration::from_secs(1));
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut since_last_flush: u32 = 0;
    const FLUSH_EVERY_N_FILLS: u32 = 100;

    loop {
        tokio::select! {
            maybe_fill = rx.recv() => {
                match maybe_fill {
                    Some(fill) => {
                        let line = match serde_json::to_string(&fill) {
                            Ok(s) => s,
                            Err(e) => {
                                error!(?e, "ledger: serialize error, skip fill");
                                continue;
                            }
                        };

                        if let Err(e) = writer.write_all(line.as_bytes()).await {
                            error!(?e, "ledger: write failed, attempting reopen");
                            writer = open_writer(&path).await;
                            if let Err(e2) = writer.write_all(line.as_bytes()).await {
                                error!(?e2, "ledger: write failed again after reopen, drop fill");
                                continue;
                            }
                        }
                        if let Err(e) = writer.write_all(b"\n").await {
                            error!(?e, "ledger: newline write failed, attempting reopen");
                            writer = open_writer(&path).await;
                            let _ = writer.write_all(b"\n").await;
                        }

                        since_last_flush += 1;
                        if since_last_flush >= FLUSH_EVERY_N_FILLS {
                            let _ = writer.flush().await;
                            since_last_flush = 0;
                        }
                    }
                    None => {
                        let _ = writer.flush().await;
                        info!("ledger: channel closed, stopped");
                        break;
                    }
                }
            }

            _ = tick.tick() => {
                let _ = writer.flush().await;
                since_last_flush = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Side;
    use rand::Rng;

    fn tmp_path() -> String {
        let n: u64 = rand::thread_rng().gen();
        std::env::temp_dir()
            .join(format!("mm_bot_ledger_{n}.jsonl"))
            .to_string_lossy()
            .into_owned()
    }

    fn fill(side: Side, price: f64, size: f64) -> Fill {
        Fill {
            side,
            price,
            size,
            fee: 0.0,
            pnl: 0.0,
            ts_ms: 0,
        }
    }

    #[tokio::test]
    async fn write_then_recover_round_trip() {
        let path = tmp_path();
        let (tx, rx) = mpsc::channel(8);
        let writer = tokio::spawn(run(rx, path.clone()));

        tx.send(fill(Side::Buy, 99.99, 10.0)).await.unwrap();
        tx.send(fill(Side::Sell, 100.0, 5.0)).await.unwrap();
        drop(tx); // writer flushes and exits
        writer.await.unwrap();

        let delta = recover_net_delta(&path).await.unwrap();
        assert!((delta - (999.9 - 500.0)).abs() < 1e-9);
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn recover_missing_file_is_zero() {
        assert_eq!(recover_net_delta(&tmp_path()).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn recover_skips_malformed_lines() {
        let path = tmp_path();
        let good = serde_json::to_string(&fill(Side::Buy, 100.0, 1.0)).unwrap();
        std::fs::write(&path, format!("{good}\nnot json\n\n{good}\n")).unwrap();

        let delta = recover_net_delta(&path).await.unwrap();
        assert!((delta - 200.0).abs() < 1e-9);
        let _ = std::fs::remove_file(&path);
    }
}
