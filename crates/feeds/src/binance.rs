//! Binance public ticker connector.
//!
//! One WebSocket per symbol on `<base>/<symbol>@ticker`. No authentication.
//! Each stream reconnects with exponential backoff until disconnected.

use futures_util::{SinkExt, StreamExt};
use lab_core::config::BinanceFeedConfig;
use lab_core::{Error, Result};
use serde::Deserialize;
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::board::PriceBoard;
use crate::handle::FeedHandle;

/// The part of a 24h ticker event the lab uses.
#[derive(Debug, Deserialize)]
struct TickerEvent {
    /// Last price, sent as a decimal string.
    #[serde(rename = "c")]
    last_price: String,
}

/// Stream URL for a symbol.
pub fn stream_url(base_url: &str, symbol: &str) -> String {
    format!(
        "{}/{}@ticker",
        base_url.trim_end_matches('/'),
        symbol.to_lowercase()
    )
}

/// Extract the last price from a ticker message.
pub fn parse_ticker(text: &str) -> Result<f64> {
    let event: TickerEvent = serde_json::from_str(text)?;
    event
        .last_price
        .parse::<f64>()
        .map_err(|e| Error::feed(format!("bad last price '{}': {}", event.last_price, e)))
}

/// Binance ticker connector.
pub struct BinanceConnector {
    config: BinanceFeedConfig,
    board: PriceBoard,
}

impl BinanceConnector {
    pub fn new(config: BinanceFeedConfig, board: PriceBoard) -> Self {
        Self { config, board }
    }

    /// Spawn one stream task per configured symbol.
    pub fn subscribe(self) -> FeedHandle {
        let initial = Duration::from_millis(self.config.reconnect_backoff_ms);
        let max = Duration::from_millis(self.config.max_backoff_ms);

        let tasks = self
            .config
            .symbols
            .iter()
            .map(|symbol| {
                let url = stream_url(&self.config.base_url, symbol);
                let symbol = symbol.to_uppercase();
                let board = self.board.clone();
                info!(symbol = %symbol, url = %url, "Subscribing to Binance ticker");
                tokio::spawn(run_stream(url, symbol, board, initial, max))
            })
            .collect();

        FeedHandle::new("binance", tasks)
    }
}

/// Next backoff delay, doubled and capped.
fn next_backoff(current: Duration, max: Duration) -> Duration {
    (current * 2).min(max)
}

async fn run_stream(url: String, symbol: String, board: PriceBoard, initial: Duration, max: Duration) {
    let mut backoff = initial;

    loop {
        match connect_async(url.as_str()).await {
            Ok((ws, _)) => {
                info!(symbol = %symbol, "Connected to Binance stream");
                backoff = initial;

                let (mut write, mut read) = ws.split();
                while let Some(msg) = read.next().await {
                    match msg {
                        Ok(Message::Text(text)) => match parse_ticker(&text) {
                            Ok(price) => {
                                if board.update(&symbol, price).await {
                                    debug!(symbol = %symbol, price, "Price updated");
                                }
                            }
                            Err(e) => warn!(symbol = %symbol, error = %e, "Failed to parse ticker"),
                        },
                        Ok(Message::Ping(data)) => {
                            let _ = write.send(Message::Pong(data)).await;
                        }
                        Ok(Message::Close(frame)) => {
                            let reason = frame
                                .as_ref()
                                .map(|f| f.reason.to_string())
                                .unwrap_or_else(|| "close frame received".to_string());
                            warn!(symbol = %symbol, reason = %reason, "Binance stream closed");
                            break;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!(symbol = %symbol, error = %e, "Binance stream error");
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Binance connect failed");
            }
        }

        info!(
            symbol = %symbol,
            backoff_ms = backoff.as_millis() as u64,
            "Reconnecting to Binance stream"
        );
        tokio::time::sleep(backoff).await;
        backoff = next_backoff(backoff, max);
    }
}
