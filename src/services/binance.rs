use reqwest::Client;
use serde::Deserialize;

use crate::models::{Exchange, Ticker};

#[derive(Clone)]
pub struct BinanceClient {
    http: Client,
    rest_url: String,
    ws_url: String,
}

/// Binance wants `BTCUSDT`; input may arrive as `BTC-USDT`.
pub fn market_symbol(symbol: &str) -> String {
    symbol.replace('-', "").to_uppercase()
}

impl BinanceClient {
    pub fn new(rest_url: String, ws_url: String) -> Self {
        Self {
            http: Client::new(),
            rest_url: rest_url.trim_end_matches('/').to_string(),
            ws_url: ws_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn ticker_price(&self, symbol: &str) -> Result<f64, String> {
        let url = format!("{}/api/v3/ticker/price", self.rest_url);
        let res = self
            .http
            .get(&url)
            .query(&[("symbol", market_symbol(symbol))])
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(format!("Binance ticker failed: {status} {body}"));
        }

        let body = res
            .json::<PriceResponse>()
            .await
            .map_err(|e| e.to_string())?;

        body.price
            .parse::<f64>()
            .map_err(|e| format!("Binance ticker returned bad price {:?}: {e}", body.price))
    }

    /// Combined mini-ticker stream URL for the given symbols.
    pub fn stream_url(&self, symbols: &[String]) -> String {
        let streams: Vec<String> = symbols
            .iter()
            .map(|s| format!("{}@miniTicker", market_symbol(s).to_lowercase()))
            .collect();

        format!("{}/stream?streams={}", self.ws_url, streams.join("/"))
    }
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    price: String,
}

#[derive(Debug, Deserialize)]
struct CombinedMessage {
    data: MiniTicker,
}

#[derive(Debug, Deserialize)]
pub struct MiniTicker {
    // event time, millis
    #[serde(rename = "E")]
    pub event_time: i64,
    #[serde(rename = "s")]
    pub symbol: String,
    // close price
    #[serde(rename = "c")]
    pub close: String,
}

/// Parses one text frame of the combined stream. Frames that are not mini
/// tickers (subscription acks, errors) yield `None`.
pub fn parse_stream_message(txt: &str) -> Option<MiniTicker> {
    serde_json::from_str::<CombinedMessage>(txt)
        .map(|m| m.data)
        .or_else(|_| serde_json::from_str::<MiniTicker>(txt))
        .ok()
}

impl MiniTicker {
    /// Binance alerts are stored under the wire symbol, so the frame's
    /// symbol is used as is.
    pub fn into_ticker(self) -> Option<Ticker> {
        let price = self.close.parse::<f64>().ok()?;

        Some(Ticker {
            exchange: Exchange::Binance,
            symbol: self.symbol,
            price,
            ts: self.event_time,
        })
    }
}
