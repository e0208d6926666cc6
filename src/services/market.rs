use chrono::Utc;

use crate::config::Settings;
use crate::models::{Exchange, Ticker};

use super::binance::BinanceClient;
use super::coinbase::CoinbaseClient;

/// REST quotes across every supported exchange.
#[derive(Clone)]
pub struct MarketData {
    pub binance: BinanceClient,
    pub coinbase: CoinbaseClient,
}

impl MarketData {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            binance: BinanceClient::new(
                settings.binance_rest_url.clone(),
                settings.binance_ws_url.clone(),
            ),
            coinbase: CoinbaseClient::new(settings.coinbase_rest_url.clone()),
        }
    }

    pub async fn quote(&self, exchange: Exchange, symbol: &str) -> Result<Ticker, String> {
        let price = match exchange {
            Exchange::Binance => self.binance.ticker_price(symbol).await?,
            Exchange::Coinbase => self.coinbase.ticker_price(symbol).await?,
        };

        Ok(Ticker {
            exchange,
            symbol: symbol.to_string(),
            price,
            ts: Utc::now().timestamp_millis(),
        })
    }
}
