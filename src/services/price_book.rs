use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::models::{Exchange, Ticker};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Recorded {
    /// Stored; carries the price it replaced, if any.
    Fresh(Option<f64>),
    /// Older than the stored ticker; dropped.
    Stale,
}

/// Last seen ticker per (exchange, symbol).
#[derive(Default)]
pub struct PriceBook {
    last: RwLock<HashMap<(Exchange, String), Ticker>>,
}

impl PriceBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, ticker: &Ticker) -> Recorded {
        let key = (ticker.exchange, ticker.symbol.clone());
        let mut last = self.last.write().await;

        match last.get(&key) {
            Some(prev) if prev.ts > ticker.ts => Recorded::Stale,
            Some(prev) => {
                let prev_price = prev.price;
                last.insert(key, ticker.clone());
                Recorded::Fresh(Some(prev_price))
            }
            None => {
                last.insert(key, ticker.clone());
                Recorded::Fresh(None)
            }
        }
    }

    pub async fn get(&self, exchange: Exchange, symbol: &str) -> Option<Ticker> {
        self.last
            .read()
            .await
            .get(&(exchange, symbol.to_string()))
            .cloned()
    }

    pub async fn snapshot(&self) -> Vec<Ticker> {
        let mut items: Vec<Ticker> = self.last.read().await.values().cloned().collect();
        items.sort_by(|a, b| (a.exchange, &a.symbol).cmp(&(b.exchange, &b.symbol)));
        items
    }
}
