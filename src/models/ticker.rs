use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Alert;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exchange {
    Binance,
    Coinbase,
}

impl Exchange {
    pub fn as_str(&self) -> &'static str {
        match self {
            Exchange::Binance => "binance",
            Exchange::Coinbase => "coinbase",
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Exchange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "binance" => Ok(Exchange::Binance),
            "coinbase" => Ok(Exchange::Coinbase),
            other => Err(format!("unsupported exchange: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub exchange: Exchange,
    pub symbol: String,
    pub price: f64,
    // unix millis
    pub ts: i64,
}

/// Input of the condition evaluator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceUpdate {
    pub price: f64,
    pub previous: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TriggerEvent {
    pub alert: Alert,
    pub price: f64,
    pub previous_price: Option<f64>,
    pub at: i64,
}
