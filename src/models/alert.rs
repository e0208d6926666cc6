use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Exchange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Above,
    Below,
    CrossingUp,
    CrossingDown,
}

impl Condition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::Above => "above",
            Condition::Below => "below",
            Condition::CrossingUp => "crossing_up",
            Condition::CrossingDown => "crossing_down",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Condition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "above" => Ok(Condition::Above),
            "below" => Ok(Condition::Below),
            "crossing_up" | "cross_up" => Ok(Condition::CrossingUp),
            "crossing_down" | "cross_down" => Ok(Condition::CrossingDown),
            other => Err(format!("unknown condition: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationChannels {
    #[serde(default)]
    pub desktop: bool,
    #[serde(default)]
    pub email: bool,
    #[serde(default)]
    pub telegram: bool,
    #[serde(default)]
    pub sound: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    // 24 hex chars, doubles as the mongo _id
    #[serde(rename = "_id")]
    pub id: String,

    pub exchange: Exchange,
    pub symbol: String,

    pub condition: Condition,
    pub target_price: f64,

    pub is_active: bool,
    pub created_at: i64,

    pub triggered_at: Option<i64>,
    pub trigger_price: Option<f64>,

    #[serde(default)]
    pub notifications: NotificationChannels,

    #[serde(default)]
    pub note: String,
}

impl Alert {
    pub fn watches(&self, exchange: Exchange, symbol: &str) -> bool {
        self.exchange == exchange && self.symbol == symbol
    }

    /// Same pair, same rule. Used to reject duplicate active alerts.
    pub fn same_rule(&self, other: &Alert) -> bool {
        self.exchange == other.exchange
            && self.symbol == other.symbol
            && self.condition == other.condition
            && self.target_price == other.target_price
    }
}

/// JSON shape returned by the API.
#[derive(Debug, Clone, Serialize)]
pub struct AlertView {
    pub id: String,
    pub exchange: Exchange,
    pub symbol: String,
    pub condition: Condition,
    pub target_price: f64,
    pub is_active: bool,
    pub created_at: i64,
    pub triggered_at: Option<i64>,
    pub trigger_price: Option<f64>,
    pub notifications: NotificationChannels,
    pub note: String,
}

impl From<Alert> for AlertView {
    fn from(a: Alert) -> Self {
        AlertView {
            id: a.id,
            exchange: a.exchange,
            symbol: a.symbol,
            condition: a.condition,
            target_price: a.target_price,
            is_active: a.is_active,
            created_at: a.created_at,
            triggered_at: a.triggered_at,
            trigger_price: a.trigger_price,
            notifications: a.notifications,
            note: a.note,
        }
    }
}
