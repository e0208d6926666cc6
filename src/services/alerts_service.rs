use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::Utc;
use mongodb::bson::oid::ObjectId;
use regex::Regex;
use serde::Deserialize;

use crate::{
    error::AppError,
    events,
    models::{Alert, Condition, Exchange, NotificationChannels, PriceUpdate, Ticker, TriggerEvent},
    AppState,
};

use super::binance;
use super::evaluator::{evaluate, price_is_usable};
use super::notifier::DispatchReport;
use super::price_book::Recorded;

pub const MAX_NOTE_LEN: usize = 280;

fn default_exchange() -> String {
    "binance".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAlert {
    #[serde(default = "default_exchange")]
    pub exchange: String,
    pub symbol: String,
    pub condition: String,
    pub target_price: f64,
    #[serde(default)]
    pub notifications: NotificationChannels,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertPatch {
    pub target_price: Option<f64>,
    pub condition: Option<String>,
    pub note: Option<String>,
    pub notifications: Option<NotificationChannels>,
}

fn symbol_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z0-9]{2,15}(-[A-Z0-9]{2,15})?$").expect("symbol regex"))
}

/// Uppercases and turns `BTC/USD` into `BTC-USD`. Does not validate.
pub fn canonical_symbol(raw: &str) -> String {
    raw.trim().to_uppercase().replace('/', "-")
}

pub fn normalize_symbol(exchange: Exchange, raw: &str) -> Result<String, AppError> {
    let sym = canonical_symbol(raw);

    if !symbol_re().is_match(&sym) {
        return Err(AppError::BadRequest(format!("invalid symbol: {:?}", raw.trim())));
    }
    if exchange == Exchange::Coinbase && !sym.contains('-') {
        return Err(AppError::BadRequest(format!(
            "coinbase symbols use the BASE-QUOTE form, got {sym}"
        )));
    }

    Ok(stored_symbol(exchange, &sym))
}

/// The form alerts are stored under. Binance keeps the wire form (`BTCUSDT`)
/// so stream frames and alerts share one key.
fn stored_symbol(exchange: Exchange, canonical: &str) -> String {
    match exchange {
        Exchange::Binance => binance::market_symbol(canonical),
        Exchange::Coinbase => canonical.to_string(),
    }
}

pub fn parse_exchange(raw: &str) -> Result<Exchange, AppError> {
    raw.parse::<Exchange>().map_err(AppError::BadRequest)
}

fn parse_condition(raw: &str) -> Result<Condition, AppError> {
    raw.parse::<Condition>().map_err(AppError::BadRequest)
}

fn check_target(target: f64) -> Result<f64, AppError> {
    if !price_is_usable(target) {
        return Err(AppError::BadRequest(
            "target price must be a positive number".to_string(),
        ));
    }
    Ok(target)
}

fn check_note(note: &str) -> Result<String, AppError> {
    let note = note.trim();
    if note.chars().count() > MAX_NOTE_LEN {
        return Err(AppError::BadRequest(format!(
            "note is longer than {MAX_NOTE_LEN} characters"
        )));
    }
    Ok(note.to_string())
}

pub async fn create_alert(state: &AppState, input: NewAlert) -> Result<Alert, AppError> {
    let exchange = parse_exchange(&input.exchange)?;
    let symbol = normalize_symbol(exchange, &input.symbol)?;

    let alert = Alert {
        id: ObjectId::new().to_hex(),
        exchange,
        symbol,
        condition: parse_condition(&input.condition)?,
        target_price: check_target(input.target_price)?,
        is_active: true,
        created_at: Utc::now().timestamp(),
        triggered_at: None,
        trigger_price: None,
        notifications: input.notifications,
        note: check_note(&input.note)?,
    };

    let alert = state.store.insert(alert).await?;
    tracing::info!(
        "alert {} created: {} {} {} {}",
        alert.id,
        alert.exchange,
        alert.symbol,
        alert.condition,
        alert.target_price
    );

    events::alerts_updated(&state.events_tx);
    Ok(alert)
}

pub async fn get_alert(state: &AppState, id: &str) -> Result<Alert, AppError> {
    state
        .store
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("alert {id}")))
}

pub async fn list_alerts(state: &AppState) -> Vec<Alert> {
    state.store.list().await
}

pub async fn list_alerts_grouped(state: &AppState) -> BTreeMap<String, Vec<Alert>> {
    state.store.list_grouped().await
}

pub async fn list_symbol_alerts(
    state: &AppState,
    exchange: Option<Exchange>,
    symbol: &str,
) -> Vec<Alert> {
    let sym = canonical_symbol(symbol);

    state
        .store
        .list()
        .await
        .into_iter()
        .filter(|a| exchange.is_none_or(|ex| a.exchange == ex))
        .filter(|a| a.symbol == stored_symbol(a.exchange, &sym))
        .collect()
}

pub async fn update_alert(state: &AppState, id: &str, patch: AlertPatch) -> Result<Alert, AppError> {
    // validate up front so the store closure stays infallible on input
    let target = patch.target_price.map(check_target).transpose()?;
    let condition = patch.condition.as_deref().map(parse_condition).transpose()?;
    let note = patch.note.as_deref().map(check_note).transpose()?;

    let alert = state
        .store
        .update(id, |a| {
            if let Some(t) = target {
                a.target_price = t;
            }
            if let Some(c) = condition {
                a.condition = c;
            }
            if let Some(n) = note {
                a.note = n;
            }
            if let Some(ch) = patch.notifications {
                a.notifications = ch;
            }
            Ok(())
        })
        .await?;

    events::alerts_updated(&state.events_tx);
    Ok(alert)
}

pub async fn delete_alert(state: &AppState, id: &str) -> Result<Alert, AppError> {
    let removed = state.store.remove(id).await?;
    tracing::info!("alert {} deleted", removed.id);

    events::alerts_updated(&state.events_tx);
    Ok(removed)
}

pub async fn clear_triggered(state: &AppState) -> Result<usize, AppError> {
    let n = state.store.clear_triggered().await?;
    if n > 0 {
        tracing::info!("cleared {} triggered alerts", n);
        events::alerts_updated(&state.events_tx);
    }
    Ok(n)
}

pub async fn reactivate_alert(state: &AppState, id: &str) -> Result<Alert, AppError> {
    let alert = state
        .store
        .update(id, |a| {
            if a.is_active {
                return Err(AppError::BadRequest("alert is already active".to_string()));
            }
            a.is_active = true;
            a.triggered_at = None;
            a.trigger_price = None;
            Ok(())
        })
        .await?;

    events::alerts_updated(&state.events_tx);
    Ok(alert)
}

/// Manual trigger. Uses `price` when given, else the last known price of
/// the pair, else the alert's target. Returns `None` when the alert was
/// already triggered.
pub async fn trigger_alert(
    state: &AppState,
    id: &str,
    price: Option<f64>,
) -> Result<Option<(TriggerEvent, DispatchReport)>, AppError> {
    let alert = get_alert(state, id).await?;

    let last = state.prices.get(alert.exchange, &alert.symbol).await;
    let price = match price {
        Some(p) => check_target(p)?,
        None => last.as_ref().map(|t| t.price).unwrap_or(alert.target_price),
    };

    let now = Utc::now().timestamp();
    let Some(alert) = state.store.mark_triggered(id, price, now).await? else {
        return Ok(None);
    };

    let ev = TriggerEvent {
        alert,
        price,
        previous_price: last.map(|t| t.price),
        at: now,
    };

    events::alerts_updated(&state.events_tx);
    let report = state.notifier.dispatch(&ev).await;

    Ok(Some((ev, report)))
}

/// Feeds one ticker through the engine: remembers it, evaluates every
/// active alert on the pair, triggers and notifies the hits.
pub async fn process_ticker(state: &AppState, ticker: Ticker) -> Result<Vec<TriggerEvent>, AppError> {
    if !price_is_usable(ticker.price) {
        tracing::debug!("ignoring unusable price {} for {}", ticker.price, ticker.symbol);
        return Ok(Vec::new());
    }

    let previous = match state.prices.record(&ticker).await {
        Recorded::Fresh(prev) => prev,
        Recorded::Stale => return Ok(Vec::new()),
    };
    let update = PriceUpdate {
        price: ticker.price,
        previous,
    };

    let now = Utc::now().timestamp();
    let mut fired = Vec::new();

    for alert in state.store.active_for(ticker.exchange, &ticker.symbol).await {
        if !evaluate(&alert, &update) {
            continue;
        }

        match state.store.mark_triggered(&alert.id, ticker.price, now).await {
            Ok(Some(alert)) => {
                tracing::info!(
                    "alert {} triggered: {} {} {} at {}",
                    alert.id,
                    alert.symbol,
                    alert.condition,
                    alert.target_price,
                    ticker.price
                );
                fired.push(TriggerEvent {
                    alert,
                    price: ticker.price,
                    previous_price: previous,
                    at: now,
                });
            }
            // already triggered, or deleted since the scan
            Ok(None) | Err(AppError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
    }

    if fired.is_empty() {
        return Ok(fired);
    }

    events::alerts_updated(&state.events_tx);
    for ev in &fired {
        let report = state.notifier.dispatch(ev).await;
        tracing::debug!(
            "alert {} notified: {} delivered, {} failed, {} skipped",
            ev.alert.id,
            report.delivered.len(),
            report.failed.len(),
            report.skipped.len()
        );
    }

    Ok(fired)
}
