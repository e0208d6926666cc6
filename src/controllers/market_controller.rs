use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::{
    error::{ApiJson, AppError},
    models::{AlertView, Ticker},
    services::{alerts_service, evaluator},
    AppState,
};

// pushed tickers may run this far ahead of the server clock
pub const MAX_CLOCK_SKEW_MS: i64 = 60_000;

// GET /api/prices
pub async fn get_prices(State(state): State<AppState>) -> Json<serde_json::Value> {
    let prices = state.prices.snapshot().await;
    Json(json!({ "prices": prices }))
}

// GET /api/quote/:exchange/:symbol
pub async fn get_quote(
    State(state): State<AppState>,
    Path((exchange, symbol)): Path<(String, String)>,
) -> Result<Json<Ticker>, AppError> {
    let exchange = alerts_service::parse_exchange(&exchange)?;
    let symbol = alerts_service::normalize_symbol(exchange, &symbol)?;

    let ticker = state
        .market
        .quote(exchange, &symbol)
        .await
        .map_err(AppError::Upstream)?;

    Ok(Json(ticker))
}

#[derive(Deserialize)]
pub struct TickerInput {
    pub exchange: String,
    pub symbol: String,
    pub price: f64,
    // unix millis; defaults to now
    pub ts: Option<i64>,
}

// POST /api/tickers
pub async fn post_ticker(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<TickerInput>,
) -> Result<Json<serde_json::Value>, AppError> {
    let exchange = alerts_service::parse_exchange(&input.exchange)?;
    let symbol = alerts_service::normalize_symbol(exchange, &input.symbol)?;

    if !evaluator::price_is_usable(input.price) {
        return Err(AppError::BadRequest("price must be a positive number".to_string()));
    }

    let now = Utc::now().timestamp_millis();
    let ts = input.ts.unwrap_or(now);
    // a far-future ts would make every later tick for the pair look stale
    if ts > now + MAX_CLOCK_SKEW_MS {
        return Err(AppError::BadRequest(format!(
            "ts {ts} is ahead of the server clock (expected unix millis)"
        )));
    }

    let ticker = Ticker {
        exchange,
        symbol,
        price: input.price,
        ts,
    };

    let fired = alerts_service::process_ticker(&state, ticker).await?;
    let triggered: Vec<AlertView> = fired.into_iter().map(|ev| ev.alert.into()).collect();

    Ok(Json(json!({ "triggered": triggered })))
}
