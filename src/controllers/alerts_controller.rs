use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    error::{ApiJson, AppError},
    models::{Alert, AlertView},
    services::alerts_service::{self, AlertPatch, NewAlert},
    AppState,
};

fn views(items: Vec<Alert>) -> Vec<AlertView> {
    items.into_iter().map(AlertView::from).collect()
}

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub grouped: bool,
}

// GET /api/alerts
pub async fn get_alerts(State(state): State<AppState>, Query(q): Query<ListQuery>) -> Response {
    if q.grouped {
        let grouped: serde_json::Map<String, serde_json::Value> =
            alerts_service::list_alerts_grouped(&state)
                .await
                .into_iter()
                .map(|(sym, items)| (sym, json!(views(items))))
                .collect();

        return Json(json!({ "groups": grouped })).into_response();
    }

    let items = views(alerts_service::list_alerts(&state).await);
    Json(json!({ "alerts": items })).into_response()
}

// POST /api/alerts
pub async fn post_create_alert(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<NewAlert>,
) -> Result<Response, AppError> {
    let alert = alerts_service::create_alert(&state, input).await?;
    Ok((StatusCode::CREATED, Json(AlertView::from(alert))).into_response())
}

// GET /api/alerts/:id
pub async fn get_alert(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AlertView>, AppError> {
    let alert = alerts_service::get_alert(&state, &id).await?;
    Ok(Json(alert.into()))
}

// PATCH /api/alerts/:id
pub async fn patch_alert(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<AlertPatch>,
) -> Result<Json<AlertView>, AppError> {
    let alert = alerts_service::update_alert(&state, &id, patch).await?;
    Ok(Json(alert.into()))
}

// DELETE /api/alerts/:id
pub async fn delete_alert(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    alerts_service::delete_alert(&state, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// DELETE /api/alerts/triggered
pub async fn delete_triggered(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let removed = alerts_service::clear_triggered(&state).await?;
    Ok(Json(json!({ "removed": removed })))
}

#[derive(Deserialize, Default)]
pub struct TriggerBody {
    pub price: Option<f64>,
}

// POST /api/alerts/:id/trigger
pub async fn post_trigger_alert(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<TriggerBody>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let price = body.and_then(|Json(b)| b.price);

    match alerts_service::trigger_alert(&state, &id, price).await? {
        Some((ev, report)) => Ok(Json(json!({
            "triggered": true,
            "price": ev.price,
            "alert": AlertView::from(ev.alert),
            "notifications": report,
        }))),
        None => Ok(Json(json!({ "triggered": false }))),
    }
}

// POST /api/alerts/:id/reactivate
pub async fn post_reactivate_alert(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AlertView>, AppError> {
    let alert = alerts_service::reactivate_alert(&state, &id).await?;
    Ok(Json(alert.into()))
}

#[derive(Deserialize)]
pub struct SymbolQuery {
    pub exchange: Option<String>,
}

// GET /api/symbols/:symbol/alerts?exchange=binance
pub async fn get_symbol_alerts(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(q): Query<SymbolQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let exchange = q
        .exchange
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(alerts_service::parse_exchange)
        .transpose()?;

    let items = alerts_service::list_symbol_alerts(&state, exchange, &symbol).await;
    Ok(Json(json!({
        "symbol": alerts_service::canonical_symbol(&symbol),
        "has_alerts": !items.is_empty(),
        "alerts": views(items),
    })))
}
