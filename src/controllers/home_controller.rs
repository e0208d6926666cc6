use axum::{
    extract::State,
    http::{StatusCode, Uri},
    response::IntoResponse,
    Json,
};
use serde_json::json;

use crate::{config::FeedMode, error::AppError, AppState};

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let feed = match state.settings.feed_mode {
        FeedMode::Poll => "poll",
        FeedMode::Stream => "stream",
        FeedMode::Off => "off",
    };

    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "alerts": state.store.len().await,
            "feed": feed,
        })),
    )
}

pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("no route for {}", uri.path()))
}
