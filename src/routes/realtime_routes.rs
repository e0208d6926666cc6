use axum::{Router, routing::get};
use crate::{AppState, controllers::realtime_controller};

pub fn add_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/ws/tickers", get(realtime_controller::ws_tickers))
        .route("/events", get(realtime_controller::sse_events))
}
