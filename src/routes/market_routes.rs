use axum::{Router, routing::{get, post}};
use crate::{AppState, controllers::market_controller};

pub fn add_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/api/prices", get(market_controller::get_prices))
        .route("/api/quote/:exchange/:symbol", get(market_controller::get_quote))
        .route("/api/tickers", post(market_controller::post_ticker))
}
