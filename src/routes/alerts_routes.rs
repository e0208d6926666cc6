use axum::{Router, routing::{delete, get, post}};
use crate::{AppState, controllers::alerts_controller};

pub fn add_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route(
            "/api/alerts",
            get(alerts_controller::get_alerts).post(alerts_controller::post_create_alert),
        )
        .route("/api/alerts/triggered", delete(alerts_controller::delete_triggered))
        .route(
            "/api/alerts/:id",
            get(alerts_controller::get_alert)
                .patch(alerts_controller::patch_alert)
                .delete(alerts_controller::delete_alert),
        )
        .route("/api/alerts/:id/trigger", post(alerts_controller::post_trigger_alert))
        .route("/api/alerts/:id/reactivate", post(alerts_controller::post_reactivate_alert))
        .route("/api/symbols/:symbol/alerts", get(alerts_controller::get_symbol_alerts))
}
