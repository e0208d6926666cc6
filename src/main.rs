use std::net::SocketAddr;

use coinwatch::{
    config::{self, FeedMode},
    routes,
    services::{alert_monitor, alert_store::AlertStore, db_init, ticker_stream},
    AppState,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    if let Err(e) = run().await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let settings = config::load();

    let mirror = db_init::open_mirror(&settings)
        .await
        .map_err(|e| format!("failed to open alert mirror: {e}"))?;
    let store = AlertStore::open(mirror)
        .await
        .map_err(|e| format!("failed to load alerts: {e}"))?;

    let state = AppState::new(settings.clone(), store);

    match settings.feed_mode {
        FeedMode::Poll => alert_monitor::spawn_price_alert_monitor(state.clone()),
        FeedMode::Stream => {
            ticker_stream::spawn_binance_stream(state.clone());
            alert_monitor::spawn_price_alert_monitor(state.clone());
        }
        FeedMode::Off => tracing::info!("price feed disabled; waiting for POST /api/tickers"),
    }

    let app = routes::app(state);

    let ip = settings
        .host
        .parse::<std::net::IpAddr>()
        .map_err(|e| format!("bad HOST {:?}: {e}", settings.host))?;
    let addr = SocketAddr::from((ip, settings.port));
    tracing::info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("bind {addr}: {e}"))?;
    axum::serve(listener, app).await.map_err(|e| e.to_string())
}
