use std::time::Duration;

use tokio::time;

use crate::{config::FeedMode, models::Exchange, AppState};

use super::alerts_service;

pub fn spawn_price_alert_monitor(state: AppState) {
    tokio::spawn(async move {
        let mut interval = time::interval(Duration::from_secs(state.settings.poll_interval_secs));
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            match run_tick(&state).await {
                Ok(0) => {}
                Ok(n) => tracing::info!("[alert-monitor] {} alerts triggered", n),
                Err(e) => tracing::warn!("[alert-monitor] tick error: {}", e),
            }
        }
    });
}

/// One polling pass: a single quote per active pair. Returns how many alerts
/// fired.
pub async fn run_tick(state: &AppState) -> Result<usize, String> {
    let pairs = state.store.active_pairs().await;
    if pairs.is_empty() {
        return Ok(0);
    }

    let streamed = state.settings.feed_mode == FeedMode::Stream;
    let mut fired = 0;

    for (exchange, sym) in pairs {
        // binance pairs come in over the websocket in stream mode
        if streamed && exchange == Exchange::Binance {
            continue;
        }

        let ticker = match state.market.quote(exchange, &sym).await {
            Ok(t) => t,
            Err(e) => {
                // skip this pair for this tick
                tracing::debug!("[alert-monitor] quote {} {} failed: {}", exchange, sym, e);
                continue;
            }
        };

        let events = alerts_service::process_ticker(state, ticker)
            .await
            .map_err(|e| e.to_string())?;
        fired += events.len();
    }

    Ok(fired)
}
