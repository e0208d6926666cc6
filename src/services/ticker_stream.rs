use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::time;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message as TMessage};

use crate::{models::Exchange, AppState};

use super::{alerts_service, binance};

// how often the active set is compared against the subscribed one
const RESUBSCRIBE_CHECK: Duration = Duration::from_secs(15);

async fn active_binance_symbols(state: &AppState) -> Vec<String> {
    state
        .store
        .active_pairs()
        .await
        .into_iter()
        .filter(|(ex, _)| *ex == Exchange::Binance)
        .map(|(_, sym)| sym)
        .collect()
}

/// Streams binance mini-tickers for every active binance alert. Reconnects
/// after a fixed delay on close, and when the set of active symbols changes.
pub fn spawn_binance_stream(state: AppState) {
    tokio::spawn(async move {
        let delay = Duration::from_secs(state.settings.stream_reconnect_secs);

        loop {
            let symbols = active_binance_symbols(&state).await;
            if symbols.is_empty() {
                time::sleep(delay).await;
                continue;
            }

            match run_stream(&state, &symbols).await {
                Ok(()) => tracing::info!("[ticker-stream] active symbols changed, resubscribing"),
                Err(e) => tracing::warn!("[ticker-stream] {}", e),
            }
            time::sleep(delay).await;
        }
    });
}

async fn run_stream(state: &AppState, symbols: &[String]) -> Result<(), String> {
    let url = state.market.binance.stream_url(symbols);

    let (ws, _) = connect_async(url.as_str())
        .await
        .map_err(|e| format!("connect failed: {e}"))?;
    tracing::info!("[ticker-stream] subscribed to {} symbols", symbols.len());

    let (mut write, mut read) = ws.split();

    let mut check = time::interval(RESUBSCRIBE_CHECK);
    // first tick completes immediately
    check.tick().await;

    loop {
        tokio::select! {
            _ = check.tick() => {
                if active_binance_symbols(state).await != symbols {
                    let _ = write.send(TMessage::Close(None)).await;
                    return Ok(());
                }
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(TMessage::Text(txt))) => {
                        let Some(ticker) = binance::parse_stream_message(&txt)
                            .and_then(binance::MiniTicker::into_ticker)
                        else {
                            continue;
                        };

                        if let Err(e) = alerts_service::process_ticker(state, ticker).await {
                            tracing::warn!("[ticker-stream] process error: {}", e);
                        }
                    }
                    Some(Ok(TMessage::Ping(payload))) => {
                        let _ = write.send(TMessage::Pong(payload)).await;
                    }
                    Some(Ok(TMessage::Close(_))) | None => return Err("stream closed".to_string()),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.to_string()),
                }
            }
        }
    }
}
