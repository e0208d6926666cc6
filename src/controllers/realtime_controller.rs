use std::{convert::Infallible, time::Duration as StdDuration};

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{interval, Duration as TokioDuration};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message as TMessage};

use crate::AppState;

const MAX_PROXY_SYMBOLS: usize = 50;

#[derive(Deserialize)]
pub struct TickersWsQuery {
    pub symbols: String,
}

// GET /ws/tickers?symbols=BTCUSDT,ETHUSDT
pub async fn ws_tickers(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(q): Query<TickersWsQuery>,
) -> impl IntoResponse {
    let mut syms: Vec<String> = q
        .symbols
        .split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect();

    syms.sort();
    syms.dedup();

    if syms.is_empty() {
        return (StatusCode::BAD_REQUEST, "missing symbols").into_response();
    }

    syms.truncate(MAX_PROXY_SYMBOLS);

    let url = state.market.binance.stream_url(&syms);
    ws.on_upgrade(move |socket| handle_tickers_socket(socket, syms, url))
}

/// Upstream data frames relayed to the browser. Control frames are not.
pub fn to_client(msg: TMessage) -> Option<Message> {
    match msg {
        TMessage::Text(txt) => Some(Message::Text(txt)),
        TMessage::Binary(bin) => Some(Message::Binary(bin)),
        _ => None,
    }
}

async fn handle_tickers_socket(mut client_ws: WebSocket, symbols: Vec<String>, url: String) {
    tracing::info!("WS client connected: symbols={:?}", symbols);

    let (upstream, _) = match connect_async(url.as_str()).await {
        Ok(x) => x,
        Err(err) => {
            tracing::error!("Binance WS connect failed: {}", err);
            let msg = serde_json::json!({
                "type": "error",
                "message": format!("Binance WS connect failed: {err}"),
            });
            let _ = client_ws.send(Message::Text(msg.to_string())).await;
            let _ = client_ws.close().await;
            return;
        }
    };

    let (mut up_write, mut up_read) = upstream.split();

    // keep the browser side alive
    let mut ping = interval(TokioDuration::from_secs(25));

    loop {
        tokio::select! {
            _ = ping.tick() => {
                if client_ws.send(Message::Ping(b"ping".to_vec())).await.is_err() {
                    break;
                }
            }

            up_msg = up_read.next() => {
                match up_msg {
                    Some(Ok(TMessage::Ping(payload))) => {
                        let _ = up_write.send(TMessage::Pong(payload)).await;
                    }
                    Some(Ok(TMessage::Close(_))) | None => break,
                    Some(Ok(msg)) => {
                        let Some(out) = to_client(msg) else { continue };
                        if client_ws.send(out).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(_)) => break,
                }
            }

            client_msg = client_ws.recv() => {
                match client_msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    tracing::info!("WS client disconnected: symbols={:?}", symbols);
    let _ = client_ws.close().await;
}

// GET /events  (SSE)
pub async fn sse_events(
    State(state): State<AppState>,
) -> Sse<impl futures_util::stream::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.events_tx.subscribe();

    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        let evt = match rx.recv().await {
            Ok(ev) => Event::default().event(ev.name).data(ev.data.to_string()),
            Err(RecvError::Lagged(_)) => Event::default().event("ping").data("lagged"),
            // sender gone: end the stream
            Err(RecvError::Closed) => return None,
        };

        Some((Ok(evt), rx))
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(StdDuration::from_secs(20))
            .text("keep-alive"),
    )
}
