use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde_json::Value;
use tokio::sync::mpsc;

use coinwatch::{
    config::Settings,
    events,
    models::{Alert, Condition, Exchange, NotificationChannels, TriggerEvent},
    services::notifier::{format_message, Channel, NotificationDispatcher},
};

fn trigger_event(notifications: NotificationChannels) -> TriggerEvent {
    TriggerEvent {
        alert: Alert {
            id: "65f0000000000000000000aa".to_string(),
            exchange: Exchange::Binance,
            symbol: "BTCUSDT".to_string(),
            condition: Condition::Above,
            target_price: 70000.0,
            is_active: false,
            created_at: 1,
            triggered_at: Some(2),
            trigger_price: Some(70100.0),
            notifications,
            note: "take profit".to_string(),
        },
        price: 70100.0,
        previous_price: Some(69900.0),
        at: 2,
    }
}

async fn sink_handler(
    State(tx): State<mpsc::UnboundedSender<Value>>,
    Json(body): Json<Value>,
) -> StatusCode {
    let _ = tx.send(body);
    StatusCode::OK
}

async fn broken_handler() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

/// Local stand-in for the mail relay and the telegram bot api.
async fn spawn_sink() -> (String, mpsc::UnboundedReceiver<Value>) {
    let (tx, rx) = mpsc::unbounded_channel();

    let app = Router::new()
        .route("/mail", post(sink_handler))
        .route("/botTEST/sendMessage", post(sink_handler))
        .route("/broken", post(broken_handler))
        .with_state(tx);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), rx)
}

#[test]
fn message_mentions_pair_rule_and_note() {
    let msg = format_message(&trigger_event(NotificationChannels::default()));
    assert_eq!(
        msg,
        "BTCUSDT on binance rose above 70000.00 (now 70100.00) - take profit"
    );
}

#[tokio::test]
async fn desktop_and_sound_go_to_the_event_bus() {
    let (tx, mut rx) = events::channel(16);
    let dispatcher = NotificationDispatcher::from_settings(&Settings::offline("x.json"), tx);

    let ev = trigger_event(NotificationChannels {
        desktop: true,
        sound: true,
        ..Default::default()
    });
    let report = dispatcher.dispatch(&ev).await;

    assert_eq!(report.delivered, vec![Channel::Desktop, Channel::Sound]);
    assert!(report.failed.is_empty());

    let first = rx.recv().await.unwrap();
    assert_eq!(first.name, events::ALERT_TRIGGERED);
    assert_eq!(first.data["alert"]["id"], "65f0000000000000000000aa");
    assert_eq!(first.data["price"], 70100.0);

    let second = rx.recv().await.unwrap();
    assert_eq!(second.name, events::PLAY_SOUND);
    assert_eq!(second.data["alert_id"], "65f0000000000000000000aa");
}

#[tokio::test]
async fn desktop_without_listeners_is_a_failure() {
    let (tx, rx) = events::channel(16);
    drop(rx);
    let dispatcher = NotificationDispatcher::from_settings(&Settings::offline("x.json"), tx);

    let report = dispatcher
        .dispatch(&trigger_event(NotificationChannels {
            desktop: true,
            ..Default::default()
        }))
        .await;

    assert!(report.delivered.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, Channel::Desktop);
}

#[tokio::test]
async fn unconfigured_remote_channels_are_skipped() {
    let (tx, _rx) = events::channel(16);
    let dispatcher = NotificationDispatcher::from_settings(&Settings::offline("x.json"), tx);

    let report = dispatcher
        .dispatch(&trigger_event(NotificationChannels {
            email: true,
            telegram: true,
            ..Default::default()
        }))
        .await;

    assert!(report.delivered.is_empty());
    assert!(report.failed.is_empty());
    assert_eq!(report.skipped, vec![Channel::Email, Channel::Telegram]);
}

#[tokio::test]
async fn email_and_telegram_post_to_their_endpoints() {
    let (base, mut rx) = spawn_sink().await;

    let mut settings = Settings::offline("x.json");
    settings.email_webhook_url = Some(format!("{base}/mail"));
    settings.email_to = Some("me@example.com".to_string());
    settings.telegram_api_url = base.clone();
    settings.telegram_bot_token = Some("TEST".to_string());
    settings.telegram_chat_id = Some("42".to_string());

    let (tx, _events_rx) = events::channel(16);
    let dispatcher = NotificationDispatcher::from_settings(&settings, tx);

    let report = dispatcher
        .dispatch(&trigger_event(NotificationChannels {
            email: true,
            telegram: true,
            ..Default::default()
        }))
        .await;

    assert_eq!(report.delivered, vec![Channel::Email, Channel::Telegram]);

    let mut got = Vec::new();
    for _ in 0..2 {
        let body = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        got.push(body);
    }

    let mail = got.iter().find(|b| b.get("to").is_some()).unwrap();
    assert_eq!(mail["to"], "me@example.com");
    assert!(mail["subject"].as_str().unwrap().contains("BTCUSDT"));

    let tg = got.iter().find(|b| b.get("chat_id").is_some()).unwrap();
    assert_eq!(tg["chat_id"], "42");
    assert!(tg["text"].as_str().unwrap().contains("rose above"));
}

#[tokio::test]
async fn relay_errors_are_reported_not_retried() {
    let (base, _rx) = spawn_sink().await;

    let mut settings = Settings::offline("x.json");
    settings.email_webhook_url = Some(format!("{base}/broken"));
    settings.email_to = Some("me@example.com".to_string());

    let (tx, _events_rx) = events::channel(16);
    let dispatcher = NotificationDispatcher::from_settings(&settings, tx);

    let report = dispatcher
        .dispatch(&trigger_event(NotificationChannels {
            email: true,
            ..Default::default()
        }))
        .await;

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, Channel::Email);
    assert!(report.failed[0].1.contains("500"));
}
