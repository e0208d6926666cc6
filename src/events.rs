use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

pub const ALERTS_UPDATED: &str = "alertsUpdated";
pub const ALERT_TRIGGERED: &str = "alertTriggered";
pub const PLAY_SOUND: &str = "playSound";

/// One message on the event bus. Forwarded as-is to every SSE subscriber.
#[derive(Debug, Clone, Serialize)]
pub struct AppEvent {
    pub name: String,
    pub data: Value,
}

impl AppEvent {
    pub fn new(name: &str, data: Value) -> Self {
        Self {
            name: name.to_string(),
            data,
        }
    }
}

pub type EventSender = broadcast::Sender<AppEvent>;

pub fn channel(capacity: usize) -> (EventSender, broadcast::Receiver<AppEvent>) {
    broadcast::channel(capacity)
}

/// Fire-and-forget publish. Returns how many subscribers got it.
pub fn publish(tx: &EventSender, event: AppEvent) -> usize {
    tx.send(event).unwrap_or(0)
}

pub fn alerts_updated(tx: &EventSender) {
    publish(tx, AppEvent::new(ALERTS_UPDATED, Value::from(1)));
}
