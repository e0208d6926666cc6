use std::fmt;

use reqwest::Client;
use serde::Serialize;
use serde_json::json;

use crate::config::Settings;
use crate::events::{self, AppEvent, EventSender};
use crate::models::{AlertView, Condition, TriggerEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Desktop,
    Sound,
    Email,
    Telegram,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Channel::Desktop => "desktop",
            Channel::Sound => "sound",
            Channel::Email => "email",
            Channel::Telegram => "telegram",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct DispatchReport {
    pub delivered: Vec<Channel>,
    pub failed: Vec<(Channel, String)>,
    pub skipped: Vec<Channel>,
}

#[derive(Clone)]
struct EmailTarget {
    webhook_url: String,
    to: String,
}

#[derive(Clone)]
struct TelegramTarget {
    api_url: String,
    bot_token: String,
    chat_id: String,
}

/// Fans a trigger event out to the channels enabled on its alert. One
/// attempt per channel; nothing is retried.
#[derive(Clone)]
pub struct NotificationDispatcher {
    http: Client,
    events_tx: EventSender,
    email: Option<EmailTarget>,
    telegram: Option<TelegramTarget>,
}

pub fn format_message(ev: &TriggerEvent) -> String {
    let a = &ev.alert;
    let verb = match a.condition {
        Condition::Above => "rose above",
        Condition::Below => "fell below",
        Condition::CrossingUp => "crossed up through",
        Condition::CrossingDown => "crossed down through",
    };

    let mut msg = format!(
        "{} on {} {} {:.2} (now {:.2})",
        a.symbol, a.exchange, verb, a.target_price, ev.price
    );
    if !a.note.trim().is_empty() {
        msg.push_str(" - ");
        msg.push_str(a.note.trim());
    }
    msg
}

impl NotificationDispatcher {
    pub fn from_settings(settings: &Settings, events_tx: EventSender) -> Self {
        let email = match (&settings.email_webhook_url, &settings.email_to) {
            (Some(url), Some(to)) => Some(EmailTarget {
                webhook_url: url.clone(),
                to: to.clone(),
            }),
            _ => None,
        };

        let telegram = match (&settings.telegram_bot_token, &settings.telegram_chat_id) {
            (Some(token), Some(chat)) => Some(TelegramTarget {
                api_url: settings.telegram_api_url.trim_end_matches('/').to_string(),
                bot_token: token.clone(),
                chat_id: chat.clone(),
            }),
            _ => None,
        };

        Self {
            http: Client::new(),
            events_tx,
            email,
            telegram,
        }
    }

    pub async fn dispatch(&self, ev: &TriggerEvent) -> DispatchReport {
        let wanted = ev.alert.notifications;
        let text = format_message(ev);
        let mut report = DispatchReport::default();

        let mut record = |ch: Channel, res: Option<Result<(), String>>| match res {
            Some(Ok(())) => report.delivered.push(ch),
            Some(Err(e)) => {
                tracing::warn!("notify {} failed for alert {}: {}", ch, ev.alert.id, e);
                report.failed.push((ch, e));
            }
            None => {
                tracing::debug!("notify {} skipped for alert {}", ch, ev.alert.id);
                report.skipped.push(ch);
            }
        };

        if wanted.desktop {
            record(Channel::Desktop, Some(self.send_desktop(ev, &text)));
        }
        if wanted.sound {
            record(Channel::Sound, Some(self.send_sound(ev)));
        }

        let (email, telegram) = futures_util::join!(
            async {
                if wanted.email {
                    Some(self.send_email(ev, &text).await)
                } else {
                    None
                }
            },
            async {
                if wanted.telegram {
                    Some(self.send_telegram(&text).await)
                } else {
                    None
                }
            },
        );

        if wanted.email {
            record(Channel::Email, email.flatten());
        }
        if wanted.telegram {
            record(Channel::Telegram, telegram.flatten());
        }

        report
    }

    fn send_desktop(&self, ev: &TriggerEvent, text: &str) -> Result<(), String> {
        let payload = json!({
            "alert": AlertView::from(ev.alert.clone()),
            "price": ev.price,
            "message": text,
        });

        match events::publish(&self.events_tx, AppEvent::new(events::ALERT_TRIGGERED, payload)) {
            0 => Err("no connected clients".to_string()),
            _ => Ok(()),
        }
    }

    fn send_sound(&self, ev: &TriggerEvent) -> Result<(), String> {
        let payload = json!({ "alert_id": ev.alert.id, "sound": "alert" });

        match events::publish(&self.events_tx, AppEvent::new(events::PLAY_SOUND, payload)) {
            0 => Err("no connected clients".to_string()),
            _ => Ok(()),
        }
    }

    /// `None` when the channel is not configured.
    async fn send_email(&self, ev: &TriggerEvent, text: &str) -> Option<Result<(), String>> {
        let target = self.email.as_ref()?;
        let body = json!({
            "to": target.to,
            "subject": format!("Price alert: {} {}", ev.alert.symbol, ev.alert.condition),
            "text": text,
        });

        Some(self.post_json(&target.webhook_url, &body).await)
    }

    async fn send_telegram(&self, text: &str) -> Option<Result<(), String>> {
        let target = self.telegram.as_ref()?;
        let url = format!("{}/bot{}/sendMessage", target.api_url, target.bot_token);
        let body = json!({ "chat_id": target.chat_id, "text": text });

        Some(self.post_json(&url, &body).await)
    }

    async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<(), String> {
        let res = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            // the telegram url carries the bot token
            .map_err(|e| e.without_url().to_string())?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(format!("{status} {body}"));
        }
        Ok(())
    }
}
