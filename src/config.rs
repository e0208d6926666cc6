use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedMode {
    Poll,
    Stream,
    Off,
}

impl FeedMode {
    fn parse(s: &str) -> FeedMode {
        match s.trim().to_lowercase().as_str() {
            "stream" => FeedMode::Stream,
            "off" | "none" => FeedMode::Off,
            _ => FeedMode::Poll,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,

    // JSON mirror of the alert map; ignored when mongodb_uri is set
    pub alerts_file: String,
    pub mongodb_uri: Option<String>,
    pub mongodb_db: String,

    pub binance_rest_url: String,
    pub binance_ws_url: String,
    pub coinbase_rest_url: String,

    pub feed_mode: FeedMode,
    pub poll_interval_secs: u64,
    pub stream_reconnect_secs: u64,

    // empty => mutating API routes are open
    pub jwt_secret: String,

    pub email_webhook_url: Option<String>,
    pub email_to: Option<String>,
    pub telegram_api_url: String,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

pub fn load() -> Settings {
    // Loads .env if present (no crash if missing)
    dotenvy::dotenv().ok();

    let port = env::var("PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    Settings {
        host: env_or("HOST", "127.0.0.1"),
        port,
        alerts_file: env_or("ALERTS_FILE", "data/alerts.json"),
        mongodb_uri: env_opt("MONGODB_URI"),
        mongodb_db: env_or("MONGODB_DB", "coinwatch"),
        binance_rest_url: env_or("BINANCE_REST_URL", "https://api.binance.com"),
        binance_ws_url: env_or("BINANCE_WS_URL", "wss://stream.binance.com:9443"),
        coinbase_rest_url: env_or("COINBASE_REST_URL", "https://api.exchange.coinbase.com"),
        feed_mode: FeedMode::parse(&env_or("FEED_MODE", "poll")),
        poll_interval_secs: env_u64("POLL_INTERVAL_SECS", 5),
        stream_reconnect_secs: env_u64("STREAM_RECONNECT_SECS", 5),
        jwt_secret: env_or("API_JWT_SECRET", ""),
        email_webhook_url: env_opt("EMAIL_WEBHOOK_URL"),
        email_to: env_opt("EMAIL_TO"),
        telegram_api_url: env_or("TELEGRAM_API_URL", "https://api.telegram.org"),
        telegram_bot_token: env_opt("TELEGRAM_BOT_TOKEN"),
        telegram_chat_id: env_opt("TELEGRAM_CHAT_ID"),
    }
}

impl Settings {
    /// Defaults with every outbound integration disabled. Used by tests and
    /// as a base for programmatic setups.
    pub fn offline(alerts_file: impl Into<String>) -> Settings {
        Settings {
            host: "127.0.0.1".to_string(),
            port: 0,
            alerts_file: alerts_file.into(),
            mongodb_uri: None,
            mongodb_db: "coinwatch".to_string(),
            binance_rest_url: "http://127.0.0.1:9".to_string(),
            binance_ws_url: "ws://127.0.0.1:9".to_string(),
            coinbase_rest_url: "http://127.0.0.1:9".to_string(),
            feed_mode: FeedMode::Off,
            poll_interval_secs: 5,
            stream_reconnect_secs: 5,
            jwt_secret: String::new(),
            email_webhook_url: None,
            email_to: None,
            telegram_api_url: "http://127.0.0.1:9".to_string(),
            telegram_bot_token: None,
            telegram_chat_id: None,
        }
    }
}
