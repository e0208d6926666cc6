use reqwest::Client;
use serde::Deserialize;

#[derive(Clone)]
pub struct CoinbaseClient {
    http: Client,
    rest_url: String,
}

impl CoinbaseClient {
    pub fn new(rest_url: String) -> Self {
        // the exchange API rejects requests without a user agent
        let http = Client::builder()
            .user_agent(concat!("coinwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            http,
            rest_url: rest_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn ticker_price(&self, product_id: &str) -> Result<f64, String> {
        let url = format!("{}/products/{}/ticker", self.rest_url, product_id);
        let res = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(format!("Coinbase ticker failed: {status} {body}"));
        }

        let body = res
            .json::<TickerResponse>()
            .await
            .map_err(|e| e.to_string())?;

        body.price
            .parse::<f64>()
            .map_err(|e| format!("Coinbase ticker returned bad price {:?}: {e}", body.price))
    }
}

#[derive(Debug, Deserialize)]
struct TickerResponse {
    price: String,
}
