//! Library entrypoint for coinwatch.
//!
//! Everything lives here so integration tests under `tests/` can build an
//! `AppState` and drive the routers, controllers and services directly.

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod events;
pub mod models;

#[path = "middleware/auth.rs"]
pub mod auth;

pub mod services;

pub mod controllers;
pub mod routes;

use services::{
    alert_store::AlertStore, market::MarketData, notifier::NotificationDispatcher,
    price_book::PriceBook,
};

#[derive(Clone)]
pub struct AppState {
    pub settings: config::Settings,
    pub store: Arc<AlertStore>,
    pub prices: Arc<PriceBook>,
    pub market: MarketData,
    pub notifier: NotificationDispatcher,
    pub events_tx: events::EventSender,
}

impl AppState {
    pub fn new(settings: config::Settings, store: AlertStore) -> Self {
        let (events_tx, _events_rx) = events::channel(256);

        Self {
            market: MarketData::from_settings(&settings),
            notifier: NotificationDispatcher::from_settings(&settings, events_tx.clone()),
            store: Arc::new(store),
            prices: Arc::new(PriceBook::new()),
            events_tx,
            settings,
        }
    }
}
