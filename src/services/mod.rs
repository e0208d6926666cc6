pub mod binance;
pub mod coinbase;
pub mod market;

pub mod alert_store;
pub mod db_init;
pub mod price_book;
pub mod evaluator;
pub mod notifier;

pub mod alerts_service;
pub mod auth_service;
pub mod alert_monitor;
pub mod ticker_stream;
