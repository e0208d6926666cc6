pub mod alert;
pub mod ticker;

pub use alert::{Alert, AlertView, Condition, NotificationChannels};
pub use ticker::{Exchange, PriceUpdate, Ticker, TriggerEvent};
