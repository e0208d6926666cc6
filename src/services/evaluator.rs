use crate::models::{Alert, Condition, PriceUpdate};

pub fn price_is_usable(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

/// Decide whether `alert` fires on `update`. Pure: no clock, no state.
pub fn evaluate(alert: &Alert, update: &PriceUpdate) -> bool {
    if !alert.is_active || !price_is_usable(update.price) {
        return false;
    }

    let price = update.price;
    let target = alert.target_price;

    match alert.condition {
        Condition::Above => price >= target,
        Condition::Below => price <= target,
        Condition::CrossingUp => match update.previous {
            Some(prev) if price_is_usable(prev) => prev < target && price >= target,
            _ => false,
        },
        Condition::CrossingDown => match update.previous {
            Some(prev) if price_is_usable(prev) => prev > target && price <= target,
            _ => false,
        },
    }
}
