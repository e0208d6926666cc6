use std::path::PathBuf;

use coinwatch::error::AppError;
use coinwatch::models::{Alert, Condition, Exchange, NotificationChannels};
use coinwatch::services::alert_store::{AlertStore, Mirror};
use mongodb::bson::oid::ObjectId;

fn temp_file() -> PathBuf {
    std::env::temp_dir()
        .join(format!("coinwatch-store-{}", ObjectId::new().to_hex()))
        .join("alerts.json")
}

fn alert(symbol: &str, condition: Condition, target: f64, created_at: i64) -> Alert {
    Alert {
        id: ObjectId::new().to_hex(),
        exchange: Exchange::Binance,
        symbol: symbol.to_string(),
        condition,
        target_price: target,
        is_active: true,
        created_at,
        triggered_at: None,
        trigger_price: None,
        notifications: NotificationChannels {
            desktop: true,
            ..Default::default()
        },
        note: "watch".to_string(),
    }
}

#[tokio::test]
async fn json_mirror_survives_reopen() {
    let path = temp_file();

    let store = AlertStore::open(Mirror::JsonFile(path.clone())).await.unwrap();
    assert!(store.is_empty().await);

    let a = store.insert(alert("BTCUSDT", Condition::Above, 70_000.0, 10)).await.unwrap();
    let b = store.insert(alert("ETHUSDT", Condition::Below, 2_000.0, 20)).await.unwrap();
    store.mark_triggered(&b.id, 1_990.0, 30).await.unwrap();
    drop(store);

    let reopened = AlertStore::open(Mirror::JsonFile(path.clone())).await.unwrap();
    let items = reopened.list().await;
    assert_eq!(items.len(), 2);
    // newest first
    assert_eq!(items[0].id, b.id);
    assert_eq!(items[1], a);
    assert!(!items[0].is_active);
    assert_eq!(items[0].trigger_price, Some(1_990.0));
    assert_eq!(items[0].triggered_at, Some(30));

    reopened.remove(&a.id).await.unwrap();
    drop(reopened);

    let again = AlertStore::open(Mirror::JsonFile(path.clone())).await.unwrap();
    assert_eq!(again.len().await, 1);
    assert!(again.get(&a.id).await.is_none());

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[tokio::test]
async fn missing_or_blank_file_opens_empty() {
    let path = temp_file();
    let store = AlertStore::open(Mirror::JsonFile(path.clone())).await.unwrap();
    assert_eq!(store.len().await, 0);

    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "  \n").unwrap();
    let store = AlertStore::open(Mirror::JsonFile(path.clone())).await.unwrap();
    assert_eq!(store.len().await, 0);

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[tokio::test]
async fn corrupt_file_is_a_storage_error() {
    let path = temp_file();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{not json").unwrap();

    let res = AlertStore::open(Mirror::JsonFile(path.clone())).await;
    assert!(matches!(res, Err(AppError::Storage(_))));

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[tokio::test]
async fn duplicate_active_rule_is_rejected() {
    let store = AlertStore::in_memory();

    let first = store.insert(alert("BTCUSDT", Condition::Above, 100.0, 1)).await.unwrap();
    let dup = store.insert(alert("BTCUSDT", Condition::Above, 100.0, 2)).await;
    assert!(matches!(dup, Err(AppError::Conflict(_))));

    // a different rule on the same pair is fine
    store.insert(alert("BTCUSDT", Condition::Below, 100.0, 3)).await.unwrap();

    // once the first one has fired the same rule can be armed again
    store.mark_triggered(&first.id, 101.0, 5).await.unwrap();
    store.insert(alert("BTCUSDT", Condition::Above, 100.0, 6)).await.unwrap();
    assert_eq!(store.len().await, 3);
}

#[tokio::test]
async fn trigger_is_one_shot() {
    let store = AlertStore::in_memory();
    let a = store.insert(alert("BTCUSDT", Condition::Above, 100.0, 1)).await.unwrap();

    let first = store.mark_triggered(&a.id, 105.0, 10).await.unwrap();
    assert!(first.is_some());

    let second = store.mark_triggered(&a.id, 200.0, 20).await.unwrap();
    assert!(second.is_none());

    let stored = store.get(&a.id).await.unwrap();
    assert_eq!(stored.trigger_price, Some(105.0));
    assert_eq!(stored.triggered_at, Some(10));

    let missing = store.mark_triggered("nope", 1.0, 1).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn active_queries_only_see_armed_alerts() {
    let store = AlertStore::in_memory();
    let a = store.insert(alert("BTCUSDT", Condition::Above, 100.0, 2)).await.unwrap();
    let b = store.insert(alert("BTCUSDT", Condition::Below, 50.0, 1)).await.unwrap();
    let c = store.insert(alert("ETHUSDT", Condition::Above, 10.0, 3)).await.unwrap();

    store.mark_triggered(&c.id, 11.0, 4).await.unwrap();

    let active = store.active_for(Exchange::Binance, "BTCUSDT").await;
    let ids: Vec<&str> = active.iter().map(|x| x.id.as_str()).collect();
    assert_eq!(ids, vec![b.id.as_str(), a.id.as_str()]);

    let pairs = store.active_pairs().await;
    assert_eq!(pairs.len(), 1);
    assert!(pairs.contains(&(Exchange::Binance, "BTCUSDT".to_string())));

    assert!(store.active_for(Exchange::Coinbase, "BTCUSDT").await.is_empty());
}

#[tokio::test]
async fn clear_triggered_keeps_active_alerts() {
    let store = AlertStore::in_memory();
    let a = store.insert(alert("BTCUSDT", Condition::Above, 100.0, 1)).await.unwrap();
    let b = store.insert(alert("ETHUSDT", Condition::Above, 10.0, 2)).await.unwrap();
    store.mark_triggered(&b.id, 11.0, 3).await.unwrap();

    assert_eq!(store.clear_triggered().await.unwrap(), 1);
    assert_eq!(store.clear_triggered().await.unwrap(), 0);

    let left = store.list().await;
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].id, a.id);
}

#[tokio::test]
async fn rejected_update_leaves_alert_untouched() {
    let store = AlertStore::in_memory();
    let a = store.insert(alert("BTCUSDT", Condition::Above, 100.0, 1)).await.unwrap();

    let res = store
        .update(&a.id, |x| {
            x.target_price = 1.0;
            Err(AppError::BadRequest("no".to_string()))
        })
        .await;
    assert!(res.is_err());
    assert_eq!(store.get(&a.id).await.unwrap().target_price, 100.0);
}

#[tokio::test]
async fn grouped_listing_is_keyed_by_symbol() {
    let store = AlertStore::in_memory();
    store.insert(alert("BTCUSDT", Condition::Above, 100.0, 1)).await.unwrap();
    store.insert(alert("BTCUSDT", Condition::Below, 90.0, 2)).await.unwrap();
    store.insert(alert("ETHUSDT", Condition::Above, 10.0, 3)).await.unwrap();

    let grouped = store.list_grouped().await;
    let keys: Vec<&String> = grouped.keys().collect();
    assert_eq!(keys, vec!["BTCUSDT", "ETHUSDT"]);
    assert_eq!(grouped["BTCUSDT"].len(), 2);
    assert_eq!(grouped["BTCUSDT"][0].target_price, 90.0);
}

#[tokio::test]
async fn failed_mirror_write_keeps_the_change_in_memory() {
    let path = temp_file();
    // a directory where the temp file goes: every json write fails
    std::fs::create_dir_all(path.with_extension("json.tmp")).unwrap();

    let store = AlertStore::open(Mirror::JsonFile(path.clone())).await.unwrap();

    let a = alert("BTCUSDT", Condition::Above, 100.0, 10);
    let res = store.insert(a.clone()).await;
    assert!(matches!(res, Err(AppError::Storage(_))));
    assert_eq!(store.get(&a.id).await, Some(a.clone()));

    let res = store
        .update(&a.id, |x| {
            x.note = "moved".to_string();
            Ok(())
        })
        .await;
    assert!(matches!(res, Err(AppError::Storage(_))));
    assert_eq!(store.get(&a.id).await.unwrap().note, "moved");

    // the trigger path only logs the failure
    let fired = store.mark_triggered(&a.id, 101.0, 20).await.unwrap().unwrap();
    assert!(!fired.is_active);
    assert_eq!(fired.trigger_price, Some(101.0));
    assert!(!store.get(&a.id).await.unwrap().is_active);

    let res = store.remove(&a.id).await;
    assert!(matches!(res, Err(AppError::Storage(_))));
    assert!(store.get(&a.id).await.is_none());
    assert!(!path.exists());

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[tokio::test]
async fn dashed_binance_symbols_load_in_wire_form() {
    let path = temp_file();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();

    let mut old = alert("BTC-USDT", Condition::Above, 100.0, 10);
    let mut coinbase = alert("BTC-USD", Condition::Below, 5.0, 20);
    coinbase.exchange = Exchange::Coinbase;
    std::fs::write(&path, serde_json::to_vec(&vec![old.clone(), coinbase.clone()]).unwrap()).unwrap();

    let store = AlertStore::open(Mirror::JsonFile(path.clone())).await.unwrap();
    old.symbol = "BTCUSDT".to_string();
    assert_eq!(store.get(&old.id).await, Some(old));
    assert_eq!(store.get(&coinbase.id).await, Some(coinbase));

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}
