use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;

use futures_util::StreamExt;
use mongodb::bson::doc;
use mongodb::options::ReplaceOptions;
use mongodb::Collection;
use tokio::sync::RwLock;

use crate::error::AppError;
use crate::models::{Alert, Exchange};

use super::binance::market_symbol;

/// Where the in-memory alert map is mirrored to.
pub enum Mirror {
    /// Whole map as a JSON array, rewritten on every change.
    JsonFile(PathBuf),
    /// One document per alert, keyed by alert id.
    Mongo(Collection<Alert>),
    /// Nothing survives a restart.
    None,
}

pub struct AlertStore {
    alerts: RwLock<HashMap<String, Alert>>,
    mirror: Mirror,
}

fn newest_first(items: &mut [Alert]) {
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
}

impl AlertStore {
    pub fn in_memory() -> Self {
        Self {
            alerts: RwLock::new(HashMap::new()),
            mirror: Mirror::None,
        }
    }

    /// Builds the store and loads whatever the mirror already holds.
    pub async fn open(mirror: Mirror) -> Result<Self, AppError> {
        let mut loaded = match &mirror {
            Mirror::JsonFile(path) => match tokio::fs::read(path).await {
                Ok(bytes) if bytes.iter().all(|b| b.is_ascii_whitespace()) => Vec::new(),
                Ok(bytes) => serde_json::from_slice::<Vec<Alert>>(&bytes)?,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
                Err(e) => return Err(e.into()),
            },
            Mirror::Mongo(col) => {
                let mut cursor = col.find(None, None).await?;
                let mut items = Vec::new();
                while let Some(res) = cursor.next().await {
                    items.push(res?);
                }
                items
            }
            Mirror::None => Vec::new(),
        };

        // files written before binance symbols were stored dashless
        for a in loaded.iter_mut().filter(|a| a.exchange == Exchange::Binance) {
            a.symbol = market_symbol(&a.symbol);
        }

        tracing::info!("alert store loaded {} alerts", loaded.len());

        let alerts = loaded.into_iter().map(|a| (a.id.clone(), a)).collect();
        Ok(Self {
            alerts: RwLock::new(alerts),
            mirror,
        })
    }

    async fn write_through(
        &self,
        map: &HashMap<String, Alert>,
        changed: Option<&Alert>,
        removed: &[String],
    ) -> Result<(), AppError> {
        match &self.mirror {
            Mirror::JsonFile(path) => {
                let mut items: Vec<Alert> = map.values().cloned().collect();
                newest_first(&mut items);
                let bytes = serde_json::to_vec_pretty(&items)?;

                if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(dir).await?;
                }
                let tmp = path.with_extension("json.tmp");
                tokio::fs::write(&tmp, bytes).await?;
                tokio::fs::rename(&tmp, path).await?;
            }
            Mirror::Mongo(col) => {
                if let Some(alert) = changed {
                    col.replace_one(
                        doc! { "_id": alert.id.as_str() },
                        alert,
                        ReplaceOptions::builder().upsert(true).build(),
                    )
                    .await?;
                }
                if !removed.is_empty() {
                    col.delete_many(doc! { "_id": { "$in": removed.to_vec() } }, None)
                        .await?;
                }
            }
            Mirror::None => {}
        }
        Ok(())
    }

    pub async fn insert(&self, alert: Alert) -> Result<Alert, AppError> {
        let mut map = self.alerts.write().await;

        if alert.is_active {
            if let Some(dup) = map.values().find(|a| a.is_active && a.same_rule(&alert)) {
                return Err(AppError::Conflict(format!(
                    "an active alert with the same rule already exists ({})",
                    dup.id
                )));
            }
        }

        map.insert(alert.id.clone(), alert.clone());
        self.write_through(&map, Some(&alert), &[]).await?;
        Ok(alert)
    }

    pub async fn get(&self, id: &str) -> Option<Alert> {
        self.alerts.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.alerts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.alerts.read().await.is_empty()
    }

    pub async fn list(&self) -> Vec<Alert> {
        let mut items: Vec<Alert> = self.alerts.read().await.values().cloned().collect();
        newest_first(&mut items);
        items
    }

    pub async fn list_grouped(&self) -> BTreeMap<String, Vec<Alert>> {
        let mut map: BTreeMap<String, Vec<Alert>> = BTreeMap::new();
        for a in self.list().await {
            map.entry(a.symbol.clone()).or_default().push(a);
        }
        map
    }

    pub async fn active_for(&self, exchange: Exchange, symbol: &str) -> Vec<Alert> {
        let mut items: Vec<Alert> = self
            .alerts
            .read()
            .await
            .values()
            .filter(|a| a.is_active && a.watches(exchange, symbol))
            .cloned()
            .collect();
        // oldest first: earlier alerts fire first
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        items
    }

    pub async fn active_pairs(&self) -> BTreeSet<(Exchange, String)> {
        self.alerts
            .read()
            .await
            .values()
            .filter(|a| a.is_active)
            .map(|a| (a.exchange, a.symbol.clone()))
            .collect()
    }

    /// Applies `f` to the alert and writes it through. `f` may reject the
    /// change by returning an error, in which case nothing is modified.
    pub async fn update<F>(&self, id: &str, f: F) -> Result<Alert, AppError>
    where
        F: FnOnce(&mut Alert) -> Result<(), AppError>,
    {
        let mut map = self.alerts.write().await;

        let mut next = map
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("alert {id}")))?;
        f(&mut next)?;

        if next.is_active {
            if let Some(dup) = map
                .values()
                .find(|a| a.id != next.id && a.is_active && a.same_rule(&next))
            {
                return Err(AppError::Conflict(format!(
                    "an active alert with the same rule already exists ({})",
                    dup.id
                )));
            }
        }

        map.insert(next.id.clone(), next.clone());
        self.write_through(&map, Some(&next), &[]).await?;
        Ok(next)
    }

    /// Flips an active alert to inactive and records the trigger. Returns
    /// `Ok(None)` when the alert was already inactive. A failed mirror write
    /// is logged, not returned: the trigger already happened in memory and
    /// its notifications must still go out.
    pub async fn mark_triggered(
        &self,
        id: &str,
        price: f64,
        at: i64,
    ) -> Result<Option<Alert>, AppError> {
        let mut map = self.alerts.write().await;

        let alert = map
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("alert {id}")))?;
        if !alert.is_active {
            return Ok(None);
        }

        alert.is_active = false;
        alert.triggered_at = Some(at);
        alert.trigger_price = Some(price);
        let alert = alert.clone();

        if let Err(e) = self.write_through(&map, Some(&alert), &[]).await {
            tracing::warn!("alert {} triggered but not persisted: {}", alert.id, e);
        }
        Ok(Some(alert))
    }

    pub async fn remove(&self, id: &str) -> Result<Alert, AppError> {
        let mut map = self.alerts.write().await;

        let removed = map
            .remove(id)
            .ok_or_else(|| AppError::NotFound(format!("alert {id}")))?;

        self.write_through(&map, None, &[removed.id.clone()]).await?;
        Ok(removed)
    }

    /// Drops every inactive alert. Returns how many were removed.
    pub async fn clear_triggered(&self) -> Result<usize, AppError> {
        let mut map = self.alerts.write().await;

        let ids: Vec<String> = map
            .values()
            .filter(|a| !a.is_active)
            .map(|a| a.id.clone())
            .collect();
        if ids.is_empty() {
            return Ok(0);
        }

        for id in &ids {
            map.remove(id);
        }

        self.write_through(&map, None, &ids).await?;
        Ok(ids.len())
    }
}
