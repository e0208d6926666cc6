use std::path::PathBuf;

use mongodb::{bson::doc, Client, Database, IndexModel};

use crate::{config::Settings, error::AppError, models::Alert};

use super::alert_store::Mirror;

pub const ALERTS_COLLECTION: &str = "alerts";

pub async fn ensure_indexes(db: &Database) -> Result<(), String> {
    // alerts: monitor scan (active + pair)
    let col = db.collection::<mongodb::bson::Document>(ALERTS_COLLECTION);
    let model = IndexModel::builder()
        .keys(doc! { "is_active": 1, "exchange": 1, "symbol": 1 })
        .build();

    col.create_index(model, None)
        .await
        .map_err(|e| e.to_string())?;

    Ok(())
}

/// Mongo when `MONGODB_URI` is set, the JSON file otherwise.
pub async fn open_mirror(settings: &Settings) -> Result<Mirror, AppError> {
    let Some(uri) = settings.mongodb_uri.as_deref() else {
        tracing::info!("mirroring alerts to {}", settings.alerts_file);
        return Ok(Mirror::JsonFile(PathBuf::from(&settings.alerts_file)));
    };

    let client = Client::with_uri_str(uri).await?;
    let db = client.database(&settings.mongodb_db);

    if let Err(e) = ensure_indexes(&db).await {
        tracing::warn!("could not create alert indexes: {}", e);
    }

    tracing::info!("mirroring alerts to mongodb database {}", settings.mongodb_db);
    Ok(Mirror::Mongo(db.collection::<Alert>(ALERTS_COLLECTION)))
}
