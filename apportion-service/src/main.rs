use std::sync::Arc;

use anyhow::Result;
use apportion_service::{
    api::{self, AppState},
    config::AppConfig,
    metrics_server, observability,
};
use sqlx::postgres::PgPoolOptions;
use utility_client::db::PgUtilityStore;

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cfg = AppConfig::load()?;

    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let pool = PgPoolOptions::new()
        .max_connections(cfg.database.max_connections)
        .connect(&cfg.database.uri)
        .await?;

    let state = AppState {
        store: Arc::new(PgUtilityStore::new(pool)),
    };

    api::serve(&cfg.api.http_bind_addr, state).await
}
