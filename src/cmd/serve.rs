//! `appforge serve` and `appforge init-db`.

use std::sync::Arc;

use anyhow::Result;
use appforge::catalog::CatalogDb;
use appforge::config::AppForgeConfig;
use appforge::server::{self, AppState, ServerConfig};
use tokio::sync::broadcast;

use super::build_pipeline;

pub async fn cmd_serve(
    config: &AppForgeConfig,
    port: Option<u16>,
    dry_run: bool,
    permissive_cors: bool,
) -> Result<()> {
    for warning in config.warnings() {
        tracing::warn!("{}", warning);
    }

    let (events_tx, _rx) = broadcast::channel::<String>(256);
    let pipeline = build_pipeline(config, dry_run)?.with_events(events_tx.clone());
    let state = Arc::new(AppState {
        pipeline: Arc::new(pipeline),
        events_tx,
    });

    server::start_server(
        ServerConfig {
            host: config.server.host.clone(),
            port: port.unwrap_or(config.server.port),
            permissive_cors,
        },
        state,
    )
    .await
}

pub fn cmd_init_db(config: &AppForgeConfig) -> Result<()> {
    let db = CatalogDb::new(&config.catalog.db_path)?;
    let count = db.count()?;
    println!(
        "Catalog initialized at {} ({} app(s))",
        config.catalog.db_path.display(),
        count
    );
    Ok(())
}
