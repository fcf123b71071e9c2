//! CLI command implementations.
//!
//! | Module    | Commands handled      |
//! |-----------|-----------------------|
//! | `create`  | `Create`              |
//! | `edit`    | `Edit`                |
//! | `build`   | `Build`               |
//! | `serve`   | `Serve`, `InitDb`     |

pub mod build;
pub mod create;
pub mod edit;
pub mod serve;

use std::sync::Arc;

use anyhow::{Context, Result};
use appforge::catalog::{CatalogDb, CatalogHandle};
use appforge::config::{AppForgeConfig, Secrets};
use appforge::generation::ChatClient;
use appforge::pipeline::{Pipeline, PipelineOutcome};
use appforge::storage::{HttpObjectStore, MemoryStore, ObjectStore};

pub use build::cmd_build;
pub use create::cmd_create;
pub use edit::cmd_edit;
pub use serve::{cmd_init_db, cmd_serve};

/// Wire the pipeline from configuration and environment secrets.
///
/// In dry-run mode objects are kept in memory and the catalog is an
/// in-memory database, so nothing outside the process changes.
pub fn build_pipeline(config: &AppForgeConfig, dry_run: bool) -> Result<Pipeline> {
    let secrets = Secrets::from_env();

    let api_key = secrets
        .openrouter_api_key
        .as_deref()
        .context("OPENROUTER_API_KEY is not set")?;
    let generator = Arc::new(ChatClient::new(&config.generation, api_key)?);

    let (store, catalog): (Arc<dyn ObjectStore>, CatalogDb) = if dry_run {
        tracing::info!("Dry run: uploads and catalog writes stay in memory");
        let base_url = if config.storage.base_url.is_empty() {
            "memory://appforge".to_string()
        } else {
            format!("{}{}", config.storage.base_url.trim_end_matches('/'), config.storage.public_path)
        };
        (Arc::new(MemoryStore::new(base_url)), CatalogDb::new_in_memory()?)
    } else {
        let storage_key = secrets.storage_key.as_deref().context("STORAGE_KEY is not set")?;
        let store = HttpObjectStore::new(&config.storage, storage_key)?;
        let catalog = CatalogDb::new(&config.catalog.db_path)?;
        (Arc::new(store), catalog)
    };

    Ok(Pipeline::new(config, generator, store, CatalogHandle::new(catalog)))
}

/// Print the outcome as JSON on stdout and fail the command if the run failed.
pub fn report_outcome(outcome: &PipelineOutcome) -> Result<()> {
    let json = serde_json::to_string_pretty(outcome).context("Failed to serialize outcome")?;
    println!("{}", json);

    if outcome.success {
        if !outcome.failed_uploads.is_empty() {
            eprintln!(
                "{} {} file(s) failed to upload",
                console::style("Warning:").yellow().bold(),
                outcome.failed_uploads.len()
            );
        }
        Ok(())
    } else {
        anyhow::bail!(
            "{} failed: {}",
            outcome.stage,
            outcome.error.as_deref().unwrap_or("unknown error")
        )
    }
}
