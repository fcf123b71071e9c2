//! Catalog of published mini apps.
//!
//! `CatalogDb` owns the SQLite connection; `CatalogHandle` is the async-safe
//! handle the pipeline and the server share. Writes report a `CatalogWrite`
//! instead of an error: a persistence failure is logged and rolled back, and
//! a missing row on update is an ordinary negative outcome.

pub mod db;

use std::sync::Arc;

use anyhow::{Context, Result};
use appforge_common::{AppMetadata, CatalogRecord, StoredApp};
use serde::Serialize;

pub use db::CatalogDb;

/// Outcome of a catalog write.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum CatalogWrite {
    Written,
    NotFound,
    Failed(String),
}

impl CatalogWrite {
    pub fn succeeded(&self) -> bool {
        matches!(self, CatalogWrite::Written)
    }
}

/// Async-safe handle to the catalog.
///
/// Wraps `CatalogDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`.
#[derive(Clone)]
pub struct CatalogHandle {
    inner: Arc<std::sync::Mutex<CatalogDb>>,
}

impl CatalogHandle {
    pub fn new(db: CatalogDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&CatalogDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db
                .lock()
                .map_err(|e| anyhow::anyhow!("Catalog lock poisoned: {}", e))?;
            f(&guard)
        })
        .await
        .context("Catalog task panicked")?
    }

    pub async fn create(&self, record: CatalogRecord) -> CatalogWrite {
        let deployment_id = record.deployment_id.clone();
        match self.call(move |db| db.create(&record)).await {
            Ok(app_id) => {
                tracing::info!(deployment_id = %deployment_id, app_id, "Catalog row created");
                CatalogWrite::Written
            }
            Err(e) => {
                tracing::error!(deployment_id = %deployment_id, error = %format!("{:#}", e), "Catalog insert failed");
                CatalogWrite::Failed(format!("{:#}", e))
            }
        }
    }

    pub async fn update(
        &self,
        deployment_id: &str,
        metadata: AppMetadata,
        new_deployment_id: &str,
    ) -> CatalogWrite {
        let old_id = deployment_id.to_string();
        let new_id = new_deployment_id.to_string();
        let result = self
            .call(move |db| db.update(&old_id, &metadata, &new_id))
            .await;
        match result {
            Ok(Some(app_id)) => {
                tracing::info!(
                    deployment_id = %deployment_id,
                    new_deployment_id = %new_deployment_id,
                    app_id,
                    "Catalog row updated"
                );
                CatalogWrite::Written
            }
            Ok(None) => {
                tracing::error!(deployment_id = %deployment_id, "No catalog row for deployment");
                CatalogWrite::NotFound
            }
            Err(e) => {
                tracing::error!(deployment_id = %deployment_id, error = %format!("{:#}", e), "Catalog update failed");
                CatalogWrite::Failed(format!("{:#}", e))
            }
        }
    }

    pub async fn find_by_deployment(&self, deployment_id: &str) -> Result<Option<StoredApp>> {
        let id = deployment_id.to_string();
        self.call(move |db| db.find_by_deployment(&id)).await
    }

    pub async fn list(&self) -> Result<Vec<StoredApp>> {
        self.call(|db| db.list()).await
    }
}
