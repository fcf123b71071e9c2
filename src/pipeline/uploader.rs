//! Pushes build output to object storage and publishes the manifest.

use std::path::Path;
use std::sync::Arc;

use appforge_common::{DeploymentManifest, UploadedFile};
use futures::stream::{self, StreamExt};
use serde::Serialize;

use super::scanner::ScannedFile;
use crate::errors::PipelineError;
use crate::storage::{ObjectStore, PutObject, deployment_path, deployment_prefix};

pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Where the generated source of a deployment is kept for later edits.
pub const SOURCE_RELATIVE_PATH: &str = "source/App.jsx";

pub fn source_path(deployment_id: &str) -> String {
    deployment_path(deployment_id, SOURCE_RELATIVE_PATH)
}

/// Content type for an output file, from a fixed extension table.
pub fn content_type_for(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("html") => "text/html",
        Some("js" | "ts" | "jsx") => "application/javascript",
        Some("css") => "text/css",
        Some("json" | "map") => "application/json",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("svg") => "image/svg+xml",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedUpload {
    pub relative_path: String,
    pub message: String,
}

/// Result of pushing one deployment's files.
#[derive(Debug, Clone, Default)]
pub struct UploadReport {
    /// Accepted files, in scan order.
    pub uploaded: Vec<UploadedFile>,
    pub failed: Vec<FailedUpload>,
}

/// Whether every file made it. A partial upload still publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadOutcome {
    Complete,
    Partial { failed: usize },
}

impl UploadReport {
    pub fn outcome(&self) -> UploadOutcome {
        if self.failed.is_empty() {
            UploadOutcome::Complete
        } else {
            UploadOutcome::Partial {
                failed: self.failed.len(),
            }
        }
    }
}

pub struct Uploader {
    store: Arc<dyn ObjectStore>,
    platform: String,
    entry_name: String,
    concurrency: usize,
}

impl Uploader {
    pub fn new(store: Arc<dyn ObjectStore>, platform: impl Into<String>, entry_name: impl Into<String>) -> Self {
        Self {
            store,
            platform: platform.into(),
            entry_name: entry_name.into(),
            concurrency: 1,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Upload every file; failures are collected, never fatal.
    pub async fn upload_all(&self, files: &[ScannedFile], deployment_id: &str) -> UploadReport {
        // Each future owns its inputs so the run stays `Send` when spawned.
        let results: Vec<_> = stream::iter(files.iter().cloned())
            .map(|file| {
                let deployment_id = deployment_id.to_string();
                async move {
                    let result = self.upload_file(&file, &deployment_id).await;
                    (file, result)
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut report = UploadReport::default();
        for (file, result) in results {
            match result {
                Ok(uploaded) => report.uploaded.push(uploaded),
                Err(e) => {
                    tracing::warn!(
                        deployment_id = %deployment_id,
                        path = %file.relative,
                        error = %e,
                        "File upload failed, continuing"
                    );
                    report.failed.push(FailedUpload {
                        relative_path: file.relative.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }
        tracing::info!(
            deployment_id = %deployment_id,
            uploaded = report.uploaded.len(),
            failed = report.failed.len(),
            "Uploaded build output"
        );
        report
    }

    pub async fn upload_file(&self, file: &ScannedFile, deployment_id: &str) -> Result<UploadedFile, PipelineError> {
        let content = tokio::fs::read(&file.absolute)
            .await
            .map_err(|e| PipelineError::UploadFailed {
                path: file.relative.clone(),
                message: format!("could not read file: {}", e),
            })?;
        let size = content.len() as u64;
        let content_type = content_type_for(&file.relative);
        let destination = deployment_path(deployment_id, &file.relative);
        let file_name = file
            .relative
            .rsplit('/')
            .next()
            .unwrap_or(&file.relative)
            .to_string();

        let stored = self
            .store
            .put(PutObject {
                content,
                destination: destination.clone(),
                content_type: content_type.to_string(),
                file_name,
                deployment_id: deployment_id.to_string(),
                relative_path: Some(file.relative.clone()),
                platform: self.platform.clone(),
                is_manifest: false,
            })
            .await
            .map_err(|e| PipelineError::UploadFailed {
                path: file.relative.clone(),
                message: format!("{:#}", e),
            })?;

        tracing::debug!(deployment_id = %deployment_id, path = %file.relative, "Uploaded file");
        Ok(UploadedFile {
            original_path: file.relative.clone(),
            file_id: stored.file_id,
            public_url: stored
                .public_url
                .unwrap_or_else(|| self.store.public_url(&destination)),
            file_size: stored.file_size.unwrap_or(size),
            file_type: stored.file_type.unwrap_or_else(|| content_type.to_string()),
            upload_path: stored.upload_path.unwrap_or(destination),
        })
    }

    pub fn build_manifest(&self, deployment_id: &str, files: Vec<UploadedFile>) -> DeploymentManifest {
        let base_url = self.store.public_url(&deployment_prefix(deployment_id));
        DeploymentManifest::new(deployment_id, &self.platform, files, &self.entry_name, base_url)
    }

    /// Upload the manifest and return its public URL. Failure is fatal to the run.
    pub async fn upload_manifest(&self, manifest: &DeploymentManifest) -> Result<String, PipelineError> {
        let content = serde_json::to_vec_pretty(manifest)
            .map_err(|e| PipelineError::ManifestUploadFailed(format!("could not serialize manifest: {}", e)))?;
        let destination = deployment_path(&manifest.deployment_id, MANIFEST_FILE_NAME);
        let stored = self
            .store
            .put(PutObject {
                content,
                destination: destination.clone(),
                content_type: "application/json".to_string(),
                file_name: MANIFEST_FILE_NAME.to_string(),
                deployment_id: manifest.deployment_id.clone(),
                relative_path: None,
                platform: self.platform.clone(),
                is_manifest: true,
            })
            .await
            .map_err(|e| PipelineError::ManifestUploadFailed(format!("{:#}", e)))?;
        let url = stored
            .public_url
            .unwrap_or_else(|| self.store.public_url(&destination));
        tracing::info!(deployment_id = %manifest.deployment_id, url = %url, "Manifest uploaded");
        Ok(url)
    }

    /// Keep the generated source next to the bundle so it can be edited later.
    pub async fn upload_source(&self, deployment_id: &str, source: &str) -> Result<(), PipelineError> {
        let destination = source_path(deployment_id);
        self.store
            .put(PutObject {
                content: source.as_bytes().to_vec(),
                destination: destination.clone(),
                content_type: content_type_for(SOURCE_RELATIVE_PATH).to_string(),
                file_name: "App.jsx".to_string(),
                deployment_id: deployment_id.to_string(),
                relative_path: Some(SOURCE_RELATIVE_PATH.to_string()),
                platform: self.platform.clone(),
                is_manifest: false,
            })
            .await
            .map(|_| ())
            .map_err(|e| PipelineError::UploadFailed {
                path: destination,
                message: format!("{:#}", e),
            })
    }
}
