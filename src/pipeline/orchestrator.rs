//! Create and edit flows.
//!
//! Both flows run their steps strictly in sequence and stop at the first
//! failure. Every failure is converted into a `PipelineOutcome` here; the
//! build workspace is disposed whichever step failed.

use std::sync::Arc;

use appforge_common::{AppMetadata, CatalogRecord, GeneratedArtifact, new_deployment_id};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::Instrument;

use super::builder::BuildInvoker;
use super::events::{Flow, PipelineEvent, Stage, broadcast_event};
use super::policy::{InitialValuePolicy, RandomPolicy};
use super::scanner;
use super::uploader::{FailedUpload, UploadOutcome, Uploader, source_path};
use super::workspace::{BuildWorkspace, WorkspaceManager};
use crate::catalog::{CatalogHandle, CatalogWrite};
use crate::config::AppForgeConfig;
use crate::errors::{ErrorKind, PipelineError};
use crate::generation::Generator;
use crate::storage::ObjectStore;

/// Result of one create or edit run. Failures are values, never panics.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub success: bool,
    /// The freshly built deployment (the new one, for an edit).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_deployment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_files: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_uploads: Vec<FailedUpload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// `DONE` on success, otherwise the step that failed.
    pub stage: Stage,
}

impl PipelineOutcome {
    fn succeeded(deployment: Deployment, previous_deployment_id: Option<String>) -> Self {
        Self {
            success: true,
            deployment_id: Some(deployment.deployment_id),
            previous_deployment_id,
            manifest_url: Some(deployment.manifest_url),
            total_files: Some(deployment.total_files),
            failed_uploads: deployment.failed_uploads,
            error: None,
            error_kind: None,
            stage: Stage::Done,
        }
    }

    fn failed(error: &PipelineError, stage: Stage, previous_deployment_id: Option<String>) -> Self {
        Self {
            success: false,
            deployment_id: None,
            previous_deployment_id,
            manifest_url: None,
            total_files: None,
            failed_uploads: Vec::new(),
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
            stage,
        }
    }
}

/// A published build: files uploaded and the manifest in place.
struct Deployment {
    deployment_id: String,
    manifest_url: String,
    total_files: usize,
    failed_uploads: Vec<FailedUpload>,
}

/// Tracks the current stage of one run and reports transitions.
struct RunTracker<'a> {
    run_id: String,
    flow: Flow,
    stage: Stage,
    events: Option<&'a broadcast::Sender<String>>,
}

impl RunTracker<'_> {
    fn enter(&mut self, stage: Stage) {
        self.stage = stage;
        tracing::info!(stage = %stage, "Pipeline stage");
        if let Some(tx) = self.events {
            broadcast_event(
                tx,
                &PipelineEvent::StageChanged {
                    run_id: self.run_id.clone(),
                    flow: self.flow,
                    stage,
                },
            );
        }
    }

    /// Report the terminal state (`DONE` or `FAILED`), then the outcome.
    fn finish(&self, outcome: &PipelineOutcome) {
        if let Some(tx) = self.events {
            let terminal = if outcome.success { Stage::Done } else { Stage::Failed };
            broadcast_event(
                tx,
                &PipelineEvent::StageChanged {
                    run_id: self.run_id.clone(),
                    flow: self.flow,
                    stage: terminal,
                },
            );
            broadcast_event(
                tx,
                &PipelineEvent::Finished {
                    run_id: self.run_id.clone(),
                    flow: self.flow,
                    outcome: outcome.clone(),
                },
            );
        }
    }
}

pub fn new_run_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// The build-and-deploy pipeline with its collaborators.
///
/// Holds no per-run state, so one instance serves any number of
/// concurrent runs.
pub struct Pipeline {
    generator: Arc<dyn Generator>,
    store: Arc<dyn ObjectStore>,
    catalog: CatalogHandle,
    workspaces: WorkspaceManager,
    builder: BuildInvoker,
    uploader: Uploader,
    policy: Arc<dyn InitialValuePolicy>,
    events: Option<broadcast::Sender<String>>,
}

impl Pipeline {
    pub fn new(
        config: &AppForgeConfig,
        generator: Arc<dyn Generator>,
        store: Arc<dyn ObjectStore>,
        catalog: CatalogHandle,
    ) -> Self {
        let uploader = Uploader::new(
            store.clone(),
            &config.build.platform,
            &config.template.entry_point_name,
        )
        .with_concurrency(config.storage.concurrency);
        Self {
            generator,
            store,
            catalog,
            workspaces: WorkspaceManager::from_config(&config.template, &config.build),
            builder: BuildInvoker::from_config(&config.build),
            uploader,
            policy: Arc::new(RandomPolicy::from_config(&config.policy)),
            events: None,
        }
    }

    pub fn with_policy(mut self, policy: Arc<dyn InitialValuePolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Publish stage transitions on `tx`.
    pub fn with_events(mut self, tx: broadcast::Sender<String>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn catalog(&self) -> &CatalogHandle {
        &self.catalog
    }

    // ── Create ───────────────────────────────────────────────────────

    pub async fn create_app(&self, request: &str) -> PipelineOutcome {
        self.create_app_with_run_id(new_run_id(), request).await
    }

    pub async fn create_app_with_run_id(&self, run_id: String, request: &str) -> PipelineOutcome {
        let span = tracing::info_span!("create_app", run_id = %run_id);
        async move {
            let mut tracker = self.tracker(run_id, Flow::Create);
            let outcome = match self.run_create(&mut tracker, request).await {
                Ok(deployment) => {
                    tracing::info!(deployment_id = %deployment.deployment_id, "App published");
                    PipelineOutcome::succeeded(deployment, None)
                }
                Err(e) => {
                    tracing::error!(stage = %tracker.stage, error = %e, "Create failed");
                    PipelineOutcome::failed(&e, tracker.stage, None)
                }
            };
            tracker.finish(&outcome);
            outcome
        }
        .instrument(span)
        .await
    }

    async fn run_create(&self, tracker: &mut RunTracker<'_>, request: &str) -> Result<Deployment, PipelineError> {
        tracker.enter(Stage::GeneratingCode);
        let artifact = self
            .generator
            .generate_code(request, None)
            .await
            .map_err(PipelineError::generation)?;

        tracker.enter(Stage::GeneratingMetadata);
        let metadata = self.metadata(request, None).await?;

        let deployment = self.build_and_publish(tracker, &artifact).await?;

        tracker.enter(Stage::WritingCatalog);
        let record = CatalogRecord::new(
            &metadata,
            &deployment.deployment_id,
            self.policy.rating(),
            self.policy.featured(),
        );
        match self.catalog.create(record).await {
            CatalogWrite::Written => Ok(deployment),
            CatalogWrite::Failed(msg) => Err(PipelineError::CatalogWriteFailed(msg)),
            CatalogWrite::NotFound => Err(PipelineError::CatalogWriteFailed(
                "insert reported no row".to_string(),
            )),
        }
    }

    // ── Edit ─────────────────────────────────────────────────────────

    pub async fn edit_app(&self, request: &str, deployment_id: &str) -> PipelineOutcome {
        self.edit_app_with_run_id(new_run_id(), request, deployment_id).await
    }

    pub async fn edit_app_with_run_id(&self, run_id: String, request: &str, deployment_id: &str) -> PipelineOutcome {
        let span = tracing::info_span!("edit_app", run_id = %run_id, deployment_id = %deployment_id);
        async move {
            let mut tracker = self.tracker(run_id, Flow::Edit);
            let previous = Some(deployment_id.to_string());
            let outcome = match self.run_edit(&mut tracker, request, deployment_id).await {
                Ok(deployment) => {
                    tracing::info!(new_deployment_id = %deployment.deployment_id, "App updated");
                    PipelineOutcome::succeeded(deployment, previous)
                }
                Err(e) => {
                    tracing::error!(stage = %tracker.stage, error = %e, "Edit failed");
                    PipelineOutcome::failed(&e, tracker.stage, previous)
                }
            };
            tracker.finish(&outcome);
            outcome
        }
        .instrument(span)
        .await
    }

    async fn run_edit(
        &self,
        tracker: &mut RunTracker<'_>,
        request: &str,
        deployment_id: &str,
    ) -> Result<Deployment, PipelineError> {
        tracker.enter(Stage::FetchingPrevious);
        let previous = self
            .catalog
            .find_by_deployment(deployment_id)
            .await
            .map_err(|e| PipelineError::FetchFailed(format!("{:#}", e)))?
            .ok_or_else(|| PipelineError::NotFound(format!("No app found for deployment {}", deployment_id)))?;
        let prior_code = self
            .store
            .get(&source_path(deployment_id))
            .await
            .map_err(|e| PipelineError::FetchFailed(format!("{:#}", e)))?
            .ok_or_else(|| {
                PipelineError::NotFound(format!("No stored source for deployment {}", deployment_id))
            })?;
        let prior_code = String::from_utf8(prior_code)
            .map_err(|_| PipelineError::FetchFailed("stored source is not valid UTF-8".to_string()))?;
        let prior_metadata = previous.record.metadata();

        tracker.enter(Stage::GeneratingCode);
        let artifact = self
            .generator
            .generate_code(request, Some(&prior_code))
            .await
            .map_err(PipelineError::generation)?;

        tracker.enter(Stage::GeneratingMetadata);
        let metadata = self.metadata(request, Some(&prior_metadata)).await?;

        let deployment = self.build_and_publish(tracker, &artifact).await?;

        tracker.enter(Stage::UpdatingCatalog);
        match self
            .catalog
            .update(deployment_id, metadata, &deployment.deployment_id)
            .await
        {
            CatalogWrite::Written => Ok(deployment),
            CatalogWrite::NotFound => Err(PipelineError::NotFound(format!(
                "No app found for deployment {}",
                deployment_id
            ))),
            CatalogWrite::Failed(msg) => Err(PipelineError::CatalogWriteFailed(msg)),
        }
    }

    // ── Shared steps ─────────────────────────────────────────────────

    fn tracker(&self, run_id: String, flow: Flow) -> RunTracker<'_> {
        RunTracker {
            run_id,
            flow,
            stage: match flow {
                Flow::Create => Stage::GeneratingCode,
                Flow::Edit => Stage::FetchingPrevious,
            },
            events: self.events.as_ref(),
        }
    }

    async fn metadata(&self, request: &str, prior: Option<&AppMetadata>) -> Result<AppMetadata, PipelineError> {
        let metadata = self
            .generator
            .generate_metadata(request, prior)
            .await
            .map_err(PipelineError::generation)?;
        metadata
            .validate()
            .map_err(|e| PipelineError::Generation(e.to_string()))?;
        Ok(metadata)
    }

    /// Prepare, build, scan and upload; the workspace is always disposed.
    async fn build_and_publish(
        &self,
        tracker: &mut RunTracker<'_>,
        artifact: &GeneratedArtifact,
    ) -> Result<Deployment, PipelineError> {
        tracker.enter(Stage::Building);
        let manager = self.workspaces.clone();
        let owned = artifact.clone();
        let workspace = tokio::task::spawn_blocking(move || manager.prepare(Some(&owned)))
            .await
            .map_err(|e| PipelineError::io("preparing workspace", std::io::Error::other(e)))??;

        let result = self.build_in(tracker, &workspace, artifact).await;

        if let Err(e) = tokio::task::spawn_blocking(move || workspace.dispose()).await {
            tracing::warn!(error = %e, "Workspace cleanup task failed");
        }
        result
    }

    async fn build_in(
        &self,
        tracker: &mut RunTracker<'_>,
        workspace: &BuildWorkspace,
        artifact: &GeneratedArtifact,
    ) -> Result<Deployment, PipelineError> {
        let output = self.builder.build(workspace.root()).await?;
        let files = scanner::scan(&output)?;
        tracing::info!(files = files.len(), "Scanned build output");

        // Minted only once there is something to publish.
        let deployment_id = new_deployment_id();
        tracker.enter(Stage::Uploading);
        let report = self.uploader.upload_all(&files, &deployment_id).await;
        if let UploadOutcome::Partial { failed } = report.outcome() {
            tracing::warn!(deployment_id = %deployment_id, failed, "Publishing a partial deployment");
        }

        let manifest = self.uploader.build_manifest(&deployment_id, report.uploaded);
        let manifest_url = self.uploader.upload_manifest(&manifest).await?;

        if let Err(e) = self.uploader.upload_source(&deployment_id, artifact.content()).await {
            tracing::warn!(deployment_id = %deployment_id, error = %e, "Could not store generated source; edits of this deployment will fail");
        }

        Ok(Deployment {
            deployment_id,
            manifest_url,
            total_files: manifest.total_files,
            failed_uploads: report.failed,
        })
    }
}
