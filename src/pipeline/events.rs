use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::orchestrator::PipelineOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flow {
    Create,
    Edit,
}

/// Steps of the create and edit state machines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    FetchingPrevious,
    GeneratingCode,
    GeneratingMetadata,
    Building,
    Uploading,
    WritingCatalog,
    UpdatingCatalog,
    Done,
    Failed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FetchingPrevious => "FETCHING_PREVIOUS",
            Self::GeneratingCode => "GENERATING_CODE",
            Self::GeneratingMetadata => "GENERATING_METADATA",
            Self::Building => "BUILDING",
            Self::Uploading => "UPLOADING",
            Self::WritingCatalog => "WRITING_CATALOG",
            Self::UpdatingCatalog => "UPDATING_CATALOG",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of one pipeline run, streamed to WebSocket clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum PipelineEvent {
    StageChanged { run_id: String, flow: Flow, stage: Stage },
    Finished { run_id: String, flow: Flow, outcome: PipelineOutcome },
}

/// Serialize and broadcast an event. Returns silently when nobody listens.
pub fn broadcast_event(tx: &broadcast::Sender<String>, event: &PipelineEvent) {
    match serde_json::to_string(event) {
        Ok(json) => {
            let _ = tx.send(json);
        }
        Err(e) => tracing::warn!(error = %e, "Failed to serialize pipeline event"),
    }
}
