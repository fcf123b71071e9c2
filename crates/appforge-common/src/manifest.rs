use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One file of a deployment as accepted by object storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    /// Path relative to the build output root, `/`-separated.
    pub original_path: String,
    pub file_id: Option<String>,
    pub public_url: String,
    pub file_size: u64,
    pub file_type: String,
    pub upload_path: String,
}

/// Synthesized description of one deployment, uploaded next to its files.
///
/// Clients resolve a deployment by fetching this document, so a deployment
/// without a manifest is unusable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentManifest {
    pub deployment_id: String,
    pub platform: String,
    pub timestamp: DateTime<Utc>,
    pub total_files: usize,
    pub files: Vec<UploadedFile>,
    pub entry_point: Option<UploadedFile>,
    pub base_url: String,
}

impl DeploymentManifest {
    pub fn new(
        deployment_id: &str,
        platform: &str,
        files: Vec<UploadedFile>,
        entry_name: &str,
        base_url: String,
    ) -> Self {
        let entry_point = find_entry_point(&files, entry_name).cloned();
        Self {
            deployment_id: deployment_id.to_string(),
            platform: platform.to_string(),
            timestamp: Utc::now(),
            total_files: files.len(),
            files,
            entry_point,
            base_url,
        }
    }
}

/// The first file whose relative path contains `entry_name`, falling back to
/// the first file, or `None` for an empty deployment.
pub fn find_entry_point<'a>(files: &'a [UploadedFile], entry_name: &str) -> Option<&'a UploadedFile> {
    files
        .iter()
        .find(|f| f.original_path.contains(entry_name))
        .or_else(|| files.first())
}
