//! Object storage seam.
//!
//! The pipeline only needs two things from storage: accept one object under
//! a destination path and hand back where it can be fetched, and read an
//! object back by path (used by the edit flow). `HttpObjectStore` talks to
//! the hosted upload function; `MemoryStore` backs tests and dry runs.

pub mod http;
pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

pub use http::HttpObjectStore;
pub use memory::MemoryStore;

/// Storage path prefix of every object in a deployment.
pub fn deployment_prefix(deployment_id: &str) -> String {
    format!("deployments/{}/", deployment_id)
}

/// Storage path of one file of a deployment.
pub fn deployment_path(deployment_id: &str, relative_path: &str) -> String {
    format!("{}{}", deployment_prefix(deployment_id), relative_path.trim_start_matches('/'))
}

/// One object to store.
#[derive(Debug, Clone)]
pub struct PutObject {
    pub content: Vec<u8>,
    /// Full destination path, e.g. `deployments/<id>/assets/app.js`.
    pub destination: String,
    pub content_type: String,
    pub file_name: String,
    pub deployment_id: String,
    pub relative_path: Option<String>,
    pub platform: String,
    pub is_manifest: bool,
}

/// What storage reports back for an accepted object.
///
/// Every field except the ones the pipeline can derive itself is optional,
/// since the upload function does not guarantee them.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredObject {
    #[serde(default)]
    pub file_id: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub public_url: Option<String>,
    #[serde(default)]
    pub upload_path: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub file_type: Option<String>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store one object. The error message is what the pipeline reports to users.
    async fn put(&self, object: PutObject) -> Result<StoredObject>;

    /// Read an object back; `Ok(None)` when it does not exist.
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>>;

    /// Public URL under which `path` is served.
    fn public_url(&self, path: &str) -> String;
}
