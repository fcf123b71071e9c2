use serde::{Deserialize, Serialize};

use crate::metadata::AppMetadata;

/// Version string written for every newly published app.
pub const INITIAL_VERSION: &str = "1.0.0";

/// Download counter of a freshly published app.
pub const INITIAL_DOWNLOADS: i64 = 1;

/// Catalog row describing one published app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub name: String,
    pub description: String,
    pub category: String,
    pub tags: Vec<String>,
    /// Always the most recently built deployment of this app.
    pub deployment_id: String,
    pub icon_url: Option<String>,
    pub version: String,
    pub rating: f64,
    pub downloads: i64,
    pub is_featured: bool,
}

impl CatalogRecord {
    pub fn new(metadata: &AppMetadata, deployment_id: &str, rating: f64, is_featured: bool) -> Self {
        Self {
            name: metadata.name.clone(),
            description: metadata.description.clone(),
            category: metadata.category.clone(),
            tags: metadata.tags.clone(),
            deployment_id: deployment_id.to_string(),
            icon_url: metadata.icon.clone(),
            version: INITIAL_VERSION.to_string(),
            rating,
            downloads: INITIAL_DOWNLOADS,
            is_featured,
        }
    }

    /// The descriptive part of the row, as handed to the model on edit.
    pub fn metadata(&self) -> AppMetadata {
        AppMetadata {
            name: self.name.clone(),
            description: self.description.clone(),
            category: self.category.clone(),
            tags: self.tags.clone(),
            icon: self.icon_url.clone(),
        }
    }
}

/// A catalog row read back from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredApp {
    pub id: i64,
    #[serde(flatten)]
    pub record: CatalogRecord,
    pub created_at: String,
    pub updated_at: String,
}
