//! Shared domain types for the AppForge pipeline.
//!
//! These types cross every seam of the system: the generation collaborator
//! produces [`GeneratedArtifact`] and [`AppMetadata`], the uploader produces
//! [`UploadedFile`] entries that are folded into a [`DeploymentManifest`],
//! and the catalog persists a [`CatalogRecord`] per published app.

pub mod artifact;
pub mod catalog;
pub mod manifest;
pub mod metadata;

pub use artifact::{ArtifactError, GeneratedArtifact};
pub use catalog::{CatalogRecord, INITIAL_DOWNLOADS, INITIAL_VERSION, StoredApp};
pub use manifest::{DeploymentManifest, UploadedFile, find_entry_point};
pub use metadata::{AppMetadata, MetadataError, TAG_COUNT};

/// Mint a fresh deployment identifier.
///
/// The identifier is the storage path prefix of every object in the
/// deployment and the join key of the catalog row that points at it.
pub fn new_deployment_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deployment_ids_are_unique_uuids() {
        let a = new_deployment_id();
        let b = new_deployment_id();
        assert_ne!(a, b);
        assert!(uuid::Uuid::parse_str(&a).is_ok());
    }
}
