//! Typed error hierarchy for the build-and-deploy pipeline.
//!
//! Every step of a create or edit run fails with a `PipelineError`; the
//! orchestrator converts it into a `PipelineOutcome` carrying the message
//! and the `ErrorKind` tag so callers branch on kind instead of text.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the pipeline steps.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Template directory not found: {}", path.display())]
    TemplateMissing { path: PathBuf },

    #[error("Build failed: {stderr}")]
    BuildFailed { stderr: String },

    #[error("Build output directory not found after build: {}", path.display())]
    OutputMissing { path: PathBuf },

    #[error("Upload failed for {path}: {message}")]
    UploadFailed { path: String, message: String },

    #[error("Manifest upload failed: {0}")]
    ManifestUploadFailed(String),

    #[error("Catalog write failed: {0}")]
    CatalogWriteFailed(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Failed to fetch previous deployment: {0}")]
    FetchFailed(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Wrap a collaborator failure, keeping the whole `anyhow` chain in the message.
    pub fn generation(err: anyhow::Error) -> Self {
        Self::Generation(format!("{:#}", err))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TemplateMissing { .. } => ErrorKind::TemplateMissing,
            Self::BuildFailed { .. } => ErrorKind::BuildFailed,
            Self::OutputMissing { .. } => ErrorKind::OutputMissing,
            Self::UploadFailed { .. } => ErrorKind::UploadFailed,
            Self::ManifestUploadFailed(_) => ErrorKind::ManifestUploadFailed,
            Self::CatalogWriteFailed(_) => ErrorKind::CatalogWriteFailed,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::FetchFailed(_) => ErrorKind::FetchFailed,
            Self::Generation(_) => ErrorKind::Generation,
            Self::Io { .. } => ErrorKind::Io,
        }
    }
}

/// Flat tag for a `PipelineError`, serialized into failure results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    TemplateMissing,
    BuildFailed,
    OutputMissing,
    UploadFailed,
    ManifestUploadFailed,
    CatalogWriteFailed,
    NotFound,
    FetchFailed,
    Generation,
    Io,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TemplateMissing => "template_missing",
            Self::BuildFailed => "build_failed",
            Self::OutputMissing => "output_missing",
            Self::UploadFailed => "upload_failed",
            Self::ManifestUploadFailed => "manifest_upload_failed",
            Self::CatalogWriteFailed => "catalog_write_failed",
            Self::NotFound => "not_found",
            Self::FetchFailed => "fetch_failed",
            Self::Generation => "generation",
            Self::Io => "io",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
