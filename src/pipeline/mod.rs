//! The build-and-deploy pipeline.
//!
//! Leaves first: `workspace` (template copy + injection), `builder`
//! (external toolchain), `scanner` (output enumeration), `uploader` (object
//! storage + manifest), `policy` (initial catalog values), `events`
//! (progress broadcast) and `orchestrator` (create / edit flows).

pub mod builder;
pub mod events;
pub mod orchestrator;
pub mod policy;
pub mod scanner;
pub mod uploader;
pub mod workspace;

use std::fs;
use std::path::{Path, PathBuf};

use appforge_common::GeneratedArtifact;

pub use builder::BuildInvoker;
pub use events::{Flow, PipelineEvent, Stage};
pub use orchestrator::{Pipeline, PipelineOutcome};
pub use policy::{FixedPolicy, InitialValuePolicy, RandomPolicy};
pub use scanner::{ScannedFile, scan};
pub use uploader::{UploadOutcome, UploadReport, Uploader, content_type_for};
pub use workspace::{BuildWorkspace, WorkspaceManager};

use crate::errors::PipelineError;

/// Result of a build that was not published.
#[derive(Debug, Clone)]
pub struct LocalBuild {
    /// Relative paths of the produced files.
    pub files: Vec<String>,
    /// Where the output was copied, when requested.
    pub output_dir: Option<PathBuf>,
}

/// Prepare, build and scan without uploading anything.
///
/// With `output_dir` the build output is copied there, replacing whatever
/// the directory held before.
pub async fn build_local(
    workspaces: &WorkspaceManager,
    builder: &BuildInvoker,
    artifact: Option<&GeneratedArtifact>,
    output_dir: Option<&Path>,
) -> Result<LocalBuild, PipelineError> {
    let manager = workspaces.clone();
    let owned = artifact.cloned();
    let workspace = tokio::task::spawn_blocking(move || manager.prepare(owned.as_ref()))
        .await
        .map_err(|e| PipelineError::io("preparing workspace", std::io::Error::other(e)))??;

    let result = async {
        let output = builder.build(workspace.root()).await?;
        let files = scan(&output)?;
        if let Some(dest) = output_dir {
            replace_dir(&output, dest)?;
        }
        Ok::<_, PipelineError>(LocalBuild {
            files: files.into_iter().map(|f| f.relative).collect(),
            output_dir: output_dir.map(Path::to_path_buf),
        })
    }
    .await;

    workspace.dispose();
    result
}

fn replace_dir(src: &Path, dest: &Path) -> Result<(), PipelineError> {
    if dest.exists() {
        fs::remove_dir_all(dest)
            .map_err(|e| PipelineError::io(format!("clearing {}", dest.display()), e))?;
    }
    workspace::copy_tree(src, dest)?;
    tracing::info!(dest = %dest.display(), "Copied build output");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn test_build_local_copies_output_and_cleans_up() {
        let dir = tempdir().unwrap();
        let template = dir.path().join("template");
        fs::create_dir_all(template.join("src")).unwrap();
        fs::write(template.join("src/App.jsx"), "old").unwrap();
        let work = dir.path().join("work");
        let out = dir.path().join("out");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("stale.txt"), "from a previous build").unwrap();

        let workspaces = WorkspaceManager::new(&template, "src/App.jsx").with_temp_parent(&work);
        let builder = BuildInvoker::new(vec![], sh("mkdir web && cp src/App.jsx web/app.js"), "web");
        let artifact = GeneratedArtifact::new("new source").unwrap();

        let build = build_local(&workspaces, &builder, Some(&artifact), Some(&out))
            .await
            .unwrap();
        assert_eq!(build.files, vec!["app.js".to_string()]);
        assert_eq!(fs::read_to_string(out.join("app.js")).unwrap(), "new source");
        assert!(!out.join("stale.txt").exists());
        assert_eq!(fs::read_dir(&work).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_build_local_failure_cleans_up() {
        let dir = tempdir().unwrap();
        let template = dir.path().join("template");
        fs::create_dir_all(&template).unwrap();
        let work = dir.path().join("work");
        let workspaces = WorkspaceManager::new(&template, "src/App.jsx").with_temp_parent(&work);
        let builder = BuildInvoker::new(vec![], sh("echo 'syntax error' >&2; exit 2"), "web");
        let artifact = GeneratedArtifact::new("broken").unwrap();

        let err = build_local(&workspaces, &builder, Some(&artifact), None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Build failed: syntax error");
        assert_eq!(fs::read_dir(&work).unwrap().count(), 0);
    }
}
