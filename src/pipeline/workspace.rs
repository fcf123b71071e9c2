//! Isolated build workspaces seeded from the application template.

use std::fs;
use std::path::{Path, PathBuf};

use appforge_common::GeneratedArtifact;
use tempfile::TempDir;
use walkdir::WalkDir;

use crate::config::{BuildConfig, TemplateConfig};
use crate::errors::PipelineError;

const WORKSPACE_PREFIX: &str = "appforge_build_";
const APP_DIR: &str = "app";

/// Creates workspaces from one fixed template.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    template_root: PathBuf,
    entry_file: PathBuf,
    temp_parent: Option<PathBuf>,
}

/// One build attempt's file tree.
///
/// Owns its temporary directory when the template was copied; dropping it
/// without `dispose` still removes the directory, just without logging.
#[derive(Debug)]
pub struct BuildWorkspace {
    root: PathBuf,
    dir: Option<TempDir>,
}

impl WorkspaceManager {
    pub fn new(template_root: impl Into<PathBuf>, entry_file: impl Into<PathBuf>) -> Self {
        Self {
            template_root: template_root.into(),
            entry_file: entry_file.into(),
            temp_parent: None,
        }
    }

    pub fn from_config(template: &TemplateConfig, build: &BuildConfig) -> Self {
        let mut manager = Self::new(&template.root, &template.entry_file);
        manager.temp_parent = build.work_dir.clone();
        manager
    }

    /// Create workspaces under `parent` instead of the system temp dir.
    pub fn with_temp_parent(mut self, parent: impl Into<PathBuf>) -> Self {
        self.temp_parent = Some(parent.into());
        self
    }

    pub fn template_root(&self) -> &Path {
        &self.template_root
    }

    /// Copy the template into a fresh temporary directory and inject
    /// `artifact` as the entry file.
    ///
    /// Without an artifact the template root itself is the workspace and
    /// nothing is copied. On error the partially built directory is removed
    /// before returning.
    pub fn prepare(&self, artifact: Option<&GeneratedArtifact>) -> Result<BuildWorkspace, PipelineError> {
        if !self.template_root.is_dir() {
            return Err(PipelineError::TemplateMissing {
                path: self.template_root.clone(),
            });
        }

        let Some(artifact) = artifact else {
            tracing::debug!(template = %self.template_root.display(), "Building unmodified template in place");
            return Ok(BuildWorkspace {
                root: self.template_root.clone(),
                dir: None,
            });
        };

        let mut builder = tempfile::Builder::new();
        builder.prefix(WORKSPACE_PREFIX);
        let dir = match &self.temp_parent {
            Some(parent) => {
                fs::create_dir_all(parent)
                    .map_err(|e| PipelineError::io(format!("creating {}", parent.display()), e))?;
                builder.tempdir_in(parent)
            }
            None => builder.tempdir(),
        }
        .map_err(|e| PipelineError::io("creating build workspace", e))?;

        // From here on `dir` removes itself if we bail out.
        let root = dir.path().join(APP_DIR);
        copy_tree(&self.template_root, &root)?;

        let entry = root.join(&self.entry_file);
        if let Some(parent) = entry.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| PipelineError::io(format!("creating {}", parent.display()), e))?;
        }
        fs::write(&entry, artifact.content())
            .map_err(|e| PipelineError::io(format!("writing {}", entry.display()), e))?;

        tracing::debug!(workspace = %root.display(), "Prepared build workspace");
        Ok(BuildWorkspace {
            root,
            dir: Some(dir),
        })
    }
}

impl BuildWorkspace {
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether this workspace is a private copy (and will be deleted).
    pub fn is_temporary(&self) -> bool {
        self.dir.is_some()
    }

    /// Remove the workspace tree. Failures are logged, never returned.
    pub fn dispose(self) {
        let Some(dir) = self.dir else {
            return;
        };
        let path = dir.path().to_path_buf();
        match dir.close() {
            Ok(()) => tracing::debug!(workspace = %path.display(), "Removed build workspace"),
            Err(e) => tracing::warn!(
                workspace = %path.display(),
                error = %e,
                "Failed to remove build workspace"
            ),
        }
    }
}

/// Recursively copy `src` to `dst`, recreating symlinks instead of following them.
pub(crate) fn copy_tree(src: &Path, dst: &Path) -> Result<(), PipelineError> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| {
            let context = format!("walking {}", src.display());
            match e.into_io_error() {
                Some(io) => PipelineError::io(context, io),
                None => PipelineError::io(context, std::io::Error::other("filesystem loop")),
            }
        })?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| PipelineError::io("resolving template path", std::io::Error::other(e)))?;
        let target = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)
                .map_err(|e| PipelineError::io(format!("creating {}", target.display()), e))?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)
                .map_err(|e| PipelineError::io(format!("copying {}", entry.path().display()), e))?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> Result<(), PipelineError> {
    let pointee = fs::read_link(link)
        .map_err(|e| PipelineError::io(format!("reading link {}", link.display()), e))?;
    std::os::unix::fs::symlink(&pointee, target)
        .map_err(|e| PipelineError::io(format!("creating link {}", target.display()), e))
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, target: &Path) -> Result<(), PipelineError> {
    fs::copy(link, target)
        .map(|_| ())
        .map_err(|e| PipelineError::io(format!("copying {}", link.display()), e))
}
