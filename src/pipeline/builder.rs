//! Runs the external web toolchain inside a workspace.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;

use crate::config::BuildConfig;
use crate::errors::PipelineError;

/// Install + build commands and the output directory they produce.
#[derive(Debug, Clone)]
pub struct BuildInvoker {
    install_command: Vec<String>,
    build_command: Vec<String>,
    output_dir: PathBuf,
}

struct CommandOutput {
    status: ExitStatus,
    stderr: String,
}

impl BuildInvoker {
    pub fn new(install_command: Vec<String>, build_command: Vec<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            install_command,
            build_command,
            output_dir: output_dir.into(),
        }
    }

    pub fn from_config(config: &BuildConfig) -> Self {
        Self::new(
            config.install_command.clone(),
            config.build_command.clone(),
            &config.output_dir,
        )
    }

    /// Install dependencies, then build; returns the output directory.
    ///
    /// An install failure is only a warning since the template may already
    /// carry its dependencies. A failing build is `BuildFailed` with the
    /// toolchain's stderr.
    pub async fn build(&self, workspace: &Path) -> Result<PathBuf, PipelineError> {
        if self.install_command.is_empty() {
            tracing::debug!("No install command configured");
        } else {
            match run(&self.install_command, workspace).await {
                Ok(out) if out.status.success() => {
                    tracing::info!(workspace = %workspace.display(), "Dependencies installed");
                }
                Ok(out) => tracing::warn!(
                    status = %out.status,
                    stderr = %crate::util::truncate_chars(&out.stderr, 500),
                    "Dependency install failed, continuing with build"
                ),
                Err(e) => tracing::warn!(error = %e, "Dependency install could not run, continuing with build"),
            }
        }

        if self.build_command.is_empty() {
            return Err(PipelineError::BuildFailed {
                stderr: "no build command configured".to_string(),
            });
        }
        let out = run(&self.build_command, workspace)
            .await
            .map_err(|e| PipelineError::BuildFailed {
                stderr: format!("could not run {}: {}", self.build_command[0], e),
            })?;
        if !out.status.success() {
            let stderr = out.stderr.trim();
            let stderr = if stderr.is_empty() {
                format!("build command exited with {}", out.status)
            } else {
                stderr.to_string()
            };
            tracing::error!(status = %out.status, "Build command failed");
            return Err(PipelineError::BuildFailed { stderr });
        }

        let output = workspace.join(&self.output_dir);
        if !output.is_dir() {
            return Err(PipelineError::OutputMissing { path: output });
        }
        tracing::info!(output = %output.display(), "Build succeeded");
        Ok(output)
    }
}

async fn run(argv: &[String], cwd: &Path) -> std::io::Result<CommandOutput> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"))?;
    tracing::debug!(command = %argv.join(" "), cwd = %cwd.display(), "Running toolchain command");
    let output = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .env("CI", "1")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await?;
    Ok(CommandOutput {
        status: output.status,
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}
