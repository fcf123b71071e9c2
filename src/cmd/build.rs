//! `appforge build`: build the template locally without publishing.

use std::path::Path;

use anyhow::{Context, Result};
use appforge::config::AppForgeConfig;
use appforge::pipeline::{BuildInvoker, WorkspaceManager, build_local};
use appforge_common::GeneratedArtifact;

pub async fn cmd_build(config: &AppForgeConfig, jsx: Option<&Path>, out: Option<&Path>) -> Result<()> {
    let artifact = match jsx {
        Some(path) => Some(read_component(path)?),
        None => None,
    };

    let workspaces = WorkspaceManager::from_config(&config.template, &config.build);
    let builder = BuildInvoker::from_config(&config.build);
    let build = build_local(&workspaces, &builder, artifact.as_ref(), out).await?;

    for file in &build.files {
        println!("{}", file);
    }
    eprintln!(
        "{} {} file(s)",
        console::style("Built").green().bold(),
        build.files.len()
    );
    if let Some(dir) = &build.output_dir {
        eprintln!("Output copied to {}", dir.display());
    }
    Ok(())
}

fn read_component(path: &Path) -> Result<GeneratedArtifact> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    if !matches!(extension, "jsx" | "js") {
        anyhow::bail!("Component file must be a .jsx or .js file: {}", path.display());
    }
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    GeneratedArtifact::new(source).with_context(|| format!("Invalid component in {}", path.display()))
}
