//! `appforge create`: generate, build and publish a new app.

use anyhow::Result;
use appforge::config::AppForgeConfig;

use super::{build_pipeline, report_outcome};

pub async fn cmd_create(config: &AppForgeConfig, request: &str, dry_run: bool) -> Result<()> {
    let request = request.trim();
    if request.is_empty() {
        anyhow::bail!("The app request must not be empty");
    }

    let pipeline = build_pipeline(config, dry_run)?;
    eprintln!("{} {}", console::style("Creating app:").bold().cyan(), request);
    let outcome = pipeline.create_app(request).await;
    report_outcome(&outcome)
}
