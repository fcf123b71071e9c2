//! `appforge edit`: rebuild an existing app from a change request.

use anyhow::Result;
use appforge::config::AppForgeConfig;

use super::{build_pipeline, report_outcome};

pub async fn cmd_edit(config: &AppForgeConfig, deployment_id: &str, request: &str) -> Result<()> {
    let request = request.trim();
    if request.is_empty() {
        anyhow::bail!("The edit request must not be empty");
    }

    let pipeline = build_pipeline(config, false)?;
    eprintln!(
        "{} {} ({})",
        console::style("Editing app:").bold().cyan(),
        deployment_id,
        request
    );
    let outcome = pipeline.edit_app(request, deployment_id).await;
    report_outcome(&outcome)
}
