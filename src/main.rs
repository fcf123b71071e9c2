use anyhow::{Context, Result};
use appforge::config::AppForgeConfig;
use appforge::logging::{self, LogFormat};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "appforge")]
#[command(version, about = "Generate, build and publish mini apps from a one-line request")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to appforge.toml. Defaults to appforge.toml in the project directory.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory that relative paths in the configuration resolve against.
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    pub log_format: LogFormat,

    /// Also append logs to <dir>/app.log
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a new app from a request, build it and publish it
    Create {
        /// What the app should do, e.g. "a tip calculator"
        request: String,

        /// Keep uploads and the catalog row in memory
        #[arg(long)]
        dry_run: bool,
    },
    /// Rebuild a published app from a change request
    Edit {
        /// Deployment the app is currently served from
        deployment_id: String,

        /// The change to make
        request: String,
    },
    /// Build the template locally without publishing
    Build {
        /// Component to inject as the template's entry file
        #[arg(long)]
        jsx: Option<PathBuf>,

        /// Copy the build output here
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Run the HTTP API
    Serve {
        #[arg(short, long)]
        port: Option<u16>,

        /// Keep uploads and catalog rows in memory
        #[arg(long)]
        dry_run: bool,

        /// Accept cross-origin requests from any origin
        #[arg(long)]
        cors: bool,
    },
    /// Create the catalog database and run migrations
    InitDb,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    if let Err(e) = dotenvy::from_path(project_dir.join(".env")) {
        if !e.not_found() {
            return Err(e).context("Failed to load .env");
        }
    }

    let level = if cli.verbose { "debug" } else { "info" };
    let _log_guard = logging::init(level, cli.log_format, cli.log_dir.as_deref())?;

    let config = AppForgeConfig::load(cli.config.as_deref(), &project_dir)?;
    tracing::debug!(?config, "Loaded configuration");

    match &cli.command {
        Commands::Create { request, dry_run } => {
            cmd::cmd_create(&config, request, *dry_run).await?;
        }
        Commands::Edit {
            deployment_id,
            request,
        } => {
            cmd::cmd_edit(&config, deployment_id, request).await?;
        }
        Commands::Build { jsx, out } => {
            cmd::cmd_build(&config, jsx.as_deref(), out.as_deref()).await?;
        }
        Commands::Serve { port, dry_run, cors } => {
            cmd::cmd_serve(&config, *port, *dry_run, *cors).await?;
        }
        Commands::InitDb => cmd::cmd_init_db(&config)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_create() {
        let cli = Cli::try_parse_from(["appforge", "create", "a tip calculator", "--dry-run"]).unwrap();
        match cli.command {
            Commands::Create { request, dry_run } => {
                assert_eq!(request, "a tip calculator");
                assert!(dry_run);
            }
            _ => panic!("Expected Create"),
        }
    }

    #[test]
    fn test_cli_parses_edit_with_global_flags() {
        let cli = Cli::try_parse_from([
            "appforge",
            "edit",
            "d-123",
            "make it dark",
            "--log-format",
            "json",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.log_format, LogFormat::Json);
        match cli.command {
            Commands::Edit { deployment_id, request } => {
                assert_eq!(deployment_id, "d-123");
                assert_eq!(request, "make it dark");
            }
            _ => panic!("Expected Edit"),
        }
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["appforge"]).is_err());
    }
}
