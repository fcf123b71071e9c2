//! Configuration for AppForge.
//!
//! Settings are layered: `appforge.toml` (every section optional) →
//! environment (`STORAGE_URL`, secrets) → CLI flags. Secrets are never read
//! from the file.
//!
//! ```toml
//! [template]
//! root = "template-web-app"
//! entry_file = "src/App.jsx"
//! entry_point_name = "index.html"
//!
//! [build]
//! install_command = ["npm", "install"]
//! build_command = ["npm", "run", "build"]
//! output_dir = "web"
//! platform = "web"
//! # work_dir = "/var/tmp/appforge"
//!
//! [storage]
//! base_url = "https://project.supabase.co"
//! timeout_secs = 30
//! concurrency = 4
//!
//! [catalog]
//! db_path = ".appforge/catalog.db"
//!
//! [generation]
//! model = "anthropic/claude-sonnet-4"
//!
//! [policy]
//! rating_min = 4.1
//! rating_max = 5.0
//! featured_probability = 0.0
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "appforge.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppForgeConfig {
    pub template: TemplateConfig,
    pub build: BuildConfig,
    pub storage: StorageConfig,
    pub catalog: CatalogConfig,
    pub generation: GenerationConfig,
    pub server: ServerSettings,
    pub policy: PolicyConfig,
}

/// The fixed application template the generated component is injected into.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    pub root: PathBuf,
    /// Path of the single customizable file, relative to `root`.
    pub entry_file: PathBuf,
    /// File name that marks the deployment entry point in the manifest.
    pub entry_point_name: String,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("template-web-app"),
            entry_file: PathBuf::from("src/App.jsx"),
            entry_point_name: "index.html".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub install_command: Vec<String>,
    pub build_command: Vec<String>,
    /// Output directory produced by the build, relative to the workspace.
    pub output_dir: PathBuf,
    pub platform: String,
    /// Parent directory for build workspaces; the system temp dir when unset.
    pub work_dir: Option<PathBuf>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            install_command: vec!["npm".to_string(), "install".to_string()],
            build_command: vec!["npm".to_string(), "run".to_string(), "build".to_string()],
            output_dir: PathBuf::from("web"),
            platform: "web".to_string(),
            work_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub base_url: String,
    pub upload_path: String,
    pub public_path: String,
    pub timeout_secs: u64,
    /// Maximum number of file uploads in flight for one deployment.
    pub concurrency: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            upload_path: "/functions/v1/upload-zip-file".to_string(),
            public_path: "/storage/v1/object/public/apps".to_string(),
            timeout_secs: 30,
            concurrency: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub db_path: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(".appforge/catalog.db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            model: "anthropic/claude-sonnet-4".to_string(),
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8001,
        }
    }
}

/// Ranges for the catalog fields assigned at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub rating_min: f64,
    pub rating_max: f64,
    pub featured_probability: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            rating_min: 4.1,
            rating_max: 5.0,
            featured_probability: 0.0,
        }
    }
}

/// Credentials read from the environment only.
#[derive(Clone, Default)]
pub struct Secrets {
    pub openrouter_api_key: Option<String>,
    pub storage_key: Option<String>,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("openrouter_api_key", &self.openrouter_api_key.as_ref().map(|_| "***"))
            .field("storage_key", &self.storage_key.as_ref().map(|_| "***"))
            .finish()
    }
}

impl Secrets {
    pub fn from_env() -> Self {
        Self {
            openrouter_api_key: non_empty_env("OPENROUTER_API_KEY"),
            storage_key: non_empty_env("STORAGE_KEY"),
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl AppForgeConfig {
    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, `appforge.toml` in
    /// `base_dir` is used when present and defaults otherwise.
    pub fn load(path: Option<&Path>, base_dir: &Path) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = base_dir.join(CONFIG_FILE_NAME);
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env();
        config.resolve_relative_to(base_dir);
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid appforge configuration")
    }

    /// Environment overrides for non-secret settings.
    pub fn apply_env(&mut self) {
        if let Some(url) = non_empty_env("STORAGE_URL") {
            self.storage.base_url = url;
        }
        if let Some(model) = non_empty_env("APPFORGE_MODEL") {
            self.generation.model = model;
        }
    }

    fn resolve_relative_to(&mut self, base_dir: &Path) {
        if self.template.root.is_relative() {
            self.template.root = base_dir.join(&self.template.root);
        }
        if self.catalog.db_path.is_relative() {
            self.catalog.db_path = base_dir.join(&self.catalog.db_path);
        }
        if let Some(work_dir) = self.build.work_dir.as_mut().filter(|p| p.is_relative()) {
            *work_dir = base_dir.join(&*work_dir);
        }
    }

    /// Settings problems worth surfacing before a run starts.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.build.build_command.is_empty() {
            warnings.push("[build] build_command is empty; every build will fail".to_string());
        }
        if self.storage.base_url.is_empty() {
            warnings.push("[storage] base_url is not set (set STORAGE_URL)".to_string());
        }
        if self.policy.rating_min > self.policy.rating_max {
            warnings.push(format!(
                "[policy] rating_min {} is above rating_max {}",
                self.policy.rating_min, self.policy.rating_max
            ));
        }
        if !(0.0..=1.0).contains(&self.policy.featured_probability) {
            warnings.push(format!(
                "[policy] featured_probability {} is outside 0..=1 and will be clamped",
                self.policy.featured_probability
            ));
        }
        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = AppForgeConfig::default();
        assert_eq!(config.template.entry_file, PathBuf::from("src/App.jsx"));
        assert_eq!(config.template.entry_point_name, "index.html");
        assert_eq!(config.build.build_command, vec!["npm", "run", "build"]);
        assert_eq!(config.build.output_dir, PathBuf::from("web"));
        assert_eq!(config.storage.timeout_secs, 30);
        assert_eq!(config.policy.rating_min, 4.1);
        assert_eq!(config.server.port, 8001);
    }

    #[test]
    fn test_parse_partial_file_keeps_defaults() {
        let config = AppForgeConfig::parse(
            r#"
[build]
build_command = ["sh", "-c", "make web"]

[storage]
base_url = "https://example.supabase.co"
concurrency = 8
"#,
        )
        .unwrap();
        assert_eq!(config.build.build_command, vec!["sh", "-c", "make web"]);
        assert_eq!(config.build.install_command, vec!["npm", "install"]);
        assert_eq!(config.storage.base_url, "https://example.supabase.co");
        assert_eq!(config.storage.concurrency, 8);
        assert_eq!(config.storage.timeout_secs, 30);
        assert_eq!(config.catalog.db_path, PathBuf::from(".appforge/catalog.db"));
    }

    #[test]
    fn test_parse_invalid_toml() {
        assert!(AppForgeConfig::parse("not valid toml {{{{").is_err());
    }

    #[test]
    fn test_load_missing_default_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = AppForgeConfig::load(None, dir.path()).unwrap();
        assert_eq!(config.template.root, dir.path().join("template-web-app"));
        assert_eq!(config.catalog.db_path, dir.path().join(".appforge/catalog.db"));
    }

    #[test]
    fn test_load_explicit_path_must_exist() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(AppForgeConfig::load(Some(&missing), dir.path()).is_err());
    }

    #[test]
    fn test_load_reads_default_file_and_keeps_absolute_paths() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[template]\nroot = \"/opt/template\"\n",
        )
        .unwrap();
        let config = AppForgeConfig::load(None, dir.path()).unwrap();
        assert_eq!(config.template.root, PathBuf::from("/opt/template"));
    }

    #[test]
    fn test_warnings() {
        let mut config = AppForgeConfig::default();
        config.build.build_command.clear();
        config.policy.rating_min = 5.0;
        config.policy.rating_max = 1.0;
        let warnings = config.warnings();
        assert!(warnings.iter().any(|w| w.contains("build_command")));
        assert!(warnings.iter().any(|w| w.contains("base_url")));
        assert!(warnings.iter().any(|w| w.contains("rating_min")));
    }

    #[test]
    fn test_secrets_debug_is_redacted() {
        let secrets = Secrets {
            openrouter_api_key: Some("sk-live-123".to_string()),
            storage_key: None,
        };
        let debug = format!("{:?}", secrets);
        assert!(!debug.contains("sk-live-123"));
        assert!(debug.contains("***"));
    }
}
