//! End-to-end runs of the create and edit flows against a real template
//! directory, a shell build, the in-memory store and an in-memory catalog.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use appforge::catalog::{CatalogDb, CatalogHandle};
use appforge::config::AppForgeConfig;
use appforge::errors::ErrorKind;
use appforge::generation::Generator;
use appforge::pipeline::{FixedPolicy, Pipeline, Stage};
use appforge::storage::MemoryStore;
use appforge_common::{AppMetadata, GeneratedArtifact};
use tempfile::TempDir;

struct ScriptedGenerator;

#[async_trait::async_trait]
impl Generator for ScriptedGenerator {
    async fn generate_code(&self, request: &str, _prior: Option<&str>) -> anyhow::Result<GeneratedArtifact> {
        Ok(GeneratedArtifact::new(format!(
            "export default function App() {{ return <h1>{}</h1>; }}",
            request
        ))?)
    }

    async fn generate_metadata(&self, _request: &str, _prior: Option<&AppMetadata>) -> anyhow::Result<AppMetadata> {
        Ok(AppMetadata {
            name: "Tip Calculator".to_string(),
            description: "Work out the tip and split the bill".to_string(),
            category: "Finance".to_string(),
            tags: vec!["Money".into(), "Dining".into(), "Calculator".into()],
            icon: Some("💸".to_string()),
        })
    }
}

struct Harness {
    dir: TempDir,
    store: Arc<MemoryStore>,
    pipeline: Pipeline,
}

impl Harness {
    fn work_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("work")
    }

    fn work_dir_is_empty(&self) -> bool {
        let work = self.work_dir();
        !work.exists() || fs::read_dir(&work).unwrap().count() == 0
    }
}

fn harness(build_script: &str) -> Harness {
    let dir = TempDir::new().unwrap();
    let template = dir.path().join("template-web-app");
    fs::create_dir_all(template.join("src")).unwrap();
    fs::write(template.join("index.html"), "<div id=\"root\"></div>").unwrap();
    fs::write(template.join("src/App.jsx"), "placeholder").unwrap();

    let mut config = AppForgeConfig::default();
    config.template.root = template;
    config.build.install_command = vec![];
    config.build.build_command = vec!["sh".into(), "-c".into(), build_script.to_string()];
    config.build.work_dir = Some(dir.path().join("work"));

    let store = Arc::new(MemoryStore::new("https://cdn.example/apps"));
    let catalog = CatalogHandle::new(CatalogDb::new_in_memory().unwrap());
    let pipeline = Pipeline::new(&config, Arc::new(ScriptedGenerator), store.clone(), catalog)
        .with_policy(Arc::new(FixedPolicy {
            rating: 4.6,
            featured: false,
        }));

    Harness { dir, store, pipeline }
}

const BUILD_OK: &str =
    "mkdir -p web/assets && cp index.html web/index.html && cp src/App.jsx web/assets/app.js";

#[tokio::test]
async fn test_tip_calculator_is_generated_built_and_published() {
    let h = harness(BUILD_OK);

    let outcome = h.pipeline.create_app("a tip calculator").await;

    assert!(outcome.success, "{:?}", outcome.error);
    assert_eq!(outcome.stage, Stage::Done);
    let id = outcome.deployment_id.clone().unwrap();
    assert!(uuid::Uuid::parse_str(&id).is_ok());
    assert_eq!(outcome.total_files, Some(2));
    assert!(outcome.failed_uploads.is_empty());

    let manifest_path = format!("deployments/{}/manifest.json", id);
    let manifest: serde_json::Value =
        serde_json::from_slice(&h.store.object(&manifest_path).unwrap().content).unwrap();
    assert_eq!(manifest["deploymentId"], id.as_str());
    assert_eq!(manifest["totalFiles"], 2);
    assert!(
        manifest["entryPoint"]["originalPath"]
            .as_str()
            .unwrap()
            .ends_with("index.html")
    );

    let bundle = h
        .store
        .object(&format!("deployments/{}/assets/app.js", id))
        .unwrap();
    assert!(String::from_utf8(bundle.content).unwrap().contains("a tip calculator"));

    let row = h.pipeline.catalog().find_by_deployment(&id).await.unwrap().unwrap();
    assert_eq!(row.record.name, "Tip Calculator");
    assert_eq!(row.record.rating, 4.6);
    assert_eq!(row.record.downloads, 1);
    assert!(h.work_dir_is_empty());
}

#[tokio::test]
async fn test_build_failure_is_reported_and_leaves_nothing_behind() {
    let h = harness("echo 'module not found' >&2; exit 1");

    let outcome = h.pipeline.create_app("a tip calculator").await;

    assert!(!outcome.success);
    assert_eq!(outcome.error.as_deref(), Some("Build failed: module not found"));
    assert_eq!(outcome.error_kind, Some(ErrorKind::BuildFailed));
    assert_eq!(outcome.stage, Stage::Building);
    assert!(outcome.deployment_id.is_none());
    assert!(h.store.paths().is_empty());
    assert!(h.pipeline.catalog().list().await.unwrap().is_empty());
    assert!(h.work_dir_is_empty());
}

#[tokio::test]
async fn test_edit_of_unknown_deployment_never_builds() {
    let marker_dir = TempDir::new().unwrap();
    let marker = marker_dir.path().join("built");
    let script = format!("touch {} && {}", marker.display(), BUILD_OK);
    let h = harness(&script);

    let outcome = h.pipeline.edit_app("make it blue", "no-such-deployment").await;

    assert!(!outcome.success);
    assert_eq!(outcome.error_kind, Some(ErrorKind::NotFound));
    assert_eq!(outcome.stage, Stage::FetchingPrevious);
    assert_eq!(outcome.previous_deployment_id.as_deref(), Some("no-such-deployment"));
    assert!(!Path::new(&marker).exists());
    assert!(h.store.paths().is_empty());
}

#[tokio::test]
async fn test_edit_rebuilds_and_repoints_the_existing_row() {
    let h = harness(BUILD_OK);
    let created = h.pipeline.create_app("a tip calculator").await;
    let old_id = created.deployment_id.unwrap();
    let old_row = h.pipeline.catalog().find_by_deployment(&old_id).await.unwrap().unwrap();

    let edited = h.pipeline.edit_app("a tip calculator in euros", &old_id).await;

    assert!(edited.success, "{:?}", edited.error);
    let new_id = edited.deployment_id.unwrap();
    assert_ne!(new_id, old_id);
    assert_eq!(edited.previous_deployment_id.as_deref(), Some(old_id.as_str()));

    let rows = h.pipeline.catalog().list().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, old_row.id);
    assert_eq!(rows[0].record.deployment_id, new_id);
    assert_eq!(rows[0].record.rating, old_row.record.rating);

    // The superseded deployment stays in storage.
    assert!(
        h.store
            .object(&format!("deployments/{}/manifest.json", old_id))
            .is_some()
    );
    let rebuilt = h
        .store
        .object(&format!("deployments/{}/assets/app.js", new_id))
        .unwrap();
    assert!(String::from_utf8(rebuilt.content).unwrap().contains("in euros"));
}
