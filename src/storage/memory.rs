use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use super::{ObjectStore, PutObject, StoredObject};

/// In-process object store.
///
/// Used by tests and by the server's dry-run mode. Selected destinations can
/// be marked to fail so partial-upload behavior is observable.
pub struct MemoryStore {
    base_url: String,
    objects: Mutex<BTreeMap<String, StoredEntry>>,
    failing: Mutex<HashSet<String>>,
    failing_suffixes: Mutex<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct StoredEntry {
    pub content: Vec<u8>,
    pub content_type: String,
    pub is_manifest: bool,
}

impl MemoryStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            objects: Mutex::new(BTreeMap::new()),
            failing: Mutex::new(HashSet::new()),
            failing_suffixes: Mutex::new(Vec::new()),
        }
    }

    /// Make every `put` to `destination` fail.
    pub fn fail_on(&self, destination: impl Into<String>) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(destination.into());
        }
    }

    /// Make every `put` whose destination ends with `suffix` fail.
    pub fn fail_matching(&self, suffix: impl Into<String>) {
        if let Ok(mut suffixes) = self.failing_suffixes.lock() {
            suffixes.push(suffix.into());
        }
    }

    pub fn remove(&self, path: &str) -> Option<StoredEntry> {
        self.objects.lock().ok()?.remove(path)
    }

    fn should_fail(&self, destination: &str) -> Result<bool> {
        let exact = self
            .failing
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?
            .contains(destination);
        let suffix = self
            .failing_suffixes
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?
            .iter()
            .any(|s| destination.ends_with(s.as_str()));
        Ok(exact || suffix)
    }

    /// Seed an object directly, bypassing failure injection.
    pub fn insert(&self, path: impl Into<String>, content: impl Into<Vec<u8>>) {
        if let Ok(mut objects) = self.objects.lock() {
            objects.insert(
                path.into(),
                StoredEntry {
                    content: content.into(),
                    content_type: "application/octet-stream".to_string(),
                    is_manifest: false,
                },
            );
        }
    }

    pub fn object(&self, path: &str) -> Option<StoredEntry> {
        self.objects.lock().ok()?.get(path).cloned()
    }

    /// All stored paths in lexical order.
    pub fn paths(&self) -> Vec<String> {
        self.objects
            .lock()
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, object: PutObject) -> Result<StoredObject> {
        if self.should_fail(&object.destination)? {
            anyhow::bail!("simulated storage failure for {}", object.destination);
        }

        let file_size = object.content.len() as u64;
        let public_url = self.public_url(&object.destination);
        let stored = StoredObject {
            file_id: Some(uuid::Uuid::new_v4().to_string()),
            file_name: Some(object.file_name.clone()),
            public_url: Some(public_url),
            upload_path: Some(object.destination.clone()),
            file_size: Some(file_size),
            file_type: Some(object.content_type.clone()),
        };
        self.objects
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?
            .insert(
                object.destination,
                StoredEntry {
                    content: object.content,
                    content_type: object.content_type,
                    is_manifest: object.is_manifest,
                },
            );
        Ok(stored)
    }

    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let objects = self
            .objects
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        Ok(objects.get(path).map(|entry| entry.content.clone()))
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}
