use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use super::{ObjectStore, PutObject, StoredObject};
use crate::config::StorageConfig;

/// Object storage reached through the hosted upload function.
///
/// Uploads are multipart posts authenticated with a bearer key; reads go to
/// the public object URL.
pub struct HttpObjectStore {
    client: reqwest::Client,
    upload_url: String,
    public_base: String,
    api_key: String,
    timeout: Duration,
}

impl HttpObjectStore {
    pub fn new(config: &StorageConfig, api_key: &str) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            anyhow::bail!("Storage base URL is not configured (set STORAGE_URL or [storage] base_url)");
        }
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build storage HTTP client")?;
        let base = config.base_url.trim_end_matches('/');
        Ok(Self {
            client,
            upload_url: format!("{}{}", base, config.upload_path),
            public_base: format!("{}{}", base, config.public_path.trim_end_matches('/')),
            api_key: api_key.to_string(),
            timeout,
        })
    }

    fn form_for(object: PutObject) -> Result<Form> {
        let label = if object.is_manifest {
            "Deployment Manifest"
        } else {
            "App File"
        };
        let part = Part::bytes(object.content)
            .file_name(object.file_name)
            .mime_str(&object.content_type)
            .with_context(|| format!("Invalid content type '{}'", object.content_type))?;
        let mut form = Form::new()
            .part("file", part)
            .text("name", label)
            .text("platform", object.platform)
            .text("deploymentId", object.deployment_id)
            .text("path", object.destination);
        if let Some(relative_path) = object.relative_path {
            form = form.text("relativePath", relative_path);
        }
        if object.is_manifest {
            form = form.text("isManifest", "true");
        }
        Ok(form)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put(&self, object: PutObject) -> Result<StoredObject> {
        let generic = if object.is_manifest {
            "Manifest upload failed"
        } else {
            "Upload failed"
        };
        let form = Self::form_for(object)?;

        let resp = match self
            .client
            .post(&self.upload_url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() => {
                anyhow::bail!("request timed out after {}s", self.timeout.as_secs())
            }
            Err(e) => return Err(anyhow::Error::new(e).context(generic)),
        };

        let status = resp.status();
        if !status.is_success() {
            let body = resp.bytes().await.unwrap_or_default();
            let message = serde_json::from_slice::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
                .unwrap_or_else(|| format!("{} (status {})", generic, status.as_u16()));
            anyhow::bail!(message);
        }

        resp.json::<StoredObject>()
            .await
            .context("Storage returned an unreadable upload response")
    }

    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let url = self.public_url(path);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = resp
            .error_for_status()
            .with_context(|| format!("Storage returned error status for {}", url))?;
        let bytes = resp
            .bytes()
            .await
            .with_context(|| format!("Failed to read body of {}", url))?;
        Ok(Some(bytes.to_vec()))
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base, path.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};

    use axum::{
        Json, Router,
        extract::{Multipart, State},
        http::{HeaderMap, StatusCode},
        response::IntoResponse,
        routing::{get, post},
    };
    use serde_json::json;

    #[derive(Clone, Default)]
    struct Received {
        fields: Arc<Mutex<Vec<(String, String)>>>,
        auth: Arc<Mutex<Option<String>>>,
    }

    async fn upload_ok(
        State(received): State<Received>,
        headers: HeaderMap,
        mut mp: Multipart,
    ) -> impl IntoResponse {
        *received.auth.lock().unwrap() = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let mut size = 0;
        while let Ok(Some(field)) = mp.next_field().await {
            let name = field.name().unwrap_or_default().to_string();
            if name == "file" {
                let ct = field.content_type().unwrap_or_default().to_string();
                size = field.bytes().await.unwrap().len();
                received.fields.lock().unwrap().push(("file.content_type".into(), ct));
            } else {
                let value = field.text().await.unwrap();
                received.fields.lock().unwrap().push((name, value));
            }
        }
        Json(json!({
            "fileId": "f-1",
            "publicUrl": "https://cdn.example/deployments/d1/index.html",
            "uploadPath": "deployments/d1/index.html",
            "fileSize": size,
            "fileType": "text/html"
        }))
    }

    async fn upload_rejected() -> impl IntoResponse {
        (StatusCode::BAD_REQUEST, Json(json!({"error": "bucket quota exceeded"})))
    }

    async fn upload_broken() -> impl IntoResponse {
        (StatusCode::INTERNAL_SERVER_ERROR, "boom")
    }

    async fn upload_slow() -> impl IntoResponse {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Json(json!({}))
    }

    async fn public_object() -> impl IntoResponse {
        "export default function App() {}"
    }

    async fn serve(received: Received) -> SocketAddr {
        let app = Router::new()
            .route("/ok", post(upload_ok))
            .route("/rejected", post(upload_rejected))
            .route("/broken", post(upload_broken))
            .route("/slow", post(upload_slow))
            .route("/public/deployments/d1/source/App.jsx", get(public_object))
            .with_state(received);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn store(addr: SocketAddr, upload_path: &str, timeout_secs: u64) -> HttpObjectStore {
        let config = StorageConfig {
            base_url: format!("http://{}", addr),
            upload_path: upload_path.to_string(),
            public_path: "/public".to_string(),
            timeout_secs,
            concurrency: 1,
        };
        HttpObjectStore::new(&config, "test-key").unwrap()
    }

    fn object(is_manifest: bool) -> PutObject {
        PutObject {
            content: b"<html></html>".to_vec(),
            destination: "deployments/d1/index.html".to_string(),
            content_type: "text/html".to_string(),
            file_name: "index.html".to_string(),
            deployment_id: "d1".to_string(),
            relative_path: Some("index.html".to_string()),
            platform: "web".to_string(),
            is_manifest,
        }
    }

    #[test]
    fn test_new_requires_base_url() {
        let config = StorageConfig::default();
        assert!(HttpObjectStore::new(&config, "k").is_err());
    }

    #[tokio::test]
    async fn test_put_sends_multipart_fields_and_bearer() {
        let received = Received::default();
        let addr = serve(received.clone()).await;
        let store = store(addr, "/ok", 5);

        let stored = store.put(object(false)).await.unwrap();
        assert_eq!(stored.file_id.as_deref(), Some("f-1"));
        assert_eq!(stored.file_size, Some(13));

        let fields = received.fields.lock().unwrap().clone();
        let get_field = |k: &str| fields.iter().find(|(n, _)| n == k).map(|(_, v)| v.clone());
        assert_eq!(get_field("deploymentId").as_deref(), Some("d1"));
        assert_eq!(get_field("relativePath").as_deref(), Some("index.html"));
        assert_eq!(get_field("platform").as_deref(), Some("web"));
        assert_eq!(get_field("file.content_type").as_deref(), Some("text/html"));
        assert!(get_field("isManifest").is_none());
        assert_eq!(received.auth.lock().unwrap().as_deref(), Some("Bearer test-key"));
    }

    #[tokio::test]
    async fn test_put_surfaces_server_error_message() {
        let addr = serve(Received::default()).await;
        let err = store(addr, "/rejected", 5).put(object(false)).await.unwrap_err();
        assert_eq!(err.to_string(), "bucket quota exceeded");
    }

    #[tokio::test]
    async fn test_put_falls_back_to_generic_message() {
        let addr = serve(Received::default()).await;
        let err = store(addr, "/broken", 5).put(object(true)).await.unwrap_err();
        assert_eq!(err.to_string(), "Manifest upload failed (status 500)");
    }

    #[tokio::test]
    async fn test_put_times_out() {
        let addr = serve(Received::default()).await;
        let err = store(addr, "/slow", 1).put(object(false)).await.unwrap_err();
        assert!(err.to_string().contains("timed out"), "got: {}", err);
    }

    #[tokio::test]
    async fn test_get_reads_public_object_and_maps_404() {
        let addr = serve(Received::default()).await;
        let store = store(addr, "/ok", 5);
        let body = store.get("deployments/d1/source/App.jsx").await.unwrap().unwrap();
        assert_eq!(body, b"export default function App() {}");
        assert!(store.get("deployments/missing/source/App.jsx").await.unwrap().is_none());
    }

    #[test]
    fn test_public_url_layout() {
        let config = StorageConfig {
            base_url: "https://proj.supabase.co/".to_string(),
            ..StorageConfig::default()
        };
        let store = HttpObjectStore::new(&config, "k").unwrap();
        assert_eq!(
            store.public_url("deployments/d1/"),
            "https://proj.supabase.co/storage/v1/object/public/apps/deployments/d1/"
        );
    }
}
