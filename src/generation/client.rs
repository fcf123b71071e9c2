use std::time::Duration;

use anyhow::{Context, Result};
use appforge_common::{AppMetadata, GeneratedArtifact};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{Generator, parse_code, parse_metadata, prompts};
use crate::config::GenerationConfig;
use crate::util::truncate_chars;

/// Client for an OpenAI-compatible chat completions endpoint.
///
/// Cheap to clone; construct once and share.
#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatClient {
    pub fn new(config: &GenerationConfig, api_key: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build generation HTTP client")?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            api_key: api_key.to_string(),
        })
    }

    /// One system + user exchange; returns the reply text.
    pub async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };
        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Chat completion request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!(
                "Chat completion returned {}: {}",
                status.as_u16(),
                truncate_chars(text.trim(), 300)
            );
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .context("Chat completion response is not valid JSON")?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .context("Chat completion returned no content")
    }
}

#[async_trait]
impl Generator for ChatClient {
    async fn generate_code(&self, request: &str, prior_code: Option<&str>) -> Result<GeneratedArtifact> {
        let user = match prior_code {
            Some(code) => prompts::edit_code_prompt(request, code),
            None => prompts::code_prompt(request),
        };
        let reply = self.complete(prompts::CODE_SYSTEM, &user).await?;
        tracing::debug!(chars = reply.len(), "Received component source");
        parse_code(&reply)
    }

    async fn generate_metadata(&self, request: &str, prior: Option<&AppMetadata>) -> Result<AppMetadata> {
        let user = match prior {
            Some(prior) => prompts::edit_metadata_prompt(request, prior),
            None => prompts::metadata_prompt(request),
        };
        let reply = self.complete(prompts::METADATA_SYSTEM, &user).await?;
        parse_metadata(&reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::StatusCode, response::IntoResponse, routing::post};
    use serde_json::{Value, json};

    async fn completions(Json(body): Json<Value>) -> impl IntoResponse {
        let system = body["messages"][0]["content"].as_str().unwrap_or_default();
        let content = if system.contains("app_jsx") {
            json!({"app_jsx": "export default function App() { return <p>tip</p>; }"}).to_string()
        } else {
            json!({
                "name": "Tip Calculator",
                "description": "Split the bill",
                "category": "Utilities",
                "tags": ["Money", "Dining", "Math"],
                "app_icon": "💸"
            })
            .to_string()
        };
        Json(json!({"choices": [{"message": {"role": "assistant", "content": content}}]}))
    }

    async fn unavailable() -> impl IntoResponse {
        (StatusCode::SERVICE_UNAVAILABLE, "upstream overloaded")
    }

    async fn client_for(route: &'static str) -> ChatClient {
        let app = Router::new()
            .route("/ok/chat/completions", post(completions))
            .route("/down/chat/completions", post(unavailable));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        let config = GenerationConfig {
            base_url: format!("http://{}/{}", addr, route),
            ..GenerationConfig::default()
        };
        ChatClient::new(&config, "sk-test").unwrap()
    }

    #[tokio::test]
    async fn test_generate_code_and_metadata() {
        let client = client_for("ok").await;
        let code = client.generate_code("a tip calculator", None).await.unwrap();
        assert!(code.content().contains("<p>tip</p>"));

        let meta = client.generate_metadata("a tip calculator", None).await.unwrap();
        assert_eq!(meta.tags.len(), 3);
        assert_eq!(meta.icon.as_deref(), Some("💸"));
    }

    #[tokio::test]
    async fn test_http_error_is_reported() {
        let client = client_for("down").await;
        let err = client.generate_code("anything", None).await.unwrap_err();
        let msg = format!("{:#}", err);
        assert!(msg.contains("503"), "got: {}", msg);
        assert!(msg.contains("upstream overloaded"));
    }
}
