//! The text-generation collaborator.
//!
//! The pipeline depends only on [`Generator`]: given a request (and, for an
//! edit, the previous code or listing) it returns a component or a listing,
//! or fails. [`ChatClient`] is the production implementation.

pub mod client;
pub mod prompts;

use anyhow::{Context, Result};
use appforge_common::{AppMetadata, GeneratedArtifact};
use async_trait::async_trait;
use serde::Deserialize;

use crate::util::{extract_fenced_code, extract_json_object};

pub use client::ChatClient;

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate_code(&self, request: &str, prior_code: Option<&str>) -> Result<GeneratedArtifact>;

    async fn generate_metadata(&self, request: &str, prior: Option<&AppMetadata>) -> Result<AppMetadata>;
}

#[derive(Deserialize)]
struct CodeReply {
    app_jsx: String,
}

/// Pull the component source out of a model reply.
///
/// The expected shape is `{"app_jsx": ".."}`. When no such object can be
/// read (JSX braces alone look like the start of one) the first fenced code
/// block is used instead.
pub fn parse_code(reply: &str) -> Result<GeneratedArtifact> {
    let from_json = extract_json_object(reply)
        .and_then(|json| serde_json::from_str::<CodeReply>(&json).ok())
        .map(|code| code.app_jsx);
    let source = match from_json {
        Some(source) => source,
        None => extract_fenced_code(reply)
            .context("Model reply contains neither an app_jsx object nor a code block")?,
    };
    GeneratedArtifact::new(source).context("Model returned empty source")
}

/// Pull the app listing out of a model reply and validate it.
pub fn parse_metadata(reply: &str) -> Result<AppMetadata> {
    let json = extract_json_object(reply).context("Model reply contains no JSON object")?;
    let metadata: AppMetadata =
        serde_json::from_str(&json).context("Model reply is not a valid app listing")?;
    metadata.validate().context("Model returned an incomplete app listing")?;
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_code_from_json_reply() {
        let reply = r#"```json
{"app_jsx": "export default function App() {\n  return <div>{'}'}</div>;\n}"}
```"#;
        let artifact = parse_code(reply).unwrap();
        assert!(artifact.content().starts_with("export default function App()"));
        assert!(artifact.content().contains('\n'));
    }

    #[test]
    fn test_parse_code_falls_back_to_code_block() {
        let reply = "Here you go:\n```jsx\nexport default function App() { return null; }\n```";
        let artifact = parse_code(reply).unwrap();
        assert_eq!(artifact.content(), "export default function App() { return null; }");
    }

    #[test]
    fn test_parse_code_falls_back_when_jsx_braces_are_not_json() {
        let reply = "```jsx\nimport { useState } from 'react';\n\nexport default function App() {\n  const [count, setCount] = useState(0);\n  return <button style={{ padding: 8 }} onClick={() => setCount(count + 1)}>{count}</button>;\n}\n```";
        let artifact = parse_code(reply).unwrap();
        assert!(artifact.content().starts_with("import { useState } from 'react';"));
        assert!(artifact.content().contains("style={{ padding: 8 }}"));
    }

    #[test]
    fn test_parse_code_rejects_object_without_app_jsx_and_no_block() {
        let err = parse_code(r#"{"code": "export default 1"}"#).unwrap_err();
        assert!(err.to_string().contains("neither an app_jsx object nor a code block"));
    }

    #[test]
    fn test_parse_code_rejects_empty_source() {
        assert!(parse_code(r#"{"app_jsx": "   "}"#).is_err());
    }

    #[test]
    fn test_parse_code_rejects_prose() {
        assert!(parse_code("I cannot help with that.").is_err());
    }

    #[test]
    fn test_parse_metadata() {
        let reply = r#"Sure! {"name": "Tip Calculator", "description": "Split the bill",
            "category": "Utilities", "tags": ["Money", "Dining", "Math"], "app_icon": "💸"}"#;
        let meta = parse_metadata(reply).unwrap();
        assert_eq!(meta.name, "Tip Calculator");
        assert_eq!(meta.icon.as_deref(), Some("💸"));
    }

    #[test]
    fn test_parse_metadata_requires_three_tags() {
        let reply = r#"{"name": "X", "description": "Y", "category": "Z", "tags": ["a"]}"#;
        let err = parse_metadata(reply).unwrap_err();
        assert!(format!("{:#}", err).contains("Expected exactly 3 tags"));
    }
}
