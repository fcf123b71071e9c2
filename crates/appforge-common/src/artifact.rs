use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ArtifactError {
    #[error("Generated source is empty")]
    Empty,
}

/// Source text of the single injectable UI component.
///
/// Consumed once by the workspace manager; the build toolchain is the only
/// judge of whether it actually compiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedArtifact {
    content: String,
}

impl GeneratedArtifact {
    pub fn new(content: impl Into<String>) -> Result<Self, ArtifactError> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(ArtifactError::Empty);
        }
        Ok(Self { content })
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn into_content(self) -> String {
        self.content
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_blank_source() {
        assert_eq!(GeneratedArtifact::new("  \n\t").unwrap_err(), ArtifactError::Empty);
    }

    #[test]
    fn test_keeps_source_verbatim() {
        let src = "export default function App() { return <div/>; }\n";
        let artifact = GeneratedArtifact::new(src).unwrap();
        assert_eq!(artifact.content(), src);
    }
}
