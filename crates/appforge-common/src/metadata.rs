use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of tags every app carries.
pub const TAG_COUNT: usize = 3;

#[derive(Debug, Error, PartialEq)]
pub enum MetadataError {
    #[error("Metadata field '{0}' is empty")]
    MissingField(&'static str),

    #[error("Expected exactly {expected} tags, got {actual}")]
    TagCount { expected: usize, actual: usize },
}

/// Descriptive record of a generated app as shown in the catalog.
///
/// Replaced wholesale on edit; there is no field-level merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppMetadata {
    pub name: String,
    pub description: String,
    pub category: String,
    pub tags: Vec<String>,
    /// Symbol or emoji representing the app. The model emits it as `app_icon`.
    #[serde(default, alias = "app_icon", skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl AppMetadata {
    pub fn validate(&self) -> Result<(), MetadataError> {
        if self.name.trim().is_empty() {
            return Err(MetadataError::MissingField("name"));
        }
        if self.description.trim().is_empty() {
            return Err(MetadataError::MissingField("description"));
        }
        if self.category.trim().is_empty() {
            return Err(MetadataError::MissingField("category"));
        }
        if self.tags.len() != TAG_COUNT {
            return Err(MetadataError::TagCount {
                expected: TAG_COUNT,
                actual: self.tags.len(),
            });
        }
        if self.tags.iter().any(|t| t.trim().is_empty()) {
            return Err(MetadataError::MissingField("tags"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AppMetadata {
        AppMetadata {
            name: "Tip Calculator".to_string(),
            description: "Split the bill".to_string(),
            category: "Utilities".to_string(),
            tags: vec!["Money".into(), "Dining".into(), "Math".into()],
            icon: Some("💸".to_string()),
        }
    }

    #[test]
    fn test_valid_metadata_passes() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_icon_is_optional() {
        let mut meta = sample();
        meta.icon = None;
        assert!(meta.validate().is_ok());
    }

    #[test]
    fn test_wrong_tag_count_is_rejected() {
        let mut meta = sample();
        meta.tags.pop();
        assert_eq!(
            meta.validate(),
            Err(MetadataError::TagCount { expected: 3, actual: 2 })
        );
    }

    #[test]
    fn test_blank_category_is_rejected() {
        let mut meta = sample();
        meta.category = " ".to_string();
        assert_eq!(meta.validate(), Err(MetadataError::MissingField("category")));
    }

    #[test]
    fn test_accepts_model_field_name_for_icon() {
        let json = r#"{
            "name": "Weather",
            "description": "Local forecast",
            "category": "Utilities",
            "tags": ["Weather", "Forecast", "Location"],
            "app_icon": "🌦"
        }"#;
        let meta: AppMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta.icon.as_deref(), Some("🌦"));
    }
}
