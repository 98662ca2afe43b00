use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Identity of a stored feature.
///
/// Ids are milliseconds since the Unix epoch at creation time. Two features
/// created within the same millisecond would collide, so [`FeatureId::generate`]
/// hands out strictly increasing values within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureId(pub i64);

static LAST_ID: AtomicI64 = AtomicI64::new(0);

impl FeatureId {
    /// Allocate a new id from the current time.
    pub fn generate() -> Self {
        let now = Utc::now().timestamp_millis();
        let mut last = LAST_ID.load(Ordering::Relaxed);
        loop {
            let next = now.max(last + 1);
            match LAST_ID.compare_exchange_weak(last, next, Ordering::Relaxed, Ordering::Relaxed) {
                Ok(_) => return Self(next),
                Err(observed) => last = observed,
            }
        }
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for FeatureId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// The kind of code a feature carries.
///
/// - `Script`: executed in the page inside a self-invoking wrapper
/// - `Markup`: appended to the target container
/// - `Stylesheet`: added to the document head as a style element
///
/// Stored records use `script`/`markup`/`stylesheet`. The older
/// `javascript`/`html`/`css` labels are accepted on read.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactType {
    #[serde(alias = "javascript", alias = "js")]
    #[value(alias = "javascript")]
    Script,
    #[serde(alias = "html")]
    #[value(alias = "html")]
    Markup,
    #[serde(alias = "css")]
    #[value(alias = "css")]
    Stylesheet,
}

impl ArtifactType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Markup => "markup",
            Self::Stylesheet => "stylesheet",
        }
    }

    /// Label sent to generation backends as `outputType`.
    pub fn output_label(&self) -> &'static str {
        match self {
            Self::Script => "javascript",
            Self::Markup => "html",
            Self::Stylesheet => "css",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "script" | "javascript" | "js" => Some(Self::Script),
            "markup" | "html" => Some(Self::Markup),
            "stylesheet" | "css" => Some(Self::Stylesheet),
            _ => None,
        }
    }
}

impl fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A generated UI feature: the request that produced it and the code to apply.
///
/// `code` is always the sanitized body. Features are never mutated in place;
/// editing one removes it and creates a replacement with a fresh id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub id: FeatureId,
    pub prompt: String,
    #[serde(rename = "type")]
    pub artifact_type: ArtifactType,
    pub code: String,
}

impl Feature {
    /// Build a feature with a freshly generated id.
    pub fn new(prompt: impl Into<String>, artifact_type: ArtifactType, code: impl Into<String>) -> Self {
        Self {
            id: FeatureId::generate(),
            prompt: prompt.into(),
            artifact_type,
            code: code.into(),
        }
    }
}

/// Input for adding a feature programmatically.
///
/// `id` is optional; when omitted a new one is generated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFeature {
    #[serde(default)]
    pub id: Option<FeatureId>,
    pub prompt: String,
    #[serde(rename = "type")]
    pub artifact_type: ArtifactType,
    pub code: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_strictly_increase() {
        let ids: Vec<FeatureId> = (0..100).map(|_| FeatureId::generate()).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn feature_serializes_type_field() {
        let feature = Feature {
            id: FeatureId(42),
            prompt: "add a footer".to_string(),
            artifact_type: ArtifactType::Markup,
            code: "<footer></footer>".to_string(),
        };
        let json = serde_json::to_value(&feature).unwrap();
        assert_eq!(json["id"], 42);
        assert_eq!(json["type"], "markup");
    }

    #[test]
    fn legacy_type_labels_are_accepted() {
        let json = r#"{"id": 7, "prompt": "p", "type": "javascript", "code": "x()"}"#;
        let feature: Feature = serde_json::from_str(json).unwrap();
        assert_eq!(feature.artifact_type, ArtifactType::Script);

        assert_eq!(ArtifactType::from_str("CSS"), Some(ArtifactType::Stylesheet));
        assert_eq!(ArtifactType::from_str("svg"), None);
    }

    #[test]
    fn output_labels_match_backend_vocabulary() {
        assert_eq!(ArtifactType::Script.output_label(), "javascript");
        assert_eq!(ArtifactType::Markup.output_label(), "html");
        assert_eq!(ArtifactType::Stylesheet.output_label(), "css");
    }
}
