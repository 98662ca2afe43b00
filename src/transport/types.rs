//! Wire types for the generation transports.

use serde::{Deserialize, Serialize};

/// Body sent to adapters and proxies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub prompt: String,
    /// `javascript`, `html` or `css`.
    pub output_type: String,
}

/// Normalized transport result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedCode {
    pub code: String,
}

impl GeneratedCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }
}

/// Proxy response. `code` is optional here so a missing field is reported as
/// a malformed response rather than a decode error.
#[derive(Debug, Deserialize)]
pub(crate) struct ProxyResponse {
    pub code: Option<String>,
}

// ============================================================
// Direct backend shapes
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectRequest {
    pub contents: Vec<DirectContent>,
}

impl DirectRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            contents: vec![DirectContent {
                parts: vec![DirectPart {
                    text: prompt.into(),
                }],
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectContent {
    #[serde(default)]
    pub parts: Vec<DirectPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectPart {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectResponse {
    #[serde(default)]
    pub candidates: Vec<DirectCandidate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectCandidate {
    pub content: Option<DirectContent>,
}

impl DirectResponse {
    /// Text of the first candidate's first content part.
    pub fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()
            .map(|part| part.text)
    }
}
