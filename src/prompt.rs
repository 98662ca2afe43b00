//! Builds the instruction text sent to the generation backend.

use crate::error::ValidationError;
use crate::models::ArtifactType;

/// User request text, trimmed and known to be non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptText(String);

impl PromptText {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyPrompt);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Everything the compiler embeds into the instruction.
#[derive(Debug, Clone, Copy)]
pub struct PromptInput<'a> {
    pub prompt: &'a PromptText,
    pub artifact_type: ArtifactType,
    /// Outline of the target region, as produced by
    /// [`crate::dom::Document::structure`].
    pub structure: &'a str,
    /// Raw markup of the target region.
    pub region_markup: &'a str,
}

/// Compile the full instruction for one generation request.
pub fn compile(input: &PromptInput<'_>) -> String {
    let kind = input.artifact_type.output_label().to_uppercase();
    format!(
        "You are an expert web developer. Generate {kind} code for a webpage feature based on the user's request.\n\
         Rules:\n\
         1. Output only clean {kind} code, no markdown or explanations.\n\
         2. Ensure code is self-contained and idempotent.\n\
         3. For JavaScript, avoid global scope pollution.\n\
         4. For HTML/CSS, ensure WCAG 2.1 accessibility compliance.\n\
         5. Use modern standards (ES6+ for JS, CSS3 for CSS).\n\
         DOM Structure: {structure}\n\
         User Request: {request}\n\
         Site Code: {site}\n",
        structure = input.structure,
        request = input.prompt.as_str(),
        site = input.region_markup,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt(text: &str) -> PromptText {
        PromptText::parse(text).unwrap()
    }

    #[test]
    fn rejects_blank_prompts() {
        assert_eq!(PromptText::parse(""), Err(ValidationError::EmptyPrompt));
        assert_eq!(PromptText::parse(" \n\t "), Err(ValidationError::EmptyPrompt));
    }

    #[test]
    fn trims_prompt_text() {
        assert_eq!(prompt("  add a footer \n").as_str(), "add a footer");
    }

    #[test]
    fn embeds_every_section() {
        let text = prompt("add a dark mode toggle");
        let compiled = compile(&PromptInput {
            prompt: &text,
            artifact_type: ArtifactType::Markup,
            structure: "Page DOM Structure:\n- <main id=\"app\">\n",
            region_markup: "<h1>Hello</h1>",
        });

        assert!(compiled.starts_with("You are an expert web developer. Generate HTML code"));
        assert!(compiled.contains("1. Output only clean HTML code"));
        assert!(compiled.contains("5. Use modern standards"));
        assert!(compiled.contains("- <main id=\"app\">"));
        assert!(compiled.contains("User Request: add a dark mode toggle"));
        assert!(compiled.contains("Site Code: <h1>Hello</h1>"));
    }

    #[test]
    fn is_deterministic() {
        let text = prompt("make links purple");
        let input = PromptInput {
            prompt: &text,
            artifact_type: ArtifactType::Stylesheet,
            structure: "",
            region_markup: "",
        };
        assert_eq!(compile(&input), compile(&input));
        assert!(compile(&input).contains("Generate CSS code"));
    }
}
