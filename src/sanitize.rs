//! Cleans generated code before it is stored or applied.
//!
//! Markup goes through an HTML allow-list: common structural, form and
//! semantic elements with safe attributes survive, while `<script>`, inline
//! event handlers and `javascript:` URLs are dropped. Scripts and stylesheets
//! are not markup, so they only get their closing-tag sequences neutralized
//! to keep them inside their host element.

use crate::models::ArtifactType;

/// Elements allowed in addition to ammonia's defaults.
const EXTRA_TAGS: &[&str] = &[
    "button", "fieldset", "form", "input", "label", "legend", "main", "meter", "option",
    "optgroup", "output", "progress", "section", "select", "textarea",
];

const EXTRA_ATTRIBUTES: &[&str] = &[
    "checked", "class", "disabled", "for", "hidden", "id", "max", "min", "name",
    "placeholder", "readonly", "role", "selected", "step", "tabindex", "type", "value",
];

/// Sanitize one transport result for the given artifact type.
pub fn sanitize(artifact_type: ArtifactType, raw: &str) -> String {
    let code = strip_code_fence(raw);
    match artifact_type {
        ArtifactType::Markup => sanitize_markup(code),
        ArtifactType::Script => neutralize_closing_tag(code, "script"),
        ArtifactType::Stylesheet => neutralize_closing_tag(code, "style"),
    }
}

pub fn sanitize_markup(markup: &str) -> String {
    let mut builder = ammonia::Builder::default();
    builder
        .add_tags(EXTRA_TAGS)
        .add_generic_attributes(EXTRA_ATTRIBUTES)
        .add_generic_attribute_prefixes(&["aria-"]);
    builder.clean(markup).to_string()
}

/// Unwrap a response that arrived as a single Markdown code block.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return raw;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return raw;
    };
    // Drop the language tag on the opening line.
    match body.split_once('\n') {
        Some((_lang, code)) => code.trim_end_matches('\n'),
        None => body,
    }
}

/// Escape `</tag` (any case) so the code cannot close its host element.
fn neutralize_closing_tag(code: &str, tag: &str) -> String {
    let needle = format!("</{}", tag);
    let lower = code.to_ascii_lowercase();
    if !lower.contains(&needle) {
        return code.to_string();
    }

    let mut out = String::with_capacity(code.len() + 8);
    let mut last = 0;
    for (idx, _) in lower.match_indices(&needle) {
        out.push_str(&code[last..idx]);
        out.push_str("<\\/");
        last = idx + 2;
    }
    out.push_str(&code[last..]);
    out
}
