//! Applies features to a [`Document`] and removes them again.
//!
//! Every injected element carries [`FEATURE_ATTR`] set to the feature id.
//! That attribute is the only record of what is applied: removal is a query
//! for the tag, not a lookup in a side table.

use thiserror::Error;

use crate::dom::{Document, DomError, Element, Selector};
use crate::models::{ArtifactType, Feature, FeatureId};

/// Attribute tagging injected elements with their feature id.
pub const FEATURE_ATTR: &str = "data-feature-id";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error("Target container not found.")]
    TargetNotFound(String),
}

impl From<DomError> for ExecutionError {
    fn from(e: DomError) -> Self {
        match e {
            DomError::TargetNotFound(sel) | DomError::InvalidSelector(sel) => {
                Self::TargetNotFound(sel)
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExecutionEngine {
    target: Option<Selector>,
}

impl ExecutionEngine {
    /// `target` of `None` appends markup to the document body.
    pub fn new(target: Option<Selector>) -> Self {
        Self { target }
    }

    pub fn target(&self) -> Option<&Selector> {
        self.target.as_ref()
    }

    /// Inject one feature. Exactly one tagged element is added on success.
    ///
    /// For scripts, insertion and execution are decoupled: the wrapper catches
    /// and logs anything the code throws, so a faulty script is still inserted.
    pub fn apply(&self, doc: &mut dyn Document, feature: &Feature) -> Result<(), ExecutionError> {
        let tag = feature.id.to_string();
        match feature.artifact_type {
            ArtifactType::Script => {
                let script = Element::new("script")
                    .with_attr(FEATURE_ATTR, tag)
                    .with_html(wrap_script(&feature.code));
                doc.append_to_head(script);
            }
            ArtifactType::Markup => {
                let container = Element::new("div")
                    .with_attr(FEATURE_ATTR, tag)
                    .with_html(feature.code.clone());
                doc.append_to(self.target.as_ref(), container)?;
            }
            ArtifactType::Stylesheet => {
                let style = Element::new("style")
                    .with_attr(FEATURE_ATTR, tag)
                    .with_html(feature.code.clone());
                doc.append_to_head(style);
            }
        }
        tracing::debug!("Applied {} feature {}", feature.artifact_type, feature.id);
        Ok(())
    }

    /// Remove every element tagged with `id`.
    pub fn remove(&self, doc: &mut dyn Document, id: FeatureId) -> usize {
        doc.remove_tagged(FEATURE_ATTR, Some(&id.to_string()))
    }

    /// Remove every tagged element.
    pub fn clear(&self, doc: &mut dyn Document) -> usize {
        doc.remove_tagged(FEATURE_ATTR, None)
    }

    pub fn is_applied(&self, doc: &dyn Document, id: FeatureId) -> bool {
        doc.count_tagged(FEATURE_ATTR, Some(&id.to_string())) > 0
    }
}

/// Self-invoking wrapper with a fault boundary.
pub fn wrap_script(code: &str) -> String {
    format!(
        "try {{ (function() {{ {} }})(); }} catch (e) {{ console.error('Genux Error:', e); }}",
        code
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::PageDocument;

    fn feature(id: i64, artifact_type: ArtifactType, code: &str) -> Feature {
        Feature {
            id: FeatureId(id),
            prompt: "test".to_string(),
            artifact_type,
            code: code.to_string(),
        }
    }

    #[test]
    fn wraps_scripts_in_fault_boundary() {
        assert_eq!(
            wrap_script("init();"),
            "try { (function() { init(); })(); } catch (e) { console.error('Genux Error:', e); }"
        );
    }

    #[test]
    fn script_goes_to_head() {
        let mut page = PageDocument::new();
        let engine = ExecutionEngine::default();
        engine
            .apply(&mut page, &feature(1, ArtifactType::Script, "init();"))
            .unwrap();

        let script = page.head().element_children().next().unwrap();
        assert_eq!(script.tag(), "script");
        assert_eq!(script.attr(FEATURE_ATTR), Some("1"));
        assert!(script.inner_html().contains("init();"));
    }

    #[test]
    fn stylesheet_goes_to_head() {
        let mut page = PageDocument::new();
        ExecutionEngine::default()
            .apply(&mut page, &feature(2, ArtifactType::Stylesheet, "a { color: purple; }"))
            .unwrap();
        assert_eq!(
            page.head().inner_html(),
            r#"<style data-feature-id="2">a { color: purple; }</style>"#
        );
    }

    #[test]
    fn markup_goes_to_body_by_default() {
        let mut page = PageDocument::new();
        ExecutionEngine::default()
            .apply(&mut page, &feature(3, ArtifactType::Markup, "<p>Hi</p>"))
            .unwrap();
        assert_eq!(
            page.body().inner_html(),
            r#"<div data-feature-id="3"><p>Hi</p></div>"#
        );
    }

    #[test]
    fn markup_without_target_aborts_without_inserting() {
        let mut page = PageDocument::new();
        let engine = ExecutionEngine::new(Some(Selector::parse("#app").unwrap()));
        let result = engine.apply(&mut page, &feature(4, ArtifactType::Markup, "<p>Hi</p>"));

        assert_eq!(result, Err(ExecutionError::TargetNotFound("#app".to_string())));
        assert_eq!(page.count_tagged(FEATURE_ATTR, None), 0);
    }

    #[test]
    fn scripts_ignore_missing_target() {
        let mut page = PageDocument::new();
        let engine = ExecutionEngine::new(Some(Selector::parse("#app").unwrap()));
        engine
            .apply(&mut page, &feature(5, ArtifactType::Script, "x();"))
            .unwrap();
        assert!(engine.is_applied(&page, FeatureId(5)));
    }

    #[test]
    fn remove_only_touches_matching_id() {
        let mut page = PageDocument::new();
        let engine = ExecutionEngine::default();
        engine.apply(&mut page, &feature(6, ArtifactType::Markup, "<p>a</p>")).unwrap();
        engine.apply(&mut page, &feature(7, ArtifactType::Stylesheet, "p{}")).unwrap();

        assert_eq!(engine.remove(&mut page, FeatureId(6)), 1);
        assert!(!engine.is_applied(&page, FeatureId(6)));
        assert!(engine.is_applied(&page, FeatureId(7)));
        assert_eq!(engine.clear(&mut page), 1);
    }
}
