//! The live document features are applied to.
//!
//! [`Document`] is the seam between Genux and whatever hosts the page: the
//! engine only needs to append elements, find a target region and remove
//! tagged elements. [`PageDocument`] is the in-process implementation used by
//! the CLI (which renders it to HTML) and by tests.

mod element;

use std::iter::Peekable;
use std::str::Chars;

use thiserror::Error;

pub use element::{Element, Node};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomError {
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Target container not found: {0}")]
    TargetNotFound(String),
}

/// A CSS selector as far as target containers need one.
///
/// Compound parts (`tag`, `*`, `#id`, `.class`, `[attr]`, `[attr=value]`)
/// joined by descendant (whitespace) and child (`>`) combinators, e.g.
/// `#app`, `div.content`, `main > section[data-slot="features"]`.
/// Matching is anchored at the element `find` starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    compounds: Vec<Compound>,
    /// `combinators[i]` joins `compounds[i]` and `compounds[i + 1]`.
    combinators: Vec<Combinator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    universal: bool,
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
}

impl Compound {
    fn is_empty(&self) -> bool {
        !self.universal
            && self.tag.is_none()
            && self.id.is_none()
            && self.classes.is_empty()
            && self.attrs.is_empty()
    }

    /// Consume one simple selector. `None` on malformed input.
    fn parse_simple(&mut self, chars: &mut Peekable<Chars<'_>>) -> Option<()> {
        match *chars.peek()? {
            '#' => {
                chars.next();
                if self.id.is_some() {
                    return None;
                }
                self.id = Some(ident(chars)?);
            }
            '.' => {
                chars.next();
                self.classes.push(ident(chars)?);
            }
            '[' => {
                chars.next();
                self.attrs.push(attribute(chars)?);
            }
            '*' => {
                chars.next();
                if !self.is_empty() {
                    return None;
                }
                self.universal = true;
            }
            _ => {
                if !self.is_empty() {
                    return None;
                }
                self.tag = Some(ident(chars)?.to_ascii_lowercase());
            }
        }
        Some(())
    }

    fn matches(&self, el: &Element) -> bool {
        if self.tag.as_deref().is_some_and(|tag| el.tag() != tag) {
            return false;
        }
        if self.id.is_some() && el.id() != self.id.as_deref() {
            return false;
        }
        self.classes
            .iter()
            .all(|class| el.classes().any(|c| c == class))
            && self.attrs.iter().all(|(name, value)| match (el.attr(name), value) {
                (Some(actual), Some(expected)) => actual == expected,
                (Some(_), None) => true,
                (None, _) => false,
            })
    }
}

fn ident(chars: &mut Peekable<Chars<'_>>) -> Option<String> {
    let mut name = String::new();
    while let Some(&c) = chars.peek() {
        if !(c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            break;
        }
        name.push(c);
        chars.next();
    }
    (!name.is_empty()).then_some(name)
}

/// `name]`, `name=value]` or `name="value"]`, after the opening bracket.
fn attribute(chars: &mut Peekable<Chars<'_>>) -> Option<(String, Option<String>)> {
    let name = ident(chars)?.to_ascii_lowercase();
    match chars.next()? {
        ']' => Some((name, None)),
        '=' => {
            let value = match *chars.peek()? {
                quote @ ('"' | '\'') => {
                    chars.next();
                    let mut value = String::new();
                    loop {
                        match chars.next()? {
                            c if c == quote => break,
                            c => value.push(c),
                        }
                    }
                    value
                }
                _ => ident(chars)?,
            };
            (chars.next()? == ']').then_some((name, Some(value)))
        }
        _ => None,
    }
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self, DomError> {
        let source = input.trim();
        let invalid = || DomError::InvalidSelector(input.to_string());

        let mut chars = source.chars().peekable();
        let mut compounds = Vec::new();
        let mut combinators = Vec::new();
        let mut current = Compound::default();
        let mut pending: Option<Combinator> = None;

        while let Some(&c) = chars.peek() {
            match c {
                c if c.is_whitespace() => {
                    chars.next();
                    pending.get_or_insert(Combinator::Descendant);
                }
                '>' => {
                    chars.next();
                    if pending == Some(Combinator::Child) {
                        return Err(invalid());
                    }
                    pending = Some(Combinator::Child);
                }
                _ => {
                    if let Some(combinator) = pending.take() {
                        if current.is_empty() {
                            return Err(invalid());
                        }
                        compounds.push(std::mem::take(&mut current));
                        combinators.push(combinator);
                    }
                    current.parse_simple(&mut chars).ok_or_else(invalid)?;
                }
            }
        }
        // Input is trimmed, so a leftover combinator is a trailing `>`.
        if pending.is_some() || current.is_empty() {
            return Err(invalid());
        }
        compounds.push(current);

        Ok(Self {
            source: source.to_string(),
            compounds,
            combinators,
        })
    }

    /// A selector that never matches, for configured targets that do not
    /// parse. Applying markup to it reports the target as not found.
    pub fn unresolvable(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            compounds: Vec::new(),
            combinators: Vec::new(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the last element of `path` matches, given the elements above
    /// it (outermost first).
    pub fn matches_path(&self, path: &[&Element]) -> bool {
        match (self.compounds.len().checked_sub(1), path.len().checked_sub(1)) {
            (Some(ci), Some(pi)) => self.match_at(ci, pi, path),
            _ => false,
        }
    }

    fn match_at(&self, ci: usize, pi: usize, path: &[&Element]) -> bool {
        if !self.compounds[ci].matches(path[pi]) {
            return false;
        }
        if ci == 0 {
            return true;
        }
        match self.combinators[ci - 1] {
            Combinator::Child => pi > 0 && self.match_at(ci - 1, pi - 1, path),
            Combinator::Descendant => (0..pi).rev().any(|p| self.match_at(ci - 1, p, path)),
        }
    }
}

/// Operations Genux needs from the page.
///
/// `target` of `None` always means the document body.
pub trait Document: Send {
    fn append_to_head(&mut self, element: Element);

    /// Append under the first element matching `target`.
    fn append_to(&mut self, target: Option<&Selector>, element: Element) -> Result<(), DomError>;

    fn has_target(&self, target: Option<&Selector>) -> bool;

    /// Remove every element whose `attr` equals `value` (or carries `attr` at
    /// all when `value` is `None`). Returns how many were removed.
    fn remove_tagged(&mut self, attr: &str, value: Option<&str>) -> usize;

    fn count_tagged(&self, attr: &str, value: Option<&str>) -> usize;

    /// Outline of the region, one indented `- <tag id=".." class="..">` line
    /// per element. Elements whose id starts with `genux` are skipped along
    /// with their subtrees.
    fn structure(&self, target: Option<&Selector>) -> String;

    /// Inner markup of the region, `None` when the target does not resolve.
    fn inner_html(&self, target: Option<&Selector>) -> Option<String>;
}

/// In-memory page with a head and a body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageDocument {
    head: Element,
    body: Element,
}

impl Default for PageDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl PageDocument {
    pub fn new() -> Self {
        Self {
            head: Element::new("head"),
            body: Element::new("body"),
        }
    }

    /// A page whose body is `body` (the tag is forced to `body`).
    pub fn with_body(body: Element) -> Self {
        let mut page = Self::new();
        for node in body.children() {
            page.body.push(node.clone());
        }
        page
    }

    pub fn head(&self) -> &Element {
        &self.head
    }

    pub fn body(&self) -> &Element {
        &self.body
    }

    /// Elements tagged with `attr` (matching `value` when given), head first.
    pub fn tagged(&self, attr: &str, value: Option<&str>) -> Vec<&Element> {
        let pred = tag_predicate(attr, value);
        let mut out = Vec::new();
        self.head.descendants_where(&pred, &mut out);
        self.body.descendants_where(&pred, &mut out);
        out
    }

    fn region(&self, target: Option<&Selector>) -> Option<&Element> {
        match target {
            Some(selector) => self.body.find(selector),
            None => Some(&self.body),
        }
    }

    pub fn render(&self) -> String {
        format!(
            "<!DOCTYPE html><html>{}{}</html>",
            self.head.outer_html(),
            self.body.outer_html()
        )
    }
}

fn tag_predicate<'a>(attr: &'a str, value: Option<&'a str>) -> impl Fn(&Element) -> bool + 'a {
    move |el: &Element| match (el.attr(attr), value) {
        (Some(actual), Some(expected)) => actual == expected,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

impl Document for PageDocument {
    fn append_to_head(&mut self, element: Element) {
        self.head.push(Node::Element(element));
    }

    fn append_to(&mut self, target: Option<&Selector>, element: Element) -> Result<(), DomError> {
        let parent = match target {
            Some(selector) => self
                .body
                .find_mut(selector)
                .ok_or_else(|| DomError::TargetNotFound(selector.as_str().to_string()))?,
            None => &mut self.body,
        };
        parent.push(Node::Element(element));
        Ok(())
    }

    fn has_target(&self, target: Option<&Selector>) -> bool {
        self.region(target).is_some()
    }

    fn remove_tagged(&mut self, attr: &str, value: Option<&str>) -> usize {
        let pred = tag_predicate(attr, value);
        self.head.remove_where(&pred) + self.body.remove_where(&pred)
    }

    fn count_tagged(&self, attr: &str, value: Option<&str>) -> usize {
        self.tagged(attr, value).len()
    }

    fn structure(&self, target: Option<&Selector>) -> String {
        let mut out = String::from("Page DOM Structure:\n");
        if let Some(root) = self.region(target) {
            outline(root, 0, &mut out);
        }
        out
    }

    fn inner_html(&self, target: Option<&Selector>) -> Option<String> {
        self.region(target).map(Element::inner_html)
    }
}

fn outline(el: &Element, depth: usize, out: &mut String) {
    if el.id().is_some_and(|id| id.starts_with("genux")) {
        return;
    }
    out.push_str(&"  ".repeat(depth));
    out.push_str("- <");
    out.push_str(el.tag());
    if let Some(id) = el.id().filter(|id| !id.is_empty()) {
        out.push_str(&format!(" id=\"{}\"", id));
    }
    if let Some(class) = el.attr("class").filter(|c| !c.is_empty()) {
        out.push_str(&format!(" class=\"{}\"", class));
    }
    out.push_str(">\n");
    for child in el.element_children() {
        outline(child, depth + 1, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_page() -> PageDocument {
        PageDocument::with_body(
            Element::new("body")
                .with_child(
                    Element::new("header")
                        .with_class("top bar")
                        .with_child(Element::new("nav").with_id("menu")),
                )
                .with_child(Element::new("main").with_id("app").with_text("Hello"))
                .with_child(Element::new("div").with_id("genux-fab")),
        )
    }

    #[test]
    fn parses_compound_selectors() {
        let sel = Selector::parse("div#app.main.wide").unwrap();
        let compound = &sel.compounds[0];
        assert_eq!(compound.tag.as_deref(), Some("div"));
        assert_eq!(compound.id.as_deref(), Some("app"));
        assert_eq!(compound.classes, vec!["main", "wide"]);

        assert!(Selector::parse("#app").is_ok());
        assert!(Selector::parse(".card").is_ok());
        assert!(Selector::parse("*").is_ok());
        assert!(Selector::parse("").is_err());
        assert!(Selector::parse("#a#b").is_err());
        assert!(Selector::parse("div.").is_err());
        assert!(Selector::parse("div:hover").is_err());
    }

    #[test]
    fn parses_combinators_and_attributes() {
        let sel = Selector::parse("body  >  main section[data-slot=\"x y\"]").unwrap();
        assert_eq!(sel.compounds.len(), 3);
        assert_eq!(sel.combinators, vec![Combinator::Child, Combinator::Descendant]);
        assert_eq!(
            sel.compounds[2].attrs,
            vec![("data-slot".to_string(), Some("x y".to_string()))]
        );

        assert!(Selector::parse("[hidden]").is_ok());
        assert!(Selector::parse("a[href=top]").is_ok());
        assert!(Selector::parse("> main").is_err());
        assert!(Selector::parse("main >").is_err());
        assert!(Selector::parse("main > > p").is_err());
        assert!(Selector::parse("a[href").is_err());
    }

    #[test]
    fn matches_by_tag_id_and_class() {
        let page = sample_page();
        let header = Selector::parse("header.bar").unwrap();
        assert!(page.has_target(Some(&header)));
        assert!(!page.has_target(Some(&Selector::parse("header.missing").unwrap())));
        assert!(page.has_target(Some(&Selector::parse("#menu").unwrap())));
    }

    #[test]
    fn matches_descendant_and_child_combinators() {
        let page = sample_page();
        let found = |s: &str| page.has_target(Some(&Selector::parse(s).unwrap()));

        assert!(found("header nav"));
        assert!(found("body nav#menu"));
        assert!(found("header > #menu"));
        assert!(found("body > main"));
        assert!(!found("body > nav"));
        assert!(!found("main nav"));
        assert!(found("[id=app]"));
        assert!(!found("main[id=menu]"));
    }

    #[test]
    fn descendant_target_receives_appended_markup() {
        let mut page = PageDocument::with_body(
            Element::new("body").with_child(
                Element::new("div")
                    .with_id("app")
                    .with_child(Element::new("main").with_child(Element::new("section"))),
            ),
        );
        let target = Selector::parse("#app > main").unwrap();
        page.append_to(Some(&target), Element::new("p")).unwrap();
        assert_eq!(page.inner_html(Some(&target)).as_deref(), Some("<section></section><p></p>"));
    }

    #[test]
    fn unresolvable_selector_never_matches() {
        let mut page = sample_page();
        let target = Selector::unresolvable("main:has(nav)");
        assert!(!page.has_target(Some(&target)));
        assert_eq!(
            page.append_to(Some(&target), Element::new("p")),
            Err(DomError::TargetNotFound("main:has(nav)".to_string()))
        );
    }

    #[test]
    fn structure_outlines_region_and_skips_genux_nodes() {
        let page = sample_page();
        assert_eq!(
            page.structure(None),
            "Page DOM Structure:\n\
             - <body>\n  \
             - <header class=\"top bar\">\n    \
             - <nav id=\"menu\">\n  \
             - <main id=\"app\">\n"
        );

        let app = Selector::parse("#app").unwrap();
        assert_eq!(page.structure(Some(&app)), "Page DOM Structure:\n- <main id=\"app\">\n");
        let missing = Selector::parse("#nope").unwrap();
        assert_eq!(page.structure(Some(&missing)), "Page DOM Structure:\n");
    }

    #[test]
    fn inner_html_of_target() {
        let page = sample_page();
        let app = Selector::parse("#app").unwrap();
        assert_eq!(page.inner_html(Some(&app)).as_deref(), Some("Hello"));
        assert!(page.inner_html(Some(&Selector::parse("#nope").unwrap())).is_none());
    }

    #[test]
    fn append_to_missing_target_fails() {
        let mut page = sample_page();
        let missing = Selector::parse("#nope").unwrap();
        let result = page.append_to(Some(&missing), Element::new("div"));
        assert_eq!(result, Err(DomError::TargetNotFound("#nope".to_string())));
    }

    #[test]
    fn removes_tagged_elements_from_head_and_body() {
        let mut page = sample_page();
        page.append_to_head(Element::new("style").with_attr("data-feature-id", "1"));
        page.append_to(None, Element::new("div").with_attr("data-feature-id", "1"))
            .unwrap();
        page.append_to(None, Element::new("div").with_attr("data-feature-id", "2"))
            .unwrap();

        assert_eq!(page.count_tagged("data-feature-id", None), 3);
        assert_eq!(page.remove_tagged("data-feature-id", Some("1")), 2);
        assert_eq!(page.count_tagged("data-feature-id", None), 1);
        assert_eq!(page.remove_tagged("data-feature-id", Some("1")), 0);
    }

    #[test]
    fn renders_full_page() {
        let page = PageDocument::new();
        assert_eq!(
            page.render(),
            "<!DOCTYPE html><html><head></head><body></body></html>"
        );
    }
}
