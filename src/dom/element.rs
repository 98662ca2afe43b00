use std::fmt::Write as _;

use super::Selector;

/// Elements rendered without a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    /// Text content, escaped on render.
    Text(String),
    /// Markup inserted verbatim, like assigning `innerHTML`.
    Html(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    tag: String,
    attrs: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_id(self, id: impl Into<String>) -> Self {
        self.with_attr("id", id)
    }

    pub fn with_class(self, class: impl Into<String>) -> Self {
        self.with_attr("class", class)
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.children.push(Node::Html(html.into()));
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attrs.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name, value)),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or_default().split_whitespace()
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn push(&mut self, node: Node) {
        self.children.push(node);
    }

    pub fn element_children(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }

    /// First element in document order (self included) matching `selector`,
    /// with `self` as the outermost ancestor combinators can see.
    pub fn find(&self, selector: &Selector) -> Option<&Element> {
        let path = self.path_to(selector)?;
        path.iter().try_fold(self, |el, &i| match el.children.get(i) {
            Some(Node::Element(child)) => Some(child),
            _ => None,
        })
    }

    pub fn find_mut(&mut self, selector: &Selector) -> Option<&mut Element> {
        let path = self.path_to(selector)?;
        path.iter().try_fold(self, |el, &i| match el.children.get_mut(i) {
            Some(Node::Element(child)) => Some(child),
            _ => None,
        })
    }

    /// Child indices leading from `self` to the first match.
    fn path_to(&self, selector: &Selector) -> Option<Vec<usize>> {
        let mut ancestors = Vec::new();
        let mut indices = Vec::new();
        self.search(selector, &mut ancestors, &mut indices)
            .then_some(indices)
    }

    fn search<'a>(
        &'a self,
        selector: &Selector,
        ancestors: &mut Vec<&'a Element>,
        indices: &mut Vec<usize>,
    ) -> bool {
        ancestors.push(self);
        if selector.matches_path(ancestors) {
            return true;
        }
        for (i, child) in self.children.iter().enumerate() {
            if let Node::Element(el) = child {
                indices.push(i);
                if el.search(selector, ancestors, indices) {
                    return true;
                }
                indices.pop();
            }
        }
        ancestors.pop();
        false
    }

    /// Descendants (not self) for which `pred` holds, in document order.
    pub fn descendants_where<'a>(&'a self, pred: &dyn Fn(&Element) -> bool, out: &mut Vec<&'a Element>) {
        for child in self.element_children() {
            if pred(child) {
                out.push(child);
            }
            child.descendants_where(pred, out);
        }
    }

    /// Remove every descendant for which `pred` holds. Returns how many were
    /// removed; matches nested inside a removed element are not counted.
    pub fn remove_where(&mut self, pred: &dyn Fn(&Element) -> bool) -> usize {
        let before = self.children.len();
        self.children.retain(|node| match node {
            Node::Element(el) => !pred(el),
            _ => true,
        });
        let mut removed = before - self.children.len();
        for child in &mut self.children {
            if let Node::Element(el) = child {
                removed += el.remove_where(pred);
            }
        }
        removed
    }

    pub fn inner_html(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            render_node(child, &mut out);
        }
        out
    }

    pub fn outer_html(&self) -> String {
        let mut out = String::new();
        render_element(self, &mut out);
        out
    }
}

fn render_node(node: &Node, out: &mut String) {
    match node {
        Node::Element(el) => render_element(el, out),
        Node::Text(text) => out.push_str(&escape(text, false)),
        Node::Html(html) => out.push_str(html),
    }
}

fn render_element(el: &Element, out: &mut String) {
    let _ = write!(out, "<{}", el.tag);
    for (name, value) in &el.attrs {
        let _ = write!(out, " {}=\"{}\"", name, escape(value, true));
    }
    out.push('>');
    if VOID_ELEMENTS.contains(&el.tag.as_str()) {
        return;
    }
    for child in &el.children {
        render_node(child, out);
    }
    let _ = write!(out, "</{}>", el.tag);
}

fn escape(s: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
