//! Locator generation.
//!
//! Three independent strategies are derived for every captured element:
//!
//! - **A**: an ID-first absolute path, evaluated as XPath
//!   (`//*[@id="x"]`, or `/html/body/div[2][@name="q"]/...`).
//! - **B**: a structural CSS path joined with child combinators
//!   (`html > body > div.row > span:nth-child(2)`), anchored at the nearest
//!   `#id`.
//! - **C**: a single-step CSS selector: `#id`, `[name="v"]`, `.class` or the
//!   bare tag.
//!
//! A strategy that cannot produce a path yields an empty string; nothing here
//! returns an error or touches the document.

use crate::config::CaptureConfig;
use crate::dom::{Document, NodeId};
use crate::selector::{css, xpath};
use pathmark_common::record::{CapturedElement, ElementMetadata, LocatorSet, SelectOption};
use tracing::debug;

pub struct LocatorGenerator {
    label_max_chars: usize,
}

impl Default for LocatorGenerator {
    fn default() -> Self {
        Self::new(&CaptureConfig::default())
    }
}

impl LocatorGenerator {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            label_max_chars: config.label_max_chars,
        }
    }

    /// Locators plus metadata for `node`. The record id is left empty for the
    /// caller to assign.
    pub fn generate(&self, doc: &Document, node: NodeId) -> CapturedElement {
        CapturedElement {
            id: String::new(),
            locators: self.locators(doc, node),
            metadata: self.describe(doc, node),
        }
    }

    pub fn locators(&self, doc: &Document, node: NodeId) -> LocatorSet {
        let locators = LocatorSet {
            locator_a: absolute_path(doc, node),
            locator_b: structural_path(doc, node),
            locator_c: short_selector(doc, node),
        };
        if locators.is_partial() {
            debug!(?node, ?locators, "Locator generation partially failed");
        }
        locators
    }

    pub fn describe(&self, doc: &Document, node: NodeId) -> ElementMetadata {
        let Some(tag) = doc.tag_name(node) else {
            return ElementMetadata::default();
        };

        let select_options = (tag == "select").then(|| {
            doc.descendants(node)
                .into_iter()
                .filter(|n| doc.tag_name(*n) == Some("option"))
                .map(|option| SelectOption {
                    text: collapse_whitespace(&doc.text_content(option)),
                    value: doc.value(option),
                })
                .collect()
        });

        ElementMetadata {
            tag: tag.to_string(),
            attributes: doc.attributes(node).iter().cloned().collect(),
            element_type: element_type(doc, node),
            select_options,
            value: doc.value(node),
            label: self.label(doc, node),
            bounding_box: doc.rect(node),
            outer_markup: doc.outer_html(node),
        }
    }

    /// First non-empty of: name attribute, id, leading text content.
    fn label(&self, doc: &Document, node: NodeId) -> String {
        if let Some(name) = doc.non_empty_attribute(node, "name") {
            return name.to_string();
        }
        if let Some(id) = doc.non_empty_attribute(node, "id") {
            return id.to_string();
        }
        doc.text_content(node)
            .trim()
            .chars()
            .take(self.label_max_chars)
            .collect()
    }
}

/// Locator A. `//*[@id="x"]` when the element has an id; otherwise one step
/// per ancestor up to the document root, anchored at the nearest ancestor
/// with an id.
pub fn absolute_path(doc: &Document, node: NodeId) -> String {
    if !doc.is_element(node) {
        return String::new();
    }
    if let Some(id) = doc.non_empty_attribute(node, "id") {
        return id_step(id);
    }

    let mut steps = Vec::new();
    let mut anchor = None;
    let mut current = node;
    loop {
        if current != node
            && let Some(id) = doc.non_empty_attribute(current, "id")
        {
            anchor = Some(id_step(id));
            break;
        }
        steps.push(xpath_step(doc, current));
        match doc.parent(current) {
            Some(parent) if parent == doc.root() => break,
            Some(parent) => current = parent,
            None => return String::new(),
        }
    }

    steps.reverse();
    let path = format!("/{}", steps.join("/"));
    match anchor {
        Some(anchor) => format!("{}{}", anchor, path),
        None => path,
    }
}

fn id_step(id: &str) -> String {
    format!("//*[@id={}]", xpath::literal(id))
}

fn xpath_step(doc: &Document, node: NodeId) -> String {
    let tag = doc.tag_name(node).unwrap_or("*");
    let mut step = tag.to_string();
    if let Some(index) = same_tag_index(doc, node) {
        step.push_str(&format!("[{}]", index));
    }
    if let Some(name) = doc.non_empty_attribute(node, "name") {
        step.push_str(&format!("[@name={}]", xpath::literal(name)));
    } else if let Some(class) = doc.class_tokens(node).first() {
        step.push_str(&format!("[contains(@class, {})]", xpath::literal(class)));
    }
    step
}

/// Locator B. Steps joined with ` > ` from `html` down, or from the nearest
/// `#id` (inclusive) when there is one.
pub fn structural_path(doc: &Document, node: NodeId) -> String {
    if !doc.is_element(node) {
        return String::new();
    }

    let mut steps = Vec::new();
    let mut current = node;
    loop {
        if let Some(id) = doc.non_empty_attribute(current, "id") {
            steps.push(format!("#{}", css::escape_identifier(id)));
            break;
        }
        steps.push(css_step(doc, current));
        match doc.parent(current) {
            Some(parent) if parent == doc.root() => break,
            Some(parent) => current = parent,
            None => return String::new(),
        }
    }

    steps.reverse();
    steps.join(" > ")
}

fn css_step(doc: &Document, node: NodeId) -> String {
    let mut step = doc.tag_name(node).unwrap_or("*").to_string();
    if let Some(name) = doc.non_empty_attribute(node, "name") {
        step.push_str(&format!("[name={}]", css::quote_string(name)));
    } else if let Some(class) = doc.class_tokens(node).first() {
        step.push('.');
        step.push_str(&css::escape_identifier(class));
    }
    if same_tag_index(doc, node).is_some()
        && let Some(index) = element_index(doc, node)
    {
        step.push_str(&format!(":nth-child({})", index));
    }
    step
}

/// Locator C.
pub fn short_selector(doc: &Document, node: NodeId) -> String {
    let Some(tag) = doc.tag_name(node) else {
        return String::new();
    };
    if let Some(id) = doc.non_empty_attribute(node, "id") {
        format!("#{}", css::escape_identifier(id))
    } else if let Some(name) = doc.non_empty_attribute(node, "name") {
        format!("[name={}]", css::quote_string(name))
    } else if let Some(class) = doc.class_tokens(node).first() {
        format!(".{}", css::escape_identifier(class))
    } else {
        tag.to_string()
    }
}

/// 1-based index among same-tag element siblings, only when the element has
/// at least one same-tag sibling.
fn same_tag_index(doc: &Document, node: NodeId) -> Option<usize> {
    let parent = doc.parent(node)?;
    let tag = doc.tag_name(node)?;
    let same: Vec<NodeId> = doc
        .element_children(parent)
        .into_iter()
        .filter(|s| doc.tag_name(*s) == Some(tag))
        .collect();
    if same.len() < 2 {
        return None;
    }
    same.iter().position(|s| *s == node).map(|i| i + 1)
}

/// 1-based index among all element siblings.
fn element_index(doc: &Document, node: NodeId) -> Option<usize> {
    let parent = doc.parent(node)?;
    doc.element_children(parent)
        .iter()
        .position(|s| *s == node)
        .map(|i| i + 1)
}

fn element_type(doc: &Document, node: NodeId) -> String {
    let tag = doc.tag_name(node).unwrap_or_default();
    let declared = doc
        .non_empty_attribute(node, "type")
        .map(|t| t.trim().to_ascii_lowercase());
    match tag {
        "input" => declared.unwrap_or_else(|| "text".to_string()),
        "button" => declared.unwrap_or_else(|| "submit".to_string()),
        "select" if doc.attribute(node, "multiple").is_some() => "select-multiple".to_string(),
        "select" => "select-one".to_string(),
        "textarea" => "textarea".to_string(),
        "span" => "button".to_string(),
        "a" if doc.attribute(node, "href").is_some() => "link".to_string(),
        _ if doc
            .attribute(node, "role")
            .is_some_and(|r| r.eq_ignore_ascii_case("button")) =>
        {
            "button".to_string()
        }
        _ => "unknown".to_string(),
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
