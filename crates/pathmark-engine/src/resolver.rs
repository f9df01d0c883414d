use crate::config::HighlightConfig;
use crate::dom::{Document, NodeId};
use crate::selector::{SelectorError, css, xpath};
use pathmark_common::record::{LocatorSet, ResolutionResult, Strategy};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, warn};

/// Finds stored locators in a live document and marks what it finds.
///
/// Failures never escape: an empty, malformed or unmatched locator is a
/// `found: false` result. An element's own inline border is remembered while
/// it is marked and put back by [`clear_highlights`](Self::clear_highlights).
pub struct Resolver {
    border: String,
    replaced: HashMap<NodeId, String>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(&HighlightConfig::default())
    }
}

impl Resolver {
    pub fn new(config: &HighlightConfig) -> Self {
        Self {
            border: config.border.clone(),
            replaced: HashMap::new(),
        }
    }

    /// Resolves one locator and marks the element when found. `elapsed_ms`
    /// covers the lookup only.
    pub fn resolve(
        &mut self,
        doc: &mut Document,
        strategy: Strategy,
        locator: &str,
    ) -> ResolutionResult {
        if locator.is_empty() {
            return ResolutionResult::not_attempted(strategy);
        }

        let start = Instant::now();
        let lookup = find(doc, strategy, locator);
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        let found = match lookup {
            Ok(Some(node)) => {
                self.mark(doc, node, strategy);
                true
            }
            Ok(None) => {
                debug!(%strategy, locator, "Locator matched nothing");
                false
            }
            Err(e) => {
                warn!(%strategy, locator, error = %e, "Malformed locator");
                false
            }
        };

        ResolutionResult {
            strategy,
            found,
            elapsed_ms,
        }
    }

    /// One result per strategy, in A, B, C order.
    pub fn resolve_all(
        &mut self,
        doc: &mut Document,
        locators: &LocatorSet,
    ) -> Vec<ResolutionResult> {
        Strategy::ALL
            .iter()
            .map(|strategy| self.resolve(doc, *strategy, locators.get(*strategy)))
            .collect()
    }

    /// Removes the marking border from every element carrying it, restoring
    /// any border the element had before. Other inline styles are left alone.
    /// Returns how many elements were cleared.
    pub fn clear_highlights(&mut self, doc: &mut Document) -> usize {
        let marked: Vec<NodeId> = doc
            .elements()
            .into_iter()
            .filter(|n| self.is_marked(doc, *n))
            .collect();
        for node in &marked {
            let cleared = match self.replaced.remove(node) {
                Some(previous) => doc.set_style_property(*node, "border", &previous),
                None => doc.remove_style_property(*node, "border"),
            };
            if let Err(e) = cleared {
                warn!(error = %e, "Failed to clear highlight");
            }
        }
        self.replaced.clear();
        marked.len()
    }

    pub fn is_marked(&self, doc: &Document, node: NodeId) -> bool {
        doc.style_property(node, "border").as_deref() == Some(self.border.as_str())
    }

    /// Drops remembered borders. Call when the document is replaced.
    pub fn forget(&mut self) {
        self.replaced.clear();
    }

    fn mark(&mut self, doc: &mut Document, node: NodeId, strategy: Strategy) {
        if let Some(previous) = doc.style_property(node, "border")
            && previous != self.border
        {
            self.replaced.entry(node).or_insert(previous);
        }
        if let Err(e) = doc.set_style_property(node, "border", &self.border) {
            warn!(%strategy, error = %e, "Failed to mark resolved element");
        }
    }
}

/// Side-effect free lookup: XPath for A, CSS for B and C. First match wins.
pub fn find(
    doc: &Document,
    strategy: Strategy,
    locator: &str,
) -> Result<Option<NodeId>, SelectorError> {
    match strategy {
        Strategy::A => xpath::first(doc, locator),
        Strategy::B | Strategy::C => css::query_selector(doc, locator),
    }
}
