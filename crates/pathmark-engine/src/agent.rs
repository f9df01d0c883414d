//! Page agent: the part that lives inside a tab.
//!
//! It owns the tab's document, captures alt-clicked elements while capture is
//! on, resolves highlight requests, and drives the change feed.

use crate::config::PathmarkConfig;
use crate::dom::{Document, NodeId};
use crate::generator::LocatorGenerator;
use crate::messaging::MessageSink;
use crate::observer::ChangeFeed;
use crate::resolver::Resolver;
use crate::session::CaptureSession;
use pathmark_common::protocol::{Notification, PageRequest, TabId};
use pathmark_common::record::{CapturedElement, ResolutionResult, derive_record_id};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClickModifiers {
    pub alt: bool,
}

impl ClickModifiers {
    pub fn alt() -> Self {
        Self { alt: true }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AgentReply {
    Ack,
    Resolved(Vec<ResolutionResult>),
    Cleared(usize),
}

pub struct PageAgent<S: MessageSink> {
    tab_id: TabId,
    url: String,
    doc: Document,
    session: CaptureSession,
    generator: LocatorGenerator,
    resolver: Resolver,
    feed: ChangeFeed,
    sink: S,
}

impl<S: MessageSink> PageAgent<S> {
    pub fn new(
        tab_id: TabId,
        url: impl Into<String>,
        doc: Document,
        config: &PathmarkConfig,
        sink: S,
    ) -> Self {
        Self {
            tab_id,
            url: url.into(),
            doc,
            session: CaptureSession::new(),
            generator: LocatorGenerator::new(&config.capture),
            resolver: Resolver::new(&config.highlight),
            feed: ChangeFeed::new(),
            sink,
        }
    }

    pub fn tab_id(&self) -> TabId {
        self.tab_id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Mutable access for the host page; changes show up on the next
    /// [`pump_mutations`](Self::pump_mutations).
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    pub fn is_capturing(&self) -> bool {
        self.session.is_active()
    }

    pub fn is_observing(&self) -> bool {
        self.feed.is_running()
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn handle(&mut self, request: PageRequest) -> AgentReply {
        match request {
            PageRequest::ToggleCapture { enabled, tab_id } => {
                self.session.toggle(enabled, tab_id.unwrap_or(self.tab_id));
                if self.session.is_active() {
                    self.feed.start(&mut self.doc);
                } else {
                    self.feed.stop(&mut self.doc);
                }
                AgentReply::Ack
            }
            PageRequest::Highlight { locators } => {
                let results = self.resolver.resolve_all(&mut self.doc, &locators);
                debug!(?results, "Highlight resolved");
                self.sink.notify(Notification::UpdateStats {
                    locator_a: locators.locator_a,
                    results: results.clone(),
                });
                AgentReply::Resolved(results)
            }
            PageRequest::ClearHighlights => {
                AgentReply::Cleared(self.resolver.clear_highlights(&mut self.doc))
            }
        }
    }

    /// Captures `node` when capture is on and Alt is held. The capture is
    /// relayed and becomes the element tracked for drift.
    pub fn on_click(&mut self, node: NodeId, modifiers: ClickModifiers) -> Option<CapturedElement> {
        if !self.session.is_active() || !modifiers.alt || !self.doc.is_element(node) {
            return None;
        }

        let mut captured = self.generator.generate(&self.doc, node);
        captured.id = derive_record_id(&self.url, &captured.locators.locator_a);
        info!(id = %captured.id, tag = %captured.metadata.tag, "Element captured");

        self.feed.track(node, captured.id.clone(), self.url.clone());
        self.sink.notify(Notification::RelayData {
            data: captured.clone(),
            url: self.url.clone(),
        });
        Some(captured)
    }

    /// Delivers one batch of document changes. Returns the number of
    /// notifications sent.
    pub fn pump_mutations(&mut self) -> usize {
        let notifications = self.feed.poll(&mut self.doc, &self.generator);
        let sent = notifications.len();
        for notification in notifications {
            self.sink.notify(notification);
        }
        sent
    }

    /// A new page load replaces the document and resets capture.
    pub fn navigate(&mut self, url: impl Into<String>, doc: Document) {
        self.feed.stop(&mut self.doc);
        self.feed = ChangeFeed::new();
        self.session = CaptureSession::new();
        self.resolver.forget();
        self.url = url.into();
        self.doc = doc;
        debug!(url = %self.url, "Page agent navigated");
    }
}
