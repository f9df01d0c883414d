use crate::dom::{Document, MutationRecord, NodeId, ObserverId};
use crate::generator::LocatorGenerator;
use pathmark_common::protocol::{Notification, PathUpdate};
use tracing::debug;

/// Most recently captured element, kept for drift checks.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Tracked {
    node: NodeId,
    record_id: String,
    url: String,
}

/// Document subscription that regenerates locators for the last captured
/// element whenever the tree changes.
///
/// The subscription only exists between [`start`](Self::start) and
/// [`stop`](Self::stop); while stopped nothing is queued on the document.
#[derive(Debug, Default)]
pub struct ChangeFeed {
    observer: Option<ObserverId>,
    tracked: Option<Tracked>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, doc: &mut Document) {
        if self.observer.is_none() {
            self.observer = Some(doc.observe());
            debug!("Change feed started");
        }
    }

    pub fn stop(&mut self, doc: &mut Document) {
        if let Some(observer) = self.observer.take() {
            doc.disconnect(observer);
            debug!("Change feed stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.observer.is_some()
    }

    /// Replaces the element whose locators are refreshed on change.
    pub fn track(&mut self, node: NodeId, record_id: impl Into<String>, url: impl Into<String>) {
        self.tracked = Some(Tracked {
            node,
            record_id: record_id.into(),
            url: url.into(),
        });
    }

    /// Drains pending mutations. Returns nothing when the document did not
    /// change; otherwise `domChanged`, followed by `updatePaths` when the
    /// tracked element is still attached.
    ///
    /// Inline `style` changes are ignored so highlight marking does not count
    /// as drift.
    pub fn poll(&mut self, doc: &mut Document, generator: &LocatorGenerator) -> Vec<Notification> {
        let Some(observer) = self.observer else {
            return Vec::new();
        };
        let changed = doc
            .take_records(observer)
            .iter()
            .filter(|record| !is_style_change(record))
            .count();
        if changed == 0 {
            return Vec::new();
        }
        debug!(changed, "Document changed");

        let mut out = vec![Notification::DomChanged];
        if let Some(tracked) = &self.tracked
            && doc.is_connected(tracked.node)
        {
            out.push(Notification::UpdatePaths {
                data: PathUpdate {
                    record_id: tracked.record_id.clone(),
                    locators: generator.locators(doc, tracked.node),
                },
                url: tracked.url.clone(),
            });
        }
        out
    }
}

fn is_style_change(record: &MutationRecord) -> bool {
    matches!(record, MutationRecord::Attributes { name, .. } if name == "style")
}
