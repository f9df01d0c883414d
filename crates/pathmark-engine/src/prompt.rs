//! Sidebar label prompt: holds the latest capture until the user names it.

use pathmark_common::protocol::{CoordinatorRequest, Notification, PageRequest};
use pathmark_common::record::{CapturedElement, LocatorRecord, same_page};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PromptError {
    #[error("No capture is waiting for a label")]
    NothingPending,
    #[error("Capture is switched off")]
    CaptureDisabled,
    #[error("Label is empty")]
    EmptyLabel,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingCapture {
    pub data: CapturedElement,
    pub url: String,
}

#[derive(Debug, Default)]
pub struct LabelPrompt {
    pending: Option<PendingCapture>,
    capturing: bool,
}

impl LabelPrompt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing
    }

    pub fn set_capturing(&mut self, capturing: bool) {
        self.capturing = capturing;
    }

    pub fn pending(&self) -> Option<&PendingCapture> {
        self.pending.as_ref()
    }

    /// Makes `data` the capture awaiting a label. A capture that was still
    /// waiting is dropped and returned.
    pub fn offer(
        &mut self,
        data: CapturedElement,
        url: impl Into<String>,
    ) -> Option<PendingCapture> {
        let replaced = self.pending.replace(PendingCapture {
            data,
            url: url.into(),
        });
        if let Some(previous) = &replaced {
            debug!(id = %previous.data.id, "Pending capture superseded");
        }
        replaced
    }

    /// Feeds a notification the sidebar listens for.
    pub fn on_notification(&mut self, notification: &Notification) {
        match notification {
            Notification::RelayData { data, url } => {
                self.offer(data.clone(), url.clone());
            }
            Notification::CaptureDisabled { .. } => self.capturing = false,
            _ => {}
        }
    }

    /// Turns the pending capture into a `relayData` request carrying the
    /// label. The pending slot is cleared only on success.
    pub fn save_label(&mut self, label: &str) -> Result<CoordinatorRequest, PromptError> {
        if self.pending.is_none() {
            return Err(PromptError::NothingPending);
        }
        if !self.capturing {
            return Err(PromptError::CaptureDisabled);
        }
        let label = label.trim();
        if label.is_empty() {
            return Err(PromptError::EmptyLabel);
        }
        let pending = self.pending.take().ok_or(PromptError::NothingPending)?;
        info!(id = %pending.data.id, label, "Label saved");
        Ok(CoordinatorRequest::RelayData {
            data: pending.data,
            url: pending.url,
            custom_label: Some(label.to_string()),
            results: Vec::new(),
        })
    }

    pub fn discard(&mut self) -> Option<PendingCapture> {
        self.pending.take()
    }
}

/// Highlight request for `record`, only when the active tab shows the page it
/// was captured on.
pub fn highlight_request(record: &LocatorRecord, active_url: &str) -> Option<PageRequest> {
    same_page(&record.url, active_url).then(|| PageRequest::Highlight {
        locators: record.locators.clone(),
    })
}

pub fn highlight_all(records: &[LocatorRecord], active_url: &str) -> Vec<PageRequest> {
    records
        .iter()
        .filter_map(|r| highlight_request(r, active_url))
        .collect()
}
