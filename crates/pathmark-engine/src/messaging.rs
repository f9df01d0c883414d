//! Fire-and-forget delivery between surfaces.
//!
//! The page agent, the sidebar and the coordinator never call each other
//! directly; they push messages through these traits. Delivery order between
//! separate sends is not guaranteed by any surface.

use pathmark_common::protocol::{Notification, PageRequest, TabId};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::warn;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessagingError {
    #[error("Receiver is gone")]
    Disconnected,
    #[error("Channel is full")]
    Full,
}

pub trait MessageSink {
    fn send(&self, notification: Notification) -> Result<(), MessagingError>;

    /// Sends and logs a failed delivery instead of returning it.
    fn notify(&self, notification: Notification) {
        if let Err(e) = self.send(notification) {
            warn!(error = %e, "Dropped notification");
        }
    }
}

impl MessageSink for mpsc::UnboundedSender<Notification> {
    fn send(&self, notification: Notification) -> Result<(), MessagingError> {
        mpsc::UnboundedSender::send(self, notification).map_err(|_| MessagingError::Disconnected)
    }
}

impl MessageSink for mpsc::Sender<Notification> {
    fn send(&self, notification: Notification) -> Result<(), MessagingError> {
        self.try_send(notification).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => MessagingError::Full,
            mpsc::error::TrySendError::Closed(_) => MessagingError::Disconnected,
        })
    }
}

/// Delivery of requests to the page agent of one tab.
pub trait TabMessenger {
    fn send_to_tab(&self, tab_id: TabId, request: PageRequest) -> Result<(), MessagingError>;
}

impl TabMessenger for mpsc::UnboundedSender<(TabId, PageRequest)> {
    fn send_to_tab(&self, tab_id: TabId, request: PageRequest) -> Result<(), MessagingError> {
        self.send((tab_id, request))
            .map_err(|_| MessagingError::Disconnected)
    }
}
