//! Background coordinator.
//!
//! Single owner of the capture session, the grouping context, and the record
//! store. Every surface talks to it with [`CoordinatorRequest`]s; it answers
//! with a [`CoordinatorResponse`] and pushes [`Notification`]s to the panels
//! and [`PageRequest`]s to tabs.

use crate::config::PathmarkConfig;
use crate::messaging::{MessageSink, TabMessenger};
use crate::session::{CaptureSession, Transition};
use crate::store::{Store, StoreError};
use pathmark_common::grouping::{Grouping, group_records};
use pathmark_common::protocol::{
    CaptureState, CoordinatorRequest, CoordinatorResponse, Notification, PageRequest, TabId,
};
use pathmark_common::record::{
    CapturedElement, LocatorRecord, ResolutionResult, derive_record_id, now_millis,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("Record store failed: {0}")]
    Store(#[from] StoreError),
    #[error("Failed to export logs: {0}")]
    Export(#[from] serde_json::Error),
}

pub struct Coordinator<P: MessageSink, T: TabMessenger> {
    store: Box<dyn Store>,
    panels: P,
    tabs: T,
    session: CaptureSession,
    context: Grouping,
    placeholders: Grouping,
}

impl<P: MessageSink, T: TabMessenger> Coordinator<P, T> {
    pub fn new(store: Box<dyn Store>, panels: P, tabs: T, config: &PathmarkConfig) -> Self {
        let placeholders = config.grouping.placeholders();
        Self {
            store,
            panels,
            tabs,
            session: CaptureSession::new(),
            context: placeholders.clone(),
            placeholders,
        }
    }

    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    pub fn capture_state(&self) -> CaptureState {
        self.session.snapshot()
    }

    /// Grouping keys applied to newly relayed records.
    pub fn context(&self) -> &Grouping {
        &self.context
    }

    pub fn store(&self) -> &dyn Store {
        &*self.store
    }

    /// Handles one request. Store failures are also reported to the panels
    /// and the log before being returned.
    pub fn handle(
        &mut self,
        request: CoordinatorRequest,
    ) -> Result<CoordinatorResponse, CoordinatorError> {
        let result = self.dispatch(request);
        if let Err(e) = &result {
            self.report_error(e);
        }
        result
    }

    /// Routes a notification emitted by a page agent.
    pub fn on_notification(
        &mut self,
        notification: Notification,
    ) -> Result<Option<CoordinatorResponse>, CoordinatorError> {
        match notification {
            Notification::UpdateStats { locator_a, results } => self
                .handle(CoordinatorRequest::UpdateStats { locator_a, results })
                .map(Some),
            Notification::DomChanged => self.handle(CoordinatorRequest::DomChanged).map(Some),
            other => {
                self.panels.notify(other);
                Ok(None)
            }
        }
    }

    fn dispatch(
        &mut self,
        request: CoordinatorRequest,
    ) -> Result<CoordinatorResponse, CoordinatorError> {
        match request {
            CoordinatorRequest::ToggleCapture { enabled, tab_id } => {
                Ok(self.toggle_capture(enabled, tab_id))
            }
            CoordinatorRequest::GetCaptureState => Ok(CoordinatorResponse::CaptureState {
                state: self.session.snapshot(),
            }),
            CoordinatorRequest::TabUpdated { tab_id, url } => {
                self.tab_updated(tab_id, url);
                Ok(CoordinatorResponse::Ok)
            }
            CoordinatorRequest::RelayData {
                data,
                url,
                custom_label,
                results,
            } => self.relay(data, url, custom_label, results),
            CoordinatorRequest::SaveData { data } => self.save(data),
            CoordinatorRequest::DeleteData { id } => {
                let existed = self.store.delete(&id)?;
                info!(%id, existed, "Record deleted");
                self.log(&format!("Deleted record {}", id))?;
                self.broadcast_records()?;
                Ok(CoordinatorResponse::Deleted { id, existed })
            }
            CoordinatorRequest::UpdateStats { locator_a, results } => {
                self.update_stats(&locator_a, &results)
            }
            CoordinatorRequest::LoadRecords => {
                let records = self.store.get_all()?;
                let grouped = group_records(&records);
                self.panels.notify(Notification::RecordsLoaded {
                    data: records.clone(),
                });
                Ok(CoordinatorResponse::Records { records, grouped })
            }
            CoordinatorRequest::WorkflowSet { workflow } => {
                self.context.workflow = workflow;
                self.context = self.context.clone().or_defaults(&self.placeholders);
                info!(workflow = %self.context.workflow, "Workflow set");
                Ok(CoordinatorResponse::Ok)
            }
            CoordinatorRequest::PageSet {
                page,
                section,
                subsection,
            } => {
                self.context.page = page;
                self.context.section = section;
                self.context.subsection = subsection.unwrap_or_default();
                self.context = self.context.clone().or_defaults(&self.placeholders);
                info!(
                    page = %self.context.page,
                    section = %self.context.section,
                    subsection = %self.context.subsection,
                    "Page context set"
                );
                Ok(CoordinatorResponse::Ok)
            }
            CoordinatorRequest::LogMessage { message } => {
                if message.trim().is_empty() {
                    warn!("Ignoring empty log message");
                } else {
                    self.log(&message)?;
                }
                Ok(CoordinatorResponse::Ok)
            }
            CoordinatorRequest::ExportLogs => {
                let entries = self.store.entries()?;
                debug!(count = entries.len(), "Exporting logs");
                Ok(CoordinatorResponse::Logs {
                    data: serde_json::to_string_pretty(&entries)?,
                })
            }
            CoordinatorRequest::DomChanged => {
                debug!("Page reported a document change");
                self.panels.notify(Notification::DomChanged);
                Ok(CoordinatorResponse::Ok)
            }
        }
    }

    fn toggle_capture(&mut self, enabled: bool, tab_id: TabId) -> CoordinatorResponse {
        let transition = self.session.toggle(enabled, tab_id);
        if let Transition::Rebound { from, .. } = transition {
            self.send_to_tab(
                from,
                PageRequest::ToggleCapture {
                    enabled: false,
                    tab_id: Some(from),
                },
            );
            self.panels
                .notify(Notification::CaptureDisabled { tab_id: from });
        }
        self.send_to_tab(
            tab_id,
            PageRequest::ToggleCapture {
                enabled,
                tab_id: Some(tab_id),
            },
        );
        CoordinatorResponse::CaptureState {
            state: self.session.snapshot(),
        }
    }

    fn tab_updated(&mut self, tab_id: TabId, url: String) {
        debug!(tab_id, %url, "Tab navigated");
        self.panels.notify(Notification::UrlChanged { url, tab_id });

        if let Some(disabled) = self.session.on_navigation(tab_id).disabled_tab() {
            self.send_to_tab(
                disabled,
                PageRequest::ToggleCapture {
                    enabled: false,
                    tab_id: Some(disabled),
                },
            );
            self.panels
                .notify(Notification::CaptureDisabled { tab_id: disabled });
        }
    }

    /// Upsert of a captured element. An existing record only gets the
    /// resolution results applied.
    fn relay(
        &mut self,
        data: CapturedElement,
        url: String,
        custom_label: Option<String>,
        results: Vec<ResolutionResult>,
    ) -> Result<CoordinatorResponse, CoordinatorError> {
        self.panels.notify(Notification::RelayData {
            data: data.clone(),
            url: url.clone(),
        });

        let id = if data.id.is_empty() {
            derive_record_id(&url, &data.locators.locator_a)
        } else {
            data.id.clone()
        };
        let value = data.metadata.value.clone();

        match self.store.get(&id)? {
            Some(mut existing) => {
                existing.apply_results(&results);
                self.store.put(existing)?;
                debug!(%id, results = results.len(), "Relay updated existing record");
            }
            None => {
                let mut record = LocatorRecord::from_capture(
                    CapturedElement { id: id.clone(), ..data },
                    &url,
                    self.context.clone().or_defaults(&self.placeholders),
                );
                record.custom_label = custom_label.filter(|l| !l.trim().is_empty());
                self.store.put(record)?;
                info!(%id, "Record stored");
                self.log(&format!("Saved record {}", id))?;
            }
        }

        self.store.record_change(&id, now_millis(), &results, &value)?;
        self.broadcast_records()?;
        Ok(CoordinatorResponse::Saved { id })
    }

    /// Explicit save from the management view. Existing ids get their editable
    /// fields updated; a new record duplicating `(url, locatorA)` is skipped.
    fn save(&mut self, mut record: LocatorRecord) -> Result<CoordinatorResponse, CoordinatorError> {
        if record.id.is_empty() {
            record.id = derive_record_id(&record.url, &record.locators.locator_a);
        }

        if let Some(mut existing) = self.store.get(&record.id)? {
            existing.custom_label = record.custom_label.filter(|l| !l.trim().is_empty());
            existing.grouping = record.grouping.or_defaults(&self.placeholders);
            existing.touch();
            let id = existing.id.clone();
            self.store.put(existing)?;
            info!(%id, "Record updated");
            self.broadcast_records()?;
            return Ok(CoordinatorResponse::Saved { id });
        }

        let duplicate = self.store.get_all()?.into_iter().find(|r| {
            r.url == record.url && r.locators.locator_a == record.locators.locator_a
        });
        if let Some(duplicate) = duplicate {
            info!(
                id = %duplicate.id,
                locator = %record.locators.locator_a,
                url = %record.url,
                "Duplicate record skipped"
            );
            return Ok(CoordinatorResponse::Duplicate { id: duplicate.id });
        }

        record.grouping = record.grouping.or_defaults(&self.placeholders);
        record.touch();
        let id = record.id.clone();
        self.store.put(record)?;
        info!(%id, "Record saved");
        self.log(&format!("Saved record {}", id))?;
        self.broadcast_records()?;
        Ok(CoordinatorResponse::Saved { id })
    }

    /// Every call counts: resolving the same record twice increments twice.
    fn update_stats(
        &mut self,
        locator_a: &str,
        results: &[ResolutionResult],
    ) -> Result<CoordinatorResponse, CoordinatorError> {
        if locator_a.is_empty() || results.is_empty() {
            return Ok(CoordinatorResponse::StatsUpdated { updated: 0 });
        }

        let mut updated = 0;
        for mut record in self.store.get_all()? {
            if record.locators.locator_a == locator_a {
                record.apply_results(results);
                self.store.put(record)?;
                updated += 1;
            }
        }
        debug!(locator_a, updated, "Counters updated");
        Ok(CoordinatorResponse::StatsUpdated { updated })
    }

    fn broadcast_records(&self) -> Result<(), CoordinatorError> {
        let data = self.store.get_all()?;
        self.panels.notify(Notification::RecordsLoaded { data });
        Ok(())
    }

    fn send_to_tab(&self, tab_id: TabId, request: PageRequest) {
        if let Err(e) = self.tabs.send_to_tab(tab_id, request) {
            warn!(tab_id, error = %e, "Failed to reach tab");
        }
    }

    fn log(&self, message: &str) -> Result<(), CoordinatorError> {
        self.store.append(now_millis(), message)?;
        Ok(())
    }

    fn report_error(&self, e: &CoordinatorError) {
        error!(error = %e, "Request failed");
        let message = e.to_string();
        if let Err(log_error) = self.store.append(now_millis(), &format!("ERROR: {}", message)) {
            warn!(error = %log_error, "Failed to log error");
        }
        self.panels.notify(Notification::Error { message });
    }
}
