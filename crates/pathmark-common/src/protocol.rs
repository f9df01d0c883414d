use crate::grouping::GroupedRecords;
use crate::record::{CapturedElement, LocatorRecord, LocatorSet, ResolutionResult};
use serde::{Deserialize, Serialize};

pub type TabId = u32;

/// Requests delivered to the page agent running inside a tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum PageRequest {
    ToggleCapture {
        enabled: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tab_id: Option<TabId>,
    },
    Highlight {
        #[serde(flatten)]
        locators: LocatorSet,
    },
    ClearHighlights,
}

/// Requests handled by the background coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum CoordinatorRequest {
    ToggleCapture {
        enabled: bool,
        tab_id: TabId,
    },
    GetCaptureState,
    TabUpdated {
        tab_id: TabId,
        url: String,
    },
    RelayData {
        data: CapturedElement,
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        custom_label: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        results: Vec<ResolutionResult>,
    },
    SaveData {
        data: LocatorRecord,
    },
    DeleteData {
        id: String,
    },
    UpdateStats {
        locator_a: String,
        results: Vec<ResolutionResult>,
    },
    LoadRecords,
    WorkflowSet {
        workflow: String,
    },
    PageSet {
        page: String,
        section: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subsection: Option<String>,
    },
    LogMessage {
        message: String,
    },
    ExportLogs,
    DomChanged,
}

/// Snapshot of the capture session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureState {
    pub enabled: bool,
    pub tab_id: Option<TabId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum CoordinatorResponse {
    Ok,
    Saved { id: String },
    Duplicate { id: String },
    Deleted { id: String, existed: bool },
    StatsUpdated { updated: usize },
    CaptureState { state: CaptureState },
    Records {
        records: Vec<LocatorRecord>,
        grouped: GroupedRecords,
    },
    Logs { data: String },
}

/// Fresh locators for a previously captured element, emitted after the
/// document changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathUpdate {
    pub record_id: String,
    #[serde(flatten)]
    pub locators: LocatorSet,
}

/// Fire-and-forget notifications sent between surfaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Notification {
    RelayData { data: CapturedElement, url: String },
    UpdatePaths { data: PathUpdate, url: String },
    UpdateStats {
        locator_a: String,
        results: Vec<ResolutionResult>,
    },
    DomChanged,
    UrlChanged { url: String, tab_id: TabId },
    CaptureDisabled { tab_id: TabId },
    RecordsLoaded { data: Vec<LocatorRecord> },
    Error { message: String },
}
