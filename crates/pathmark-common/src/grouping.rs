use crate::record::LocatorRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_WORKFLOW: &str = "Default Workflow";
pub const DEFAULT_PAGE: &str = "Default Page";
pub const DEFAULT_SECTION: &str = "Default Section";
pub const DEFAULT_SUBSECTION: &str = "Default Subsection";

/// Hierarchy labels a record is filed under. Never empty once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grouping {
    #[serde(default = "default_workflow")]
    pub workflow: String,
    #[serde(default = "default_page")]
    pub page: String,
    #[serde(default = "default_section")]
    pub section: String,
    #[serde(default = "default_subsection")]
    pub subsection: String,
}

impl Default for Grouping {
    fn default() -> Self {
        Self {
            workflow: default_workflow(),
            page: default_page(),
            section: default_section(),
            subsection: default_subsection(),
        }
    }
}

impl Grouping {
    /// Replaces blank keys with the matching key from `fallback`.
    pub fn or_defaults(mut self, fallback: &Grouping) -> Self {
        fill(&mut self.workflow, &fallback.workflow);
        fill(&mut self.page, &fallback.page);
        fill(&mut self.section, &fallback.section);
        fill(&mut self.subsection, &fallback.subsection);
        self
    }
}

fn fill(slot: &mut String, fallback: &str) {
    if slot.trim().is_empty() {
        *slot = fallback.to_string();
    }
}

fn default_workflow() -> String {
    DEFAULT_WORKFLOW.to_string()
}

fn default_page() -> String {
    DEFAULT_PAGE.to_string()
}

fn default_section() -> String {
    DEFAULT_SECTION.to_string()
}

fn default_subsection() -> String {
    DEFAULT_SUBSECTION.to_string()
}

pub type SubsectionGroup = BTreeMap<String, Vec<LocatorRecord>>;
pub type SectionGroup = BTreeMap<String, SubsectionGroup>;
pub type PageGroup = BTreeMap<String, SectionGroup>;

/// workflow -> page -> section -> subsection -> records
pub type GroupedRecords = BTreeMap<String, PageGroup>;

pub fn group_records(records: &[LocatorRecord]) -> GroupedRecords {
    let mut grouped = GroupedRecords::new();
    for record in records {
        let g = &record.grouping;
        grouped
            .entry(g.workflow.clone())
            .or_default()
            .entry(g.page.clone())
            .or_default()
            .entry(g.section.clone())
            .or_default()
            .entry(g.subsection.clone())
            .or_default()
            .push(record.clone());
    }
    grouped
}
