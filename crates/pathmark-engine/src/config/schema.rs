use pathmark_common::grouping::{
    DEFAULT_PAGE, DEFAULT_SECTION, DEFAULT_SUBSECTION, DEFAULT_WORKFLOW, Grouping,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathmarkConfig {
    #[serde(default)]
    pub highlight: HighlightConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub grouping: GroupingConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HighlightConfig {
    /// Inline `border` value applied to resolved elements.
    #[serde(default = "default_border")]
    pub border: String,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            border: default_border(),
        }
    }
}

fn default_border() -> String {
    "2px solid red".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Length of the label derived from text content.
    #[serde(default = "default_label_max_chars")]
    pub label_max_chars: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            label_max_chars: default_label_max_chars(),
        }
    }
}

fn default_label_max_chars() -> usize {
    20
}

/// Placeholders used for grouping keys the user never set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupingConfig {
    #[serde(default = "default_workflow")]
    pub workflow: String,
    #[serde(default = "default_page")]
    pub page: String,
    #[serde(default = "default_section")]
    pub section: String,
    #[serde(default = "default_subsection")]
    pub subsection: String,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            workflow: default_workflow(),
            page: default_page(),
            section: default_section(),
            subsection: default_subsection(),
        }
    }
}

impl GroupingConfig {
    pub fn placeholders(&self) -> Grouping {
        Grouping {
            workflow: self.workflow.clone(),
            page: self.page.clone(),
            section: self.section.clone(),
            subsection: self.subsection.clone(),
        }
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

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(".pathmark").join("records.json"),
        None => PathBuf::from("./pathmark-records.json"),
    }
}
