use crate::grouping::Grouping;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// The three independent ways a captured element can be found again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Strategy {
    /// ID-first absolute path, evaluated as XPath.
    A,
    /// Structural CSS path.
    B,
    /// Short single-step CSS selector.
    C,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::A, Strategy::B, Strategy::C];
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Strategy::A => "A",
            Strategy::B => "B",
            Strategy::C => "C",
        };
        f.write_str(tag)
    }
}

/// The three locator strings derived for one element. Any of them may be
/// empty when its strategy could not produce a path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocatorSet {
    #[serde(default)]
    pub locator_a: String,
    #[serde(default)]
    pub locator_b: String,
    #[serde(default)]
    pub locator_c: String,
}

impl LocatorSet {
    pub fn get(&self, strategy: Strategy) -> &str {
        match strategy {
            Strategy::A => &self.locator_a,
            Strategy::B => &self.locator_b,
            Strategy::C => &self.locator_c,
        }
    }

    /// True when at least one strategy failed to produce a locator.
    pub fn is_partial(&self) -> bool {
        Strategy::ALL.iter().any(|s| self.get(*s).is_empty())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub text: String,
    pub value: String,
}

/// Descriptive snapshot taken at capture time. Informational only, never used
/// to find the element again.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementMetadata {
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(rename = "elementType", default = "unknown_type")]
    pub element_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select_options: Option<Vec<SelectOption>>,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub bounding_box: BoundingBox,
    #[serde(default)]
    pub outer_markup: String,
}

fn unknown_type() -> String {
    "unknown".to_string()
}

/// Everything the page agent produces for one alt-click.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedElement {
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub locators: LocatorSet,
    #[serde(flatten)]
    pub metadata: ElementMetadata,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyCounter {
    pub success_count: u64,
    pub fail_count: u64,
}

impl StrategyCounter {
    pub fn record(&mut self, found: bool) {
        if found {
            self.success_count += 1;
        } else {
            self.fail_count += 1;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocatorStats {
    #[serde(default)]
    pub locator_a: StrategyCounter,
    #[serde(default)]
    pub locator_b: StrategyCounter,
    #[serde(default)]
    pub locator_c: StrategyCounter,
}

impl LocatorStats {
    pub fn get(&self, strategy: Strategy) -> &StrategyCounter {
        match strategy {
            Strategy::A => &self.locator_a,
            Strategy::B => &self.locator_b,
            Strategy::C => &self.locator_c,
        }
    }

    pub fn get_mut(&mut self, strategy: Strategy) -> &mut StrategyCounter {
        match strategy {
            Strategy::A => &mut self.locator_a,
            Strategy::B => &mut self.locator_b,
            Strategy::C => &mut self.locator_c,
        }
    }
}

/// Outcome of resolving one locator against the live document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionResult {
    pub strategy: Strategy,
    pub found: bool,
    pub elapsed_ms: f64,
}

impl ResolutionResult {
    /// Result for an empty locator: nothing was looked up.
    pub fn not_attempted(strategy: Strategy) -> Self {
        Self {
            strategy,
            found: false,
            elapsed_ms: 0.0,
        }
    }
}

/// One tracked element reference, as persisted by the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocatorRecord {
    pub id: String,
    #[serde(flatten)]
    pub locators: LocatorSet,
    #[serde(flatten)]
    pub metadata: ElementMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_label: Option<String>,
    #[serde(default)]
    pub stats: LocatorStats,
    #[serde(flatten)]
    pub grouping: Grouping,
    pub url: String,
    #[serde(default)]
    pub last_updated: u64,
}

impl LocatorRecord {
    pub fn from_capture(captured: CapturedElement, url: &str, grouping: Grouping) -> Self {
        let id = if captured.id.is_empty() {
            derive_record_id(url, &captured.locators.locator_a)
        } else {
            captured.id
        };
        Self {
            id,
            locators: captured.locators,
            metadata: captured.metadata,
            custom_label: None,
            stats: LocatorStats::default(),
            grouping,
            url: url.to_string(),
            last_updated: now_millis(),
        }
    }

    /// Label shown in lists: the user override, then the derived label, then
    /// the absolute locator.
    pub fn display_label(&self) -> &str {
        match self.custom_label.as_deref() {
            Some(label) if !label.is_empty() => label,
            _ if !self.metadata.label.is_empty() => &self.metadata.label,
            _ => &self.locators.locator_a,
        }
    }

    /// Increments one counter per result. Counters never decrease.
    pub fn apply_results(&mut self, results: &[ResolutionResult]) {
        for result in results {
            self.stats.get_mut(result.strategy).record(result.found);
        }
        self.touch();
    }

    pub fn touch(&mut self) {
        self.last_updated = now_millis();
    }
}

/// Record identity for a capture: `{url}-{locatorA}`, or `{url}-{uuid}` when
/// the absolute locator could not be generated.
pub fn derive_record_id(url: &str, locator_a: &str) -> String {
    if locator_a.is_empty() {
        format!("{}-{}", url, uuid::Uuid::new_v4())
    } else {
        format!("{}-{}", url, locator_a)
    }
}

/// Whether two page URLs refer to the same document, ignoring fragments.
pub fn same_page(left: &str, right: &str) -> bool {
    match (url::Url::parse(left), url::Url::parse(right)) {
        (Ok(mut a), Ok(mut b)) => {
            a.set_fragment(None);
            b.set_fragment(None);
            a == b
        }
        _ => left == right,
    }
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_label_prefers_custom_label() {
        let mut record = LocatorRecord::from_capture(
            CapturedElement {
                id: String::new(),
                locators: LocatorSet {
                    locator_a: "/html/body/a".into(),
                    ..Default::default()
                },
                metadata: ElementMetadata::default(),
            },
            "https://example.com/",
            Grouping::default(),
        );
        assert_eq!(record.id, "https://example.com/-/html/body/a");
        assert_eq!(record.display_label(), "/html/body/a");

        record.metadata.label = "link".into();
        assert_eq!(record.display_label(), "link");

        record.custom_label = Some("Home link".into());
        assert_eq!(record.display_label(), "Home link");
    }

    #[test]
    fn same_page_ignores_fragment() {
        assert!(same_page("https://a.test/x#top", "https://a.test/x"));
        assert!(!same_page("https://a.test/x", "https://a.test/y"));
        assert!(same_page("not a url", "not a url"));
    }
}
