//! Wire shape tests for the messages exchanged between surfaces.

use pathmark_common::formatter::format_grouped;
use pathmark_common::grouping::{DEFAULT_SUBSECTION, Grouping, group_records};
use pathmark_common::protocol::{
    CoordinatorRequest, CoordinatorResponse, Notification, PageRequest, PathUpdate,
};
use pathmark_common::record::{
    CapturedElement, LocatorRecord, LocatorSet, ResolutionResult, Strategy,
};
use serde_json::json;

fn record(id: &str, url: &str, locator_a: &str) -> LocatorRecord {
    let mut record = LocatorRecord::from_capture(
        CapturedElement {
            id: id.to_string(),
            locators: LocatorSet {
                locator_a: locator_a.to_string(),
                locator_b: "html > body > input".to_string(),
                locator_c: "input".to_string(),
            },
            ..Default::default()
        },
        url,
        Grouping::default(),
    );
    record.metadata.tag = "input".to_string();
    record.metadata.element_type = "text".to_string();
    record
}

/// Inbound page requests use camelCase action tags and field names
#[test]
fn test_page_requests_deserialize_from_extension_json() {
    let toggle: PageRequest =
        serde_json::from_value(json!({"action": "toggleCapture", "enabled": true, "tabId": 7}))
            .unwrap();
    assert_eq!(
        toggle,
        PageRequest::ToggleCapture {
            enabled: true,
            tab_id: Some(7)
        }
    );

    let highlight: PageRequest = serde_json::from_value(json!({
        "action": "highlight",
        "locatorA": "//*[@id=\"u\"]",
        "locatorB": "#u",
        "locatorC": "#u"
    }))
    .unwrap();
    match highlight {
        PageRequest::Highlight { locators } => {
            assert_eq!(locators.locator_a, "//*[@id=\"u\"]");
            assert_eq!(locators.get(Strategy::C), "#u");
        }
        other => panic!("unexpected request: {:?}", other),
    }

    let clear: PageRequest = serde_json::from_value(json!({"action": "clearHighlights"})).unwrap();
    assert_eq!(clear, PageRequest::ClearHighlights);
}

/// Unknown actions are rejected instead of being silently ignored
#[test]
fn test_unknown_action_is_an_error() {
    let result: Result<PageRequest, _> =
        serde_json::from_value(json!({"action": "selfDestruct"}));
    assert!(result.is_err());
}

/// Outbound stats notification carries one result per strategy
#[test]
fn test_update_stats_notification_shape() {
    let notification = Notification::UpdateStats {
        locator_a: "/html/body/a".to_string(),
        results: vec![
            ResolutionResult {
                strategy: Strategy::A,
                found: true,
                elapsed_ms: 0.5,
            },
            ResolutionResult::not_attempted(Strategy::B),
        ],
    };
    let value = serde_json::to_value(&notification).unwrap();
    assert_eq!(value["action"], "updateStats");
    assert_eq!(value["locatorA"], "/html/body/a");
    assert_eq!(value["results"][0]["strategy"], "A");
    assert_eq!(value["results"][0]["found"], true);
    assert_eq!(value["results"][1]["elapsedMs"], 0.0);
}

/// Drift notifications flatten the fresh locators next to the record id
#[test]
fn test_update_paths_notification_shape() {
    let notification = Notification::UpdatePaths {
        data: PathUpdate {
            record_id: "https://a.test/-/html/body/div".to_string(),
            locators: LocatorSet {
                locator_a: "/html/body/div".to_string(),
                locator_b: "html > body > div".to_string(),
                locator_c: "div".to_string(),
            },
        },
        url: "https://a.test/".to_string(),
    };
    let value = serde_json::to_value(&notification).unwrap();
    assert_eq!(value["action"], "updatePaths");
    assert_eq!(value["data"]["recordId"], "https://a.test/-/html/body/div");
    assert_eq!(value["data"]["locatorB"], "html > body > div");
    assert_eq!(value["url"], "https://a.test/");
}

/// Captured element payloads accept missing optional metadata
#[test]
fn test_relay_request_with_sparse_capture() {
    let request: CoordinatorRequest = serde_json::from_value(json!({
        "action": "relayData",
        "url": "https://a.test/login",
        "customLabel": "Username",
        "data": {
            "locatorA": "//*[@id=\"u\"]",
            "tag": "input",
            "elementType": "text"
        }
    }))
    .unwrap();

    match request {
        CoordinatorRequest::RelayData {
            data,
            url,
            custom_label,
            results,
        } => {
            assert_eq!(url, "https://a.test/login");
            assert_eq!(custom_label.as_deref(), Some("Username"));
            assert!(results.is_empty());
            assert!(data.id.is_empty());
            assert_eq!(data.locators.locator_a, "//*[@id=\"u\"]");
            assert!(data.locators.locator_b.is_empty());
            assert!(data.locators.is_partial());
            assert_eq!(data.metadata.tag, "input");
            assert!(data.metadata.select_options.is_none());
        }
        other => panic!("unexpected request: {:?}", other),
    }
}

/// Records keep their grouping keys defaulted when deserialized without them
#[test]
fn test_record_roundtrip_defaults_grouping() {
    let original = record("r1", "https://a.test/", "/html/body/input");
    let mut value = serde_json::to_value(&original).unwrap();
    assert_eq!(value["locatorA"], "/html/body/input");
    assert_eq!(value["elementType"], "text");
    assert_eq!(value["stats"]["locatorA"]["successCount"], 0);

    let object = value.as_object_mut().unwrap();
    object.remove("subsection");
    let restored: LocatorRecord = serde_json::from_value(value).unwrap();
    assert_eq!(restored.grouping.subsection, DEFAULT_SUBSECTION);
    assert_eq!(restored.locators, original.locators);
    assert_eq!(restored.id, "r1");
}

/// Coordinator responses are tagged by status
#[test]
fn test_coordinator_response_status_tags() {
    let saved = serde_json::to_value(CoordinatorResponse::Saved {
        id: "r1".to_string(),
    })
    .unwrap();
    assert_eq!(saved, json!({"status": "saved", "id": "r1"}));

    let deleted = serde_json::to_value(CoordinatorResponse::Deleted {
        id: "r1".to_string(),
        existed: false,
    })
    .unwrap();
    assert_eq!(deleted["status"], "deleted");
    assert_eq!(deleted["existed"], false);
}

/// Grouped text view lists records under their hierarchy with counters
#[test]
fn test_format_grouped_lists_hierarchy() {
    let mut first = record("r1", "https://a.test/", "/html/body/input[1]");
    first.custom_label = Some("Username".to_string());
    first.stats.locator_a.success_count = 2;
    first.stats.locator_b.fail_count = 1;
    let mut second = record("r2", "https://a.test/", "");
    second.grouping.section = "Footer".to_string();

    let text = format_grouped(&group_records(&[first, second]));
    assert!(text.starts_with("Default Workflow\n"));
    assert!(text.contains("  Default Page (2 items) https://a.test/\n"));
    assert!(text.contains("[r1] Username (text)"));
    assert!(text.contains("A: /html/body/input[1] (+2 / -0)"));
    assert!(text.contains("B: html > body > input (+0 / -1)"));
    assert!(text.contains("A: N/A (+0 / -0)"));
    assert!(text.contains("    Footer\n"));
}

/// Nothing stored renders a single placeholder line
#[test]
fn test_format_grouped_empty() {
    assert_eq!(format_grouped(&group_records(&[])), "No records\n");
}
