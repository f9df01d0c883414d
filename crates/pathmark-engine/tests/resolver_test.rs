//! Locator resolution and highlight marking tests.

use pathmark_common::record::{LocatorSet, Strategy};
use pathmark_engine::config::HighlightConfig;
use pathmark_engine::dom::Document;
use pathmark_engine::generator::LocatorGenerator;
use pathmark_engine::resolver::Resolver;
use pathmark_engine::selector::css;

const PAGE: &str = r#"<html><body>
<form id="login"><input id="u" name="user"><input name="pass" style="color: blue"></form>
<div class="row"><span>A</span><span>B</span></div>
</body></html>"#;

/// Empty locators are not looked up at all
#[test]
fn test_empty_locator_is_not_attempted() {
    let mut doc = Document::parse(PAGE).unwrap();
    let mut resolver = Resolver::default();
    for strategy in Strategy::ALL {
        let result = resolver.resolve(&mut doc, strategy, "");
        assert!(!result.found);
        assert_eq!(result.elapsed_ms, 0.0);
        assert_eq!(result.strategy, strategy);
    }
}

/// An id locator resolves and marks the element
#[test]
fn test_id_locator_is_found_and_marked() {
    let mut doc = Document::parse(PAGE).unwrap();
    let mut resolver = Resolver::default();
    let input = doc.element_by_id("u").unwrap();

    let result = resolver.resolve(&mut doc, Strategy::A, r#"//*[@id="u"]"#);
    assert!(result.found);
    assert!(result.elapsed_ms >= 0.0);
    assert_eq!(doc.style_property(input, "border").as_deref(), Some("2px solid red"));
    assert!(resolver.is_marked(&doc, input));
}

/// Malformed locators are reported as not found
#[test]
fn test_malformed_locators_are_not_found() {
    let mut doc = Document::parse(PAGE).unwrap();
    let mut resolver = Resolver::default();

    assert!(!resolver.resolve(&mut doc, Strategy::A, "//*[@id=").found);
    assert!(!resolver.resolve(&mut doc, Strategy::B, "html > > body").found);
    assert!(!resolver.resolve(&mut doc, Strategy::C, "#").found);
    assert_eq!(resolver.clear_highlights(&mut doc), 0);
}

/// Removing the target turns every locator into a miss
#[test]
fn test_removed_target_is_not_found() {
    let mut doc = Document::parse(PAGE).unwrap();
    let generator = LocatorGenerator::default();
    let mut resolver = Resolver::default();
    let span = css::parse(".row > span").unwrap().query_all(&doc)[1];
    let locators = generator.locators(&doc, span);

    let before = resolver.resolve_all(&mut doc, &locators);
    assert!(before[0].found && before[1].found);
    resolver.clear_highlights(&mut doc);

    assert!(doc.remove(span));
    let after = resolver.resolve_all(&mut doc, &locators);
    assert_eq!(after.len(), 3);
    assert!(!after[0].found, "A still found: {}", locators.locator_a);
    assert!(!after[1].found, "B still found: {}", locators.locator_b);
    // C is the bare tag and falls back to the remaining span.
    assert!(after[2].found);
}

/// First match wins for CSS locators
#[test]
fn test_css_first_match_wins() {
    let mut doc = Document::parse(PAGE).unwrap();
    let mut resolver = Resolver::default();
    let spans = css::parse("span").unwrap().query_all(&doc);

    assert!(resolver.resolve(&mut doc, Strategy::C, "span").found);
    assert!(resolver.is_marked(&doc, spans[0]));
    assert!(!resolver.is_marked(&doc, spans[1]));
}

/// Results come back in A, B, C order with missing locators skipped
#[test]
fn test_resolve_all_orders_results() {
    let mut doc = Document::parse(PAGE).unwrap();
    let mut resolver = Resolver::default();
    let locators = LocatorSet {
        locator_a: String::new(),
        locator_b: "#login > input:nth-child(2)".to_string(),
        locator_c: "[name=\"missing\"]".to_string(),
    };

    let results = resolver.resolve_all(&mut doc, &locators);
    let strategies: Vec<_> = results.iter().map(|r| r.strategy).collect();
    assert_eq!(strategies, Strategy::ALL.to_vec());
    assert_eq!(
        results.iter().map(|r| r.found).collect::<Vec<_>>(),
        vec![false, true, false]
    );
    assert_eq!(results[0].elapsed_ms, 0.0);
}

/// Clearing removes only the marking and keeps other inline styles
#[test]
fn test_clear_highlights_keeps_other_styles() {
    let mut doc = Document::parse(PAGE).unwrap();
    let mut resolver = Resolver::default();
    let user = doc.element_by_id("u").unwrap();
    let pass = css::query_selector(&doc, "[name=pass]").unwrap().unwrap();

    assert!(resolver.resolve(&mut doc, Strategy::A, r#"//*[@id="u"]"#).found);
    assert!(resolver.resolve(&mut doc, Strategy::C, "[name=pass]").found);
    assert_eq!(resolver.clear_highlights(&mut doc), 2);

    assert_eq!(doc.attribute(user, "style"), None);
    assert_eq!(doc.attribute(pass, "style"), Some("color: blue;"));

    // Idempotent.
    assert_eq!(resolver.clear_highlights(&mut doc), 0);
}

/// A page's own border survives clearing and is restored after marking
#[test]
fn test_clear_restores_page_border() {
    let mut doc = Document::parse(r#"<div style="border: 1px dashed gray">x</div>"#).unwrap();
    let mut resolver = Resolver::new(&HighlightConfig {
        border: "3px solid lime".to_string(),
    });
    let div = doc.elements()[0];

    assert_eq!(resolver.clear_highlights(&mut doc), 0);
    assert_eq!(doc.style_property(div, "border").as_deref(), Some("1px dashed gray"));

    assert!(resolver.resolve(&mut doc, Strategy::C, "div").found);
    assert!(resolver.resolve(&mut doc, Strategy::B, "div").found);
    assert_eq!(doc.style_property(div, "border").as_deref(), Some("3px solid lime"));

    assert_eq!(resolver.clear_highlights(&mut doc), 1);
    assert_eq!(doc.style_property(div, "border").as_deref(), Some("1px dashed gray"));
    assert!(!resolver.is_marked(&doc, div));
    assert_eq!(resolver.clear_highlights(&mut doc), 0);
}
