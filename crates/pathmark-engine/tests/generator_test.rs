//! Locator generation tests.

use pathmark_common::record::{BoundingBox, Strategy};
use pathmark_engine::config::CaptureConfig;
use pathmark_engine::dom::{Document, NodeId};
use pathmark_engine::generator::{
    LocatorGenerator, absolute_path, short_selector, structural_path,
};
use pathmark_engine::resolver::find;
use pathmark_engine::selector::css;

fn select(doc: &Document, selector: &str) -> NodeId {
    css::query_selector(doc, selector)
        .unwrap()
        .unwrap_or_else(|| panic!("nothing matches {}", selector))
}

const APP: &str = r#"<html><body>
<div id="app"><form name="login"><input name="user"><input name="pass" type="password"><button>Go</button></form></div>
<ul class="menu"><li>One</li><li class="active">Two</li><li>Three</li></ul>
<section><p>a</p><p class="note x">b</p><div><span>c</span></div></section>
<select id="1st"><option value="a">A</option><option>B</option></select>
</body></html>"#;

/// An element with an id gets a single id step for A and C
#[test]
fn test_id_element_uses_single_step() {
    let doc = Document::parse(r#"<html><body><form><input id="u"></form></body></html>"#).unwrap();
    let input = select(&doc, "input");

    assert_eq!(absolute_path(&doc, input), r#"//*[@id="u"]"#);
    assert_eq!(structural_path(&doc, input), "#u");
    assert_eq!(short_selector(&doc, input), "#u");
    assert_eq!(find(&doc, Strategy::A, r#"//*[@id="u"]"#).unwrap(), Some(input));
}

/// Two same-tag siblings both get positional predicates, starting at 1
#[test]
fn test_same_tag_siblings_get_positions() {
    let doc = Document::parse(
        r#"<html><body><div class="row"><span>A</span><span>B</span></div></body></html>"#,
    )
    .unwrap();
    let spans = css::parse("span").unwrap().query_all(&doc);

    assert_eq!(
        absolute_path(&doc, spans[0]),
        r#"/html/body/div[contains(@class, "row")]/span[1]"#
    );
    assert_eq!(
        absolute_path(&doc, spans[1]),
        r#"/html/body/div[contains(@class, "row")]/span[2]"#
    );
    assert_eq!(
        structural_path(&doc, spans[1]),
        "html > body > div.row > span:nth-child(2)"
    );
    assert_eq!(short_selector(&doc, spans[1]), "span");
}

/// A lone element without id, name or class has no positional predicate
#[test]
fn test_only_child_has_no_position() {
    let doc = Document::parse("<html><body><main><p>x</p></main></body></html>").unwrap();
    let p = select(&doc, "p");

    let a = absolute_path(&doc, p);
    let b = structural_path(&doc, p);
    assert_eq!(a, "/html/body/main/p");
    assert_eq!(b, "html > body > main > p");
    assert!(!a.contains('['));
    assert!(!b.contains(":nth-child"));
}

/// The nearest ancestor id anchors both paths
#[test]
fn test_ancestor_id_anchors_paths() {
    let doc = Document::parse(
        r#"<html><body><div id="form"><label>x</label><input name="q"></div></body></html>"#,
    )
    .unwrap();
    let input = select(&doc, "input");

    assert_eq!(absolute_path(&doc, input), r#"//*[@id="form"]/input[@name="q"]"#);
    assert_eq!(structural_path(&doc, input), r#"#form > input[name="q"]"#);
    assert_eq!(short_selector(&doc, input), r#"[name="q"]"#);
}

/// nth-child counts every element sibling while A counts only same-tag ones
#[test]
fn test_nth_child_counts_all_siblings() {
    let doc = Document::parse(
        r#"<html><body><ul><li>a</li><b>x</b><li class="on">b</li></ul></body></html>"#,
    )
    .unwrap();
    let li = select(&doc, "li.on");

    assert_eq!(
        absolute_path(&doc, li),
        r#"/html/body/ul/li[2][contains(@class, "on")]"#
    );
    assert_eq!(structural_path(&doc, li), "html > body > ul > li.on:nth-child(3)");
    assert_eq!(short_selector(&doc, li), ".on");
}

/// Detached elements without an id cannot produce paths
#[test]
fn test_detached_element_yields_empty_paths() {
    let mut doc = Document::parse("<html><body></body></html>").unwrap();
    let orphan = doc.create_element("div");
    doc.set_attribute(orphan, "class", "card").unwrap();

    let generator = LocatorGenerator::default();
    let locators = generator.locators(&doc, orphan);
    assert_eq!(locators.locator_a, "");
    assert_eq!(locators.locator_b, "");
    assert_eq!(locators.locator_c, ".card");
    assert!(locators.is_partial());

    let with_id = doc.create_element("div");
    doc.set_attribute(with_id, "id", "floating").unwrap();
    assert_eq!(absolute_path(&doc, with_id), r#"//*[@id="floating"]"#);
}

/// Elements inside a removed subtree are treated as detached
#[test]
fn test_removed_subtree_yields_empty_paths() {
    let mut doc = Document::parse("<html><body><div><p>x</p></div></body></html>").unwrap();
    let div = select(&doc, "div");
    let p = select(&doc, "p");
    assert!(doc.remove(div));

    assert_eq!(absolute_path(&doc, p), "");
    assert_eq!(structural_path(&doc, p), "");
}

/// Generating twice without changes gives identical strings
#[test]
fn test_generation_is_deterministic() {
    let doc = Document::parse(APP).unwrap();
    let generator = LocatorGenerator::default();
    for node in doc.elements() {
        assert_eq!(generator.generate(&doc, node), generator.generate(&doc, node));
    }
}

/// Locators A and B find their own element again for every element
#[test]
fn test_paths_round_trip_for_every_element() {
    let doc = Document::parse(APP).unwrap();
    for node in doc.elements() {
        let a = absolute_path(&doc, node);
        let b = structural_path(&doc, node);
        assert_eq!(find(&doc, Strategy::A, &a).unwrap(), Some(node), "A = {}", a);
        assert_eq!(find(&doc, Strategy::B, &b).unwrap(), Some(node), "B = {}", b);
    }
}

/// Ids that are not valid CSS identifiers are escaped
#[test]
fn test_leading_digit_id_is_escaped() {
    let doc = Document::parse(APP).unwrap();
    let option = select(&doc, "option");

    assert_eq!(structural_path(&doc, option), r"#\31 st > option:nth-child(1)");
    assert_eq!(absolute_path(&doc, option), r#"//*[@id="1st"]/option[1]"#);
}

/// Ids and classes starting with a dash and a digit resolve through B and C
#[test]
fn test_dash_digit_identifiers_round_trip() {
    let doc = Document::parse(
        r#"<html><body><div id="-1x">a</div><p class="-2col">b</p></body></html>"#,
    )
    .unwrap();
    let div = select(&doc, "div");
    let p = select(&doc, "p");

    assert_eq!(structural_path(&doc, div), r"#-\31 x");
    assert_eq!(short_selector(&doc, div), r"#-\31 x");
    assert_eq!(short_selector(&doc, p), r".-\32 col");

    for node in [div, p] {
        let b = structural_path(&doc, node);
        let c = short_selector(&doc, node);
        assert_eq!(find(&doc, Strategy::B, &b).unwrap(), Some(node), "B {}", b);
        assert_eq!(find(&doc, Strategy::C, &c).unwrap(), Some(node), "C {}", c);
    }
}

/// Capturing the ancestor of a very deep subtree completes
#[test]
fn test_deep_subtree_metadata() {
    const DEPTH: usize = 10_000;
    let mut doc = Document::parse("<html><body></body></html>").unwrap();
    let body = select(&doc, "body");
    let mut parent = body;
    for _ in 0..DEPTH {
        let div = doc.create_element("div");
        doc.append_child(parent, div).unwrap();
        parent = div;
    }
    let text = doc.create_text("deep");
    doc.append_child(parent, text).unwrap();

    let captured = LocatorGenerator::default().generate(&doc, body);
    assert_eq!(captured.locators.locator_a, "/html/body");
    assert_eq!(captured.locators.locator_b, "html > body");
    assert_eq!(captured.metadata.label, "deep");
    assert!(captured.metadata.outer_markup.starts_with("<body><div><div>"));
    assert!(captured.metadata.outer_markup.ends_with("</div></div></body>"));
    assert_eq!(
        captured.metadata.outer_markup.len(),
        "<body></body>".len() + DEPTH * "<div></div>".len() + "deep".len()
    );
}

/// Metadata of form controls
#[test]
fn test_metadata_for_form_controls() {
    let mut doc = Document::parse(APP).unwrap();
    let generator = LocatorGenerator::default();

    let pass = select(&doc, r#"[name="pass"]"#);
    doc.set_value(pass, "hunter2").unwrap();
    doc.set_rect(
        pass,
        BoundingBox {
            x: 10.0,
            y: 20.0,
            width: 100.0,
            height: 24.0,
        },
    )
    .unwrap();
    let meta = generator.describe(&doc, pass);
    assert_eq!(meta.tag, "input");
    assert_eq!(meta.element_type, "password");
    assert_eq!(meta.value, "hunter2");
    assert_eq!(meta.label, "pass");
    assert_eq!(meta.bounding_box.width, 100.0);
    assert_eq!(meta.attributes.get("type").map(String::as_str), Some("password"));
    assert!(meta.select_options.is_none());

    let user = select(&doc, r#"[name="user"]"#);
    assert_eq!(generator.describe(&doc, user).element_type, "text");

    let button = select(&doc, "button");
    let meta = generator.describe(&doc, button);
    assert_eq!(meta.element_type, "submit");
    assert_eq!(meta.label, "Go");
    assert_eq!(meta.outer_markup, "<button>Go</button>");

    let select_el = select(&doc, "select");
    let meta = generator.describe(&doc, select_el);
    assert_eq!(meta.element_type, "select-one");
    assert_eq!(meta.value, "a");
    assert_eq!(meta.label, "1st");
    let options = meta.select_options.unwrap();
    assert_eq!(options.len(), 2);
    assert_eq!(options[1].text, "B");
    assert_eq!(options[1].value, "B");
}

/// Non-form elements get a category or "unknown"
#[test]
fn test_metadata_type_categories() {
    let doc = Document::parse(
        r#"<html><body><span>s</span><a href="/x">link</a><a>anchor</a><div role="button">d</div><p>p</p></body></html>"#,
    )
    .unwrap();
    let generator = LocatorGenerator::default();
    let types: Vec<String> = ["span", "a[href]", "a:nth-child(3)", "div", "p"]
        .iter()
        .map(|s| generator.describe(&doc, select(&doc, s)).element_type)
        .collect();
    assert_eq!(types, vec!["button", "link", "unknown", "button", "unknown"]);
}

/// Text labels are trimmed and cut to the configured length
#[test]
fn test_text_label_is_truncated() {
    let doc = Document::parse(
        "<html><body><p>   The quick brown fox jumps over the lazy dog   </p><div></div></body></html>",
    )
    .unwrap();

    let generator = LocatorGenerator::default();
    assert_eq!(
        generator.describe(&doc, select(&doc, "p")).label,
        "The quick brown fox "
    );
    assert_eq!(generator.describe(&doc, select(&doc, "div")).label, "");

    let short = LocatorGenerator::new(&CaptureConfig { label_max_chars: 3 });
    assert_eq!(short.describe(&doc, select(&doc, "p")).label, "The");
}
