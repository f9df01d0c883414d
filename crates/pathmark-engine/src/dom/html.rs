//! Tolerant HTML parser: enough of the syntax for real page snapshots
//! (comments, doctype, void and raw-text elements, quoted and bare attribute
//! values, the common implied end tags) without a full tree builder.

use super::{Document, DomError, NodeId};

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

const RAW_TEXT_TAGS: &[&str] = &["script", "style", "textarea", "title"];

pub(super) fn is_void_tag(tag: &str) -> bool {
    VOID_TAGS.contains(&tag)
}

pub(super) fn parse(source: &str) -> Result<Document, DomError> {
    let mut doc = Document::new();
    let mut stack: Vec<NodeId> = vec![doc.root()];
    let bytes = source.as_bytes();
    let mut i = 0usize;

    while i < bytes.len() {
        if source[i..].starts_with("<!--") {
            let end = source[i + 4..]
                .find("-->")
                .ok_or_else(|| DomError::Parse("unclosed HTML comment".into()))?;
            i += 4 + end + 3;
            continue;
        }

        if source[i..].starts_with("<!") || source[i..].starts_with("<?") {
            let end = source[i..]
                .find('>')
                .ok_or_else(|| DomError::Parse("unclosed markup declaration".into()))?;
            i += end + 1;
            continue;
        }

        if source[i..].starts_with("</") {
            let (tag, next) = parse_end_tag(source, i)?;
            i = next;
            // Ignore stray end tags that match nothing open.
            if let Some(pos) = stack
                .iter()
                .rposition(|n| doc.tag_name(*n) == Some(tag.as_str()))
                && pos > 0
            {
                stack.truncate(pos);
            }
            continue;
        }

        if bytes[i] == b'<' && bytes.get(i + 1).is_some_and(|b| b.is_ascii_alphabetic()) {
            let (tag, attrs, self_closing, next) = parse_start_tag(source, i)?;
            i = next;

            close_implied(&doc, &mut stack, &tag);
            let parent = *stack
                .last()
                .ok_or_else(|| DomError::Parse("missing parent element".into()))?;
            let node = doc.create_element(&tag);
            {
                let element = doc.element_mut(node)?;
                for (name, value) in attrs {
                    if !element.attrs.iter().any(|(k, _)| *k == name) {
                        element.attrs.push((name, value));
                    }
                }
            }
            doc.append_child(parent, node)?;

            if RAW_TEXT_TAGS.contains(&tag.as_str()) && !self_closing {
                let close = find_end_tag(source, i, &tag)
                    .ok_or_else(|| DomError::Parse(format!("unclosed <{}>", tag)))?;
                let body = &source[i..close];
                if !body.is_empty() {
                    let text = if tag == "script" || tag == "style" {
                        body.to_string()
                    } else {
                        decode_entities(body)
                    };
                    let text_node = doc.create_text(&text);
                    doc.append_child(node, text_node)?;
                }
                let (_, after) = parse_end_tag(source, close)?;
                i = after;
                continue;
            }

            if !self_closing && !is_void_tag(&tag) {
                stack.push(node);
            }
            continue;
        }

        let start = i;
        i += 1;
        while i < bytes.len() && bytes[i] != b'<' {
            i += 1;
        }
        let text = &source[start..i];
        let parent = *stack
            .last()
            .ok_or_else(|| DomError::Parse("missing parent element".into()))?;
        let text_node = doc.create_text(&decode_entities(text));
        doc.append_child(parent, text_node)?;
    }

    Ok(doc)
}

/// Closes elements whose end tag HTML lets authors omit.
fn close_implied(doc: &Document, stack: &mut Vec<NodeId>, opening: &str) {
    let closes: &[&str] = match opening {
        "li" => &["li"],
        "option" => &["option"],
        "p" => &["p"],
        "tr" => &["tr", "td", "th"],
        "td" | "th" => &["td", "th"],
        _ => return,
    };
    if let Some(top) = stack.last()
        && let Some(tag) = doc.tag_name(*top)
        && closes.contains(&tag)
    {
        stack.pop();
    }
}

type StartTag = (String, Vec<(String, String)>, bool, usize);

fn parse_start_tag(source: &str, at: usize) -> Result<StartTag, DomError> {
    let bytes = source.as_bytes();
    let mut i = at + 1;
    let tag_start = i;
    while i < bytes.len() && is_name_char(bytes[i]) {
        i += 1;
    }
    let tag = source[tag_start..i].to_ascii_lowercase();

    let mut attrs = Vec::new();
    let mut self_closing = false;
    loop {
        skip_ws(bytes, &mut i);
        if i >= bytes.len() {
            return Err(DomError::Parse(format!("unclosed start tag <{}>", tag)));
        }
        match bytes[i] {
            b'>' => {
                i += 1;
                break;
            }
            b'/' if bytes.get(i + 1) == Some(&b'>') => {
                self_closing = true;
                i += 2;
                break;
            }
            b'/' => {
                i += 1;
                continue;
            }
            _ => {}
        }

        let name_start = i;
        while i < bytes.len() && is_attr_name_char(bytes[i]) {
            i += 1;
        }
        if name_start == i {
            return Err(DomError::Parse(format!("invalid attribute in <{}>", tag)));
        }
        let name = source[name_start..i].to_ascii_lowercase();

        skip_ws(bytes, &mut i);
        let value = if bytes.get(i) == Some(&b'=') {
            i += 1;
            skip_ws(bytes, &mut i);
            parse_attr_value(source, &mut i)?
        } else {
            String::new()
        };
        attrs.push((name, value));
    }

    Ok((tag, attrs, self_closing, i))
}

fn parse_attr_value(source: &str, i: &mut usize) -> Result<String, DomError> {
    let bytes = source.as_bytes();
    match bytes.get(*i) {
        Some(&quote) if quote == b'"' || quote == b'\'' => {
            let start = *i + 1;
            let len = source[start..]
                .find(quote as char)
                .ok_or_else(|| DomError::Parse("unclosed quoted attribute value".into()))?;
            *i = start + len + 1;
            Ok(decode_entities(&source[start..start + len]))
        }
        Some(_) => {
            let start = *i;
            while *i < bytes.len() && !bytes[*i].is_ascii_whitespace() && bytes[*i] != b'>' {
                *i += 1;
            }
            Ok(decode_entities(&source[start..*i]))
        }
        None => Err(DomError::Parse("missing attribute value".into())),
    }
}

fn parse_end_tag(source: &str, at: usize) -> Result<(String, usize), DomError> {
    let bytes = source.as_bytes();
    let mut i = at + 2;
    let start = i;
    while i < bytes.len() && is_name_char(bytes[i]) {
        i += 1;
    }
    let tag = source[start..i].to_ascii_lowercase();
    let close = source[i..]
        .find('>')
        .ok_or_else(|| DomError::Parse(format!("unclosed end tag </{}", tag)))?;
    Ok((tag, i + close + 1))
}

fn find_end_tag(source: &str, from: usize, tag: &str) -> Option<usize> {
    let lower = source[from..].to_ascii_lowercase();
    let needle = format!("</{}", tag);
    lower.find(&needle).map(|pos| from + pos)
}

fn skip_ws(bytes: &[u8], i: &mut usize) {
    while *i < bytes.len() && bytes[*i].is_ascii_whitespace() {
        *i += 1;
    }
}

fn is_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b':'
}

fn is_attr_name_char(b: u8) -> bool {
    !b.is_ascii_whitespace() && !matches!(b, b'=' | b'>' | b'/' | b'"' | b'\'')
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        let Some(end) = rest.find(';').filter(|e| *e <= 10) else {
            out.push('&');
            rest = &rest[1..];
            continue;
        };
        let entity = &rest[1..end];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some('\u{a0}'),
            _ => entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(ch) => {
                out.push(ch);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

pub(super) fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub(super) fn escape_attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_markup_with_void_and_comment() {
        let doc = parse(
            "<!DOCTYPE html><html><body><!-- nav --><form name=login>\
             <input id=\"u\" type='text' disabled><br/><p>a &amp; b</form></body></html>",
        )
        .unwrap();

        let form = doc
            .elements()
            .into_iter()
            .find(|n| doc.tag_name(*n) == Some("form"))
            .unwrap();
        assert_eq!(doc.attribute(form, "name"), Some("login"));

        let tags: Vec<_> = doc
            .element_children(form)
            .into_iter()
            .filter_map(|n| doc.tag_name(n))
            .collect();
        assert_eq!(tags, vec!["input", "br", "p"]);

        let input = doc.element_by_id("u").unwrap();
        assert_eq!(doc.attribute(input, "disabled"), Some(""));
        assert_eq!(doc.attribute(input, "type"), Some("text"));
        assert!(doc.text_content(form).contains("a & b"));
    }

    #[test]
    fn implied_end_tags_close_list_items() {
        let doc = parse("<ul><li>one<li>two<li>three</ul>").unwrap();
        let ul = doc.elements()[0];
        assert_eq!(doc.element_children(ul).len(), 3);
    }

    #[test]
    fn unclosed_comment_is_an_error() {
        assert!(matches!(parse("<div><!-- oops"), Err(DomError::Parse(_))));
    }

    #[test]
    fn outer_html_round_trips_attribute_order() {
        let doc = parse(r#"<a href="/x" class="btn primary" data-x="1 &quot;2&quot;">Go</a>"#)
            .unwrap();
        let a = doc.elements()[0];
        assert_eq!(
            doc.outer_html(a),
            r#"<a href="/x" class="btn primary" data-x="1 &quot;2&quot;">Go</a>"#
        );
    }
}
