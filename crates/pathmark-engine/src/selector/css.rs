//! CSS selector subset: type and universal selectors, `#id`, `.class`,
//! attribute selectors (`[a]`, `=`, `~=`, `^=`, `$=`, `*=`), `:nth-child(n|odd|even)`,
//! `:first-child`, `:last-child`, descendant and child combinators, and
//! comma-separated groups.

use super::SelectorError;
use crate::dom::{Document, NodeId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    selectors: Vec<ComplexSelector>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ComplexSelector {
    // Each compound carries its relation to the compound on its left.
    parts: Vec<(Option<Combinator>, Compound)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrCondition>,
    pseudos: Vec<Pseudo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrCondition {
    Exists(String),
    Equals(String, String),
    Includes(String, String),
    Prefix(String, String),
    Suffix(String, String),
    Substring(String, String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Pseudo {
    NthChild(Nth),
    FirstChild,
    LastChild,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Nth {
    Index(usize),
    Odd,
    Even,
}

pub fn parse(selector: &str) -> Result<SelectorList, SelectorError> {
    Parser::new(selector).parse_list()
}

/// First element in document order matching `selector`.
pub fn query_selector(doc: &Document, selector: &str) -> Result<Option<NodeId>, SelectorError> {
    Ok(parse(selector)?.query_first(doc))
}

impl SelectorList {
    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        doc.is_element(node)
            && self
                .selectors
                .iter()
                .any(|s| matches_complex(doc, node, &s.parts, s.parts.len() - 1))
    }

    pub fn query_first(&self, doc: &Document) -> Option<NodeId> {
        doc.elements().into_iter().find(|n| self.matches(doc, *n))
    }

    pub fn query_all(&self, doc: &Document) -> Vec<NodeId> {
        doc.elements()
            .into_iter()
            .filter(|n| self.matches(doc, *n))
            .collect()
    }
}

fn matches_complex(
    doc: &Document,
    node: NodeId,
    parts: &[(Option<Combinator>, Compound)],
    idx: usize,
) -> bool {
    let (combinator, compound) = &parts[idx];
    if !matches_compound(doc, node, compound) {
        return false;
    }
    if idx == 0 {
        return true;
    }
    match combinator.unwrap_or(Combinator::Descendant) {
        Combinator::Child => doc
            .parent(node)
            .is_some_and(|p| matches_complex(doc, p, parts, idx - 1)),
        Combinator::Descendant => {
            let mut cursor = doc.parent(node);
            while let Some(ancestor) = cursor {
                if matches_complex(doc, ancestor, parts, idx - 1) {
                    return true;
                }
                cursor = doc.parent(ancestor);
            }
            false
        }
    }
}

fn matches_compound(doc: &Document, node: NodeId, compound: &Compound) -> bool {
    let Some(tag) = doc.tag_name(node) else {
        return false;
    };
    if compound.tag.as_deref().is_some_and(|t| t != tag) {
        return false;
    }
    if let Some(id) = &compound.id
        && doc.attribute(node, "id") != Some(id.as_str())
    {
        return false;
    }
    if !compound.classes.iter().all(|c| doc.has_class(node, c)) {
        return false;
    }
    let attrs_ok = compound.attrs.iter().all(|cond| match cond {
        AttrCondition::Exists(name) => doc.attribute(node, name).is_some(),
        AttrCondition::Equals(name, value) => doc.attribute(node, name) == Some(value.as_str()),
        AttrCondition::Includes(name, value) => doc
            .attribute(node, name)
            .is_some_and(|v| v.split_whitespace().any(|t| t == value)),
        AttrCondition::Prefix(name, value) => doc
            .attribute(node, name)
            .is_some_and(|v| !value.is_empty() && v.starts_with(value.as_str())),
        AttrCondition::Suffix(name, value) => doc
            .attribute(node, name)
            .is_some_and(|v| !value.is_empty() && v.ends_with(value.as_str())),
        AttrCondition::Substring(name, value) => doc
            .attribute(node, name)
            .is_some_and(|v| !value.is_empty() && v.contains(value.as_str())),
    });
    if !attrs_ok {
        return false;
    }
    compound.pseudos.iter().all(|pseudo| {
        let Some(parent) = doc.parent(node) else {
            return false;
        };
        let siblings = doc.element_children(parent);
        let Some(pos) = siblings.iter().position(|s| *s == node) else {
            return false;
        };
        let index = pos + 1;
        match pseudo {
            Pseudo::FirstChild => index == 1,
            Pseudo::LastChild => index == siblings.len(),
            Pseudo::NthChild(Nth::Index(n)) => index == *n,
            Pseudo::NthChild(Nth::Odd) => index % 2 == 1,
            Pseudo::NthChild(Nth::Even) => index % 2 == 0,
        }
    })
}

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, reason: impl Into<String>) -> SelectorError {
        SelectorError::InvalidCss {
            selector: self.source.to_string(),
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn expect(&mut self, expected: char) -> Result<(), SelectorError> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected '{}' at position {}", expected, self.pos)))
        }
    }

    fn parse_list(&mut self) -> Result<SelectorList, SelectorError> {
        let mut selectors = Vec::new();
        loop {
            self.skip_ws();
            selectors.push(self.parse_complex()?);
            self.skip_ws();
            match self.peek() {
                None => break,
                Some(',') => self.pos += 1,
                Some(c) => return Err(self.error(format!("unexpected '{}'", c))),
            }
        }
        Ok(SelectorList { selectors })
    }

    fn parse_complex(&mut self) -> Result<ComplexSelector, SelectorError> {
        let mut parts = vec![(None, self.parse_compound()?)];
        loop {
            let had_ws = self.skip_ws();
            match self.peek() {
                None | Some(',') => break,
                Some('>') => {
                    self.pos += 1;
                    self.skip_ws();
                    parts.push((Some(Combinator::Child), self.parse_compound()?));
                }
                Some(c @ ('+' | '~')) => {
                    return Err(self.error(format!("unsupported combinator '{}'", c)));
                }
                Some(_) if had_ws => {
                    parts.push((Some(Combinator::Descendant), self.parse_compound()?));
                }
                Some(c) => return Err(self.error(format!("unexpected '{}'", c))),
            }
        }
        Ok(ComplexSelector { parts })
    }

    fn parse_compound(&mut self) -> Result<Compound, SelectorError> {
        let mut compound = Compound::default();
        let mut matched_any = false;

        if self.peek() == Some('*') {
            self.pos += 1;
            matched_any = true;
        } else if self.at_ident_start() {
            compound.tag = Some(self.parse_ident()?.to_ascii_lowercase());
            matched_any = true;
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    let id = self.parse_ident()?;
                    if compound.id.replace(id).is_some() {
                        return Err(self.error("more than one id in a compound selector"));
                    }
                }
                Some('.') => {
                    self.pos += 1;
                    compound.classes.push(self.parse_ident()?);
                }
                Some('[') => compound.attrs.push(self.parse_attr()?),
                Some(':') => compound.pseudos.push(self.parse_pseudo()?),
                _ => break,
            }
            matched_any = true;
        }

        if !matched_any {
            return Err(self.error(format!("expected a selector at position {}", self.pos)));
        }
        Ok(compound)
    }

    fn at_ident_start(&self) -> bool {
        match self.peek() {
            Some('\\') => true,
            Some('-') => self
                .peek_at(1)
                .is_some_and(|c| c == '-' || c == '\\' || is_name_start(c)),
            Some(c) => is_name_start(c),
            None => false,
        }
    }

    fn parse_ident(&mut self) -> Result<String, SelectorError> {
        if !self.at_ident_start() {
            return Err(self.error(format!("expected an identifier at position {}", self.pos)));
        }
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c == '\\' {
                self.pos += 1;
                out.push(self.parse_escape()?);
            } else if is_ident_char(c) {
                out.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        Ok(out)
    }

    fn parse_escape(&mut self) -> Result<char, SelectorError> {
        let mut hex = String::new();
        while hex.len() < 6 && self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
            hex.extend(self.peek());
            self.pos += 1;
        }
        if hex.is_empty() {
            let c = self.peek().ok_or_else(|| self.error("dangling escape"))?;
            self.pos += 1;
            return Ok(c);
        }
        if self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        let code = u32::from_str_radix(&hex, 16).map_err(|_| self.error("bad escape"))?;
        Ok(match char::from_u32(code) {
            Some(c) if code != 0 => c,
            _ => '\u{fffd}',
        })
    }

    fn parse_string(&mut self) -> Result<String, SelectorError> {
        let quote = self.peek().ok_or_else(|| self.error("expected a string"))?;
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated string")),
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some('\\') => {
                    self.pos += 1;
                    out.push(self.parse_escape()?);
                }
                Some(c) => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn parse_attr(&mut self) -> Result<AttrCondition, SelectorError> {
        self.expect('[')?;
        self.skip_ws();
        let name = self.parse_ident()?.to_ascii_lowercase();
        self.skip_ws();

        if self.peek() == Some(']') {
            self.pos += 1;
            return Ok(AttrCondition::Exists(name));
        }

        let op = match (self.peek(), self.peek_at(1)) {
            (Some('='), _) => {
                self.pos += 1;
                '='
            }
            (Some(c @ ('~' | '^' | '$' | '*')), Some('=')) => {
                self.pos += 2;
                c
            }
            _ => return Err(self.error("unsupported attribute operator")),
        };

        self.skip_ws();
        let value = match self.peek() {
            Some('"' | '\'') => self.parse_string()?,
            _ => self.parse_ident()?,
        };
        self.skip_ws();
        self.expect(']')?;

        Ok(match op {
            '~' => AttrCondition::Includes(name, value),
            '^' => AttrCondition::Prefix(name, value),
            '$' => AttrCondition::Suffix(name, value),
            '*' => AttrCondition::Substring(name, value),
            _ => AttrCondition::Equals(name, value),
        })
    }

    fn parse_pseudo(&mut self) -> Result<Pseudo, SelectorError> {
        self.expect(':')?;
        let name = self.parse_ident()?.to_ascii_lowercase();
        match name.as_str() {
            "first-child" => Ok(Pseudo::FirstChild),
            "last-child" => Ok(Pseudo::LastChild),
            "nth-child" => {
                self.expect('(')?;
                self.skip_ws();
                let start = self.pos;
                while self.peek().is_some_and(|c| c != ')') {
                    self.pos += 1;
                }
                let arg: String = self.chars[start..self.pos].iter().collect();
                self.expect(')')?;
                let nth = match arg.trim() {
                    "odd" => Nth::Odd,
                    "even" => Nth::Even,
                    n => match n.parse::<usize>() {
                        Ok(index) if index > 0 => Nth::Index(index),
                        _ => return Err(self.error(format!("unsupported :nth-child({})", n))),
                    },
                };
                Ok(Pseudo::NthChild(nth))
            }
            other => Err(self.error(format!("unsupported pseudo-class ':{}'", other))),
        }
    }
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || !c.is_ascii()
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()
}

/// Escapes a string for use as an identifier (`#id`, `.class`), following
/// the rules of `CSS.escape`.
pub fn escape_identifier(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars == ['-'] {
        return "\\-".to_string();
    }
    let mut out = String::with_capacity(value.len());
    for (i, &c) in chars.iter().enumerate() {
        let leading_digit = c.is_ascii_digit() && (i == 0 || (i == 1 && chars[0] == '-'));
        if c == '\0' {
            out.push('\u{fffd}');
        } else if ('\u{1}'..='\u{1f}').contains(&c) || c == '\u{7f}' || leading_digit {
            out.push_str(&format!("\\{:x} ", c as u32));
        } else if !c.is_ascii() || c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            out.push(c);
        } else {
            out.push('\\');
            out.push(c);
        }
    }
    out
}

/// Double-quoted CSS string literal.
pub fn quote_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\a "),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Document {
        Document::parse(
            r#"<html><body><div id="main" class="row wide"><span>A</span><b>x</b><span name="s">B</span></div></body></html>"#,
        )
        .unwrap()
    }

    #[test]
    fn nth_child_counts_all_element_siblings() {
        let doc = doc();
        let found = query_selector(&doc, "#main > span:nth-child(3)").unwrap().unwrap();
        assert_eq!(doc.attribute(found, "name"), Some("s"));
        assert!(query_selector(&doc, "#main > span:nth-child(2)").unwrap().is_none());
    }

    #[test]
    fn descendant_combinator_backtracks_through_ancestors() {
        let doc = doc();
        assert!(query_selector(&doc, "html div > span").unwrap().is_some());
        assert!(query_selector(&doc, "body > span").unwrap().is_none());
    }

    #[test]
    fn attribute_and_class_conditions() {
        let doc = doc();
        assert!(query_selector(&doc, r#"[name="s"]"#).unwrap().is_some());
        assert!(query_selector(&doc, "div.row.wide").unwrap().is_some());
        assert!(query_selector(&doc, "[class~=wide]").unwrap().is_some());
        assert!(query_selector(&doc, "div.narrow").unwrap().is_none());
    }

    #[test]
    fn malformed_selectors_are_errors() {
        for bad in ["", "div >", "#", "span:hover", "a + b", "[name=", "div)", "#1a", "#-1a"] {
            assert!(parse(bad).is_err(), "expected '{}' to be rejected", bad);
        }
    }

    #[test]
    fn escaped_identifiers_parse_back() {
        let mut doc = Document::new();
        let body = doc.create_element("body");
        doc.append_child(doc.root(), body).unwrap();
        let el = doc.create_element("div");
        doc.append_child(body, el).unwrap();
        doc.set_attribute(el, "id", "1st:item.x").unwrap();

        let selector = format!("#{}", escape_identifier("1st:item.x"));
        assert_eq!(selector, r"#\31 st\:item\.x");
        assert_eq!(query_selector(&doc, &selector).unwrap(), Some(el));
    }

    #[test]
    fn dash_then_escaped_digit_is_an_identifier() {
        let list = parse(r"#-\31 x.-\32 col").unwrap();
        let compound = &list.selectors[0].parts[0].1;
        assert_eq!(compound.id.as_deref(), Some("-1x"));
        assert_eq!(compound.classes, vec!["-2col".to_string()]);
        assert!(parse("#--x").is_ok());
    }

    #[test]
    fn quoted_values_keep_special_characters() {
        let mut doc = Document::new();
        let el = doc.create_element("input");
        doc.append_child(doc.root(), el).unwrap();
        doc.set_attribute(el, "name", r#"a "b" > c"#).unwrap();

        let selector = format!("[name={}]", quote_string(r#"a "b" > c"#));
        assert_eq!(query_selector(&doc, &selector).unwrap(), Some(el));
    }
}
