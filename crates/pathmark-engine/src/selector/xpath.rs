//! XPath 1.0 location paths over element nodes.
//!
//! Supported: `/` and `//` steps, name tests and `*`, and predicates built from
//! `or`, `and`, `=`, `!=`, numbers, string literals, `@attr`, `.`, and the
//! functions `contains`, `starts-with`, `concat`, `normalize-space`, `string`,
//! `text`, `position`, `last`, `not`, `true` and `false`. A predicate that
//! evaluates to a number is a position test.

use super::SelectorError;
use crate::dom::{Document, NodeId};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq)]
pub struct XPath {
    steps: Vec<Step>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq)]
struct Step {
    axis: Axis,
    name: Option<String>,
    predicates: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Compare {
        left: Box<Expr>,
        right: Box<Expr>,
        negate: bool,
    },
    Literal(String),
    Number(f64),
    Attribute(String),
    ContextNode,
    Call(Function, Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Function {
    Contains,
    StartsWith,
    Concat,
    NormalizeSpace,
    String,
    Text,
    Position,
    Last,
    Not,
    True,
    False,
}

impl Function {
    fn lookup(name: &str) -> Option<(Self, usize, usize)> {
        // (function, min args, max args)
        Some(match name {
            "contains" => (Self::Contains, 2, 2),
            "starts-with" => (Self::StartsWith, 2, 2),
            "concat" => (Self::Concat, 2, usize::MAX),
            "normalize-space" => (Self::NormalizeSpace, 0, 1),
            "string" => (Self::String, 0, 1),
            "text" => (Self::Text, 0, 0),
            "position" => (Self::Position, 0, 0),
            "last" => (Self::Last, 0, 0),
            "not" => (Self::Not, 1, 1),
            "true" => (Self::True, 0, 0),
            "false" => (Self::False, 0, 0),
            _ => return None,
        })
    }
}

pub fn parse(expression: &str) -> Result<XPath, SelectorError> {
    XPath::parse(expression)
}

/// All matching elements in document order.
pub fn evaluate(doc: &Document, expression: &str) -> Result<Vec<NodeId>, SelectorError> {
    Ok(XPath::parse(expression)?.evaluate(doc))
}

/// First matching element in document order.
pub fn first(doc: &Document, expression: &str) -> Result<Option<NodeId>, SelectorError> {
    Ok(XPath::parse(expression)?.evaluate(doc).into_iter().next())
}

/// Quotes `value` as an XPath string literal. Values holding both quote
/// characters become a `concat(...)` call.
pub fn literal(value: &str) -> String {
    if !value.contains('"') {
        return format!("\"{}\"", value);
    }
    if !value.contains('\'') {
        return format!("'{}'", value);
    }
    let parts: Vec<String> = value
        .split('"')
        .map(|part| format!("\"{}\"", part))
        .collect();
    format!("concat({})", parts.join(", '\"', "))
}

impl XPath {
    pub fn parse(expression: &str) -> Result<Self, SelectorError> {
        let tokens = tokenize(expression)?;
        let mut parser = Parser {
            expression,
            tokens,
            pos: 0,
        };
        let path = parser.parse_path()?;
        if let Some(token) = parser.peek() {
            return Err(parser.error(format!("unexpected {:?}", token)));
        }
        Ok(path)
    }

    pub fn evaluate(&self, doc: &Document) -> Vec<NodeId> {
        let order: HashMap<NodeId, usize> = std::iter::once(doc.root())
            .chain(doc.elements())
            .enumerate()
            .map(|(i, n)| (n, i))
            .collect();

        let mut context = vec![doc.root()];
        for step in &self.steps {
            let bases: Vec<NodeId> = match step.axis {
                Axis::Child => context,
                Axis::Descendant => {
                    let mut set = BTreeSet::new();
                    for node in &context {
                        set.insert(*node);
                        set.extend(doc.descendants(*node));
                    }
                    set.into_iter().collect()
                }
            };

            let mut selected = BTreeSet::new();
            for base in bases {
                let candidates: Vec<NodeId> = doc
                    .element_children(base)
                    .into_iter()
                    .filter(|n| match &step.name {
                        Some(name) => doc.tag_name(*n) == Some(name.as_str()),
                        None => true,
                    })
                    .collect();
                selected.extend(apply_predicates(doc, candidates, &step.predicates));
            }

            let mut next: Vec<NodeId> = selected.into_iter().collect();
            next.sort_by_key(|n| order.get(n).copied().unwrap_or(usize::MAX));
            context = next;
            if context.is_empty() {
                break;
            }
        }
        context
    }
}

fn apply_predicates(doc: &Document, mut nodes: Vec<NodeId>, predicates: &[Expr]) -> Vec<NodeId> {
    for predicate in predicates {
        let size = nodes.len();
        nodes = nodes
            .into_iter()
            .enumerate()
            .filter(|(i, node)| {
                let ctx = Context {
                    node: *node,
                    position: i + 1,
                    size,
                };
                match eval(doc, predicate, &ctx) {
                    Value::Number(n) => n == (i + 1) as f64,
                    other => other.truthy(),
                }
            })
            .map(|(_, node)| node)
            .collect();
    }
    nodes
}

struct Context {
    node: NodeId,
    position: usize,
    size: usize,
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Bool(bool),
    Number(f64),
    Str(String),
    /// String value of a node-set holding at most one node; `None` is empty.
    Node(Option<String>),
}

impl Value {
    fn truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Node(n) => n.is_some(),
        }
    }

    fn number(&self) -> f64 {
        match self {
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::Str(s) | Value::Node(Some(s)) => s.trim().parse().unwrap_or(f64::NAN),
            Value::Node(None) => f64::NAN,
        }
    }

    fn string(&self) -> String {
        match self {
            Value::Bool(b) => b.to_string(),
            Value::Number(n) if n.is_finite() && n.fract() == 0.0 => format!("{}", *n as i64),
            Value::Number(n) => n.to_string(),
            Value::Str(s) | Value::Node(Some(s)) => s.clone(),
            Value::Node(None) => String::new(),
        }
    }
}

fn compare(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Bool(b), other) | (other, Value::Bool(b)) => *b == other.truthy(),
        (Value::Number(n), other) | (other, Value::Number(n)) => *n == other.number(),
        (a, b) => a.string() == b.string(),
    }
}

fn eval(doc: &Document, expr: &Expr, ctx: &Context) -> Value {
    match expr {
        Expr::Or(a, b) => Value::Bool(eval(doc, a, ctx).truthy() || eval(doc, b, ctx).truthy()),
        Expr::And(a, b) => Value::Bool(eval(doc, a, ctx).truthy() && eval(doc, b, ctx).truthy()),
        Expr::Compare {
            left,
            right,
            negate,
        } => {
            let l = eval(doc, left, ctx);
            let r = eval(doc, right, ctx);
            // Comparisons against an empty node-set are false either way.
            if matches!(l, Value::Node(None)) || matches!(r, Value::Node(None)) {
                return Value::Bool(false);
            }
            Value::Bool(compare(&l, &r) != *negate)
        }
        Expr::Literal(s) => Value::Str(s.clone()),
        Expr::Number(n) => Value::Number(*n),
        Expr::Attribute(name) => Value::Node(doc.attribute(ctx.node, name).map(str::to_string)),
        Expr::ContextNode => Value::Node(Some(doc.text_content(ctx.node))),
        Expr::Call(function, args) => call(doc, *function, args, ctx),
    }
}

fn call(doc: &Document, function: Function, args: &[Expr], ctx: &Context) -> Value {
    let arg = |i: usize| eval(doc, &args[i], ctx);
    let arg_or_context = || match args.first() {
        Some(expr) => eval(doc, expr, ctx).string(),
        None => doc.text_content(ctx.node),
    };
    match function {
        Function::Contains => Value::Bool(arg(0).string().contains(&arg(1).string())),
        Function::StartsWith => Value::Bool(arg(0).string().starts_with(&arg(1).string())),
        Function::Concat => Value::Str(
            args.iter()
                .map(|a| eval(doc, a, ctx).string())
                .collect::<String>(),
        ),
        Function::NormalizeSpace => Value::Str(
            arg_or_context()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" "),
        ),
        Function::String => Value::Str(arg_or_context()),
        Function::Text => {
            let texts: Vec<NodeId> = doc
                .children(ctx.node)
                .iter()
                .copied()
                .filter(|c| !doc.is_element(*c))
                .collect();
            if texts.is_empty() {
                Value::Node(None)
            } else {
                Value::Node(Some(
                    texts.iter().map(|t| doc.text_content(*t)).collect(),
                ))
            }
        }
        Function::Position => Value::Number(ctx.position as f64),
        Function::Last => Value::Number(ctx.size as f64),
        Function::Not => Value::Bool(!arg(0).truthy()),
        Function::True => Value::Bool(true),
        Function::False => Value::Bool(false),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Slash,
    DoubleSlash,
    Star,
    At,
    Dot,
    Comma,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Eq,
    NotEq,
    Name(String),
    Literal(String),
    Number(f64),
}

fn tokenize(expression: &str) -> Result<Vec<Token>, SelectorError> {
    let error = |reason: String| SelectorError::InvalidXPath {
        expression: expression.to_string(),
        reason,
    };
    let chars: Vec<char> = expression.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            _ if c.is_whitespace() => i += 1,
            '/' if chars.get(i + 1) == Some(&'/') => {
                tokens.push(Token::DoubleSlash);
                i += 2;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '*' | '@' | ',' | '[' | ']' | '(' | ')' | '=' => {
                tokens.push(match c {
                    '*' => Token::Star,
                    '@' => Token::At,
                    ',' => Token::Comma,
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    _ => Token::Eq,
                });
                i += 1;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::NotEq);
                i += 2;
            }
            '"' | '\'' => {
                let start = i + 1;
                let end = chars[start..]
                    .iter()
                    .position(|ch| *ch == c)
                    .ok_or_else(|| error("unterminated string literal".into()))?;
                tokens.push(Token::Literal(chars[start..start + end].iter().collect()));
                i = start + end + 1;
            }
            '.' if !chars.get(i + 1).is_some_and(char::is_ascii_digit) => {
                tokens.push(Token::Dot);
                i += 1;
            }
            _ if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n = text
                    .parse()
                    .map_err(|_| error(format!("invalid number '{}'", text)))?;
                tokens.push(Token::Number(n));
            }
            _ if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || matches!(chars[i], '-' | '_' | '.'))
                {
                    i += 1;
                }
                tokens.push(Token::Name(chars[start..i].iter().collect()));
            }
            _ => return Err(error(format!("unexpected character '{}'", c))),
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    expression: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, reason: impl Into<String>) -> SelectorError {
        SelectorError::InvalidXPath {
            expression: self.expression.to_string(),
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), SelectorError> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(self.error(format!("expected {:?}, found {:?}", expected, token))),
            None => Err(self.error(format!("expected {:?}, found end of input", expected))),
        }
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Name(n)) if n == keyword)
    }

    fn parse_path(&mut self) -> Result<XPath, SelectorError> {
        let mut steps = Vec::new();
        let mut axis = match self.peek() {
            Some(Token::Slash) => {
                self.pos += 1;
                Axis::Child
            }
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                Axis::Descendant
            }
            _ => Axis::Child,
        };
        loop {
            steps.push(self.parse_step(axis)?);
            axis = match self.peek() {
                Some(Token::Slash) => Axis::Child,
                Some(Token::DoubleSlash) => Axis::Descendant,
                _ => break,
            };
            self.pos += 1;
        }
        Ok(XPath { steps })
    }

    fn parse_step(&mut self, axis: Axis) -> Result<Step, SelectorError> {
        let name = match self.next() {
            Some(Token::Star) => None,
            Some(Token::Name(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    return Err(self.error(format!("unsupported node test '{}()'", name)));
                }
                Some(name.to_ascii_lowercase())
            }
            Some(token) => return Err(self.error(format!("expected a step, found {:?}", token))),
            None => return Err(self.error("expected a step, found end of input")),
        };
        let mut predicates = Vec::new();
        while self.peek() == Some(&Token::LBracket) {
            self.pos += 1;
            predicates.push(self.parse_or()?);
            self.expect(Token::RBracket)?;
        }
        Ok(Step {
            axis,
            name,
            predicates,
        })
    }

    fn parse_or(&mut self) -> Result<Expr, SelectorError> {
        let mut left = self.parse_and()?;
        while self.peek_keyword("or") {
            self.pos += 1;
            left = Expr::Or(Box::new(left), Box::new(self.parse_and()?));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, SelectorError> {
        let mut left = self.parse_comparison()?;
        while self.peek_keyword("and") {
            self.pos += 1;
            left = Expr::And(Box::new(left), Box::new(self.parse_comparison()?));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, SelectorError> {
        let left = self.parse_primary()?;
        let negate = match self.peek() {
            Some(Token::Eq) => false,
            Some(Token::NotEq) => true,
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.parse_primary()?;
        Ok(Expr::Compare {
            left: Box::new(left),
            right: Box::new(right),
            negate,
        })
    }

    fn parse_primary(&mut self) -> Result<Expr, SelectorError> {
        match self.next() {
            Some(Token::Literal(s)) => Ok(Expr::Literal(s)),
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Dot) => Ok(Expr::ContextNode),
            Some(Token::At) => match self.next() {
                Some(Token::Name(name)) => Ok(Expr::Attribute(name)),
                _ => Err(self.error("expected an attribute name after '@'")),
            },
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Name(name)) => {
                let (function, min, max) = Function::lookup(&name)
                    .ok_or_else(|| self.error(format!("unknown function '{}'", name)))?;
                self.expect(Token::LParen)?;
                let mut args = Vec::new();
                if self.peek() != Some(&Token::RParen) {
                    loop {
                        args.push(self.parse_or()?);
                        if self.peek() == Some(&Token::Comma) {
                            self.pos += 1;
                        } else {
                            break;
                        }
                    }
                }
                self.expect(Token::RParen)?;
                if args.len() < min || args.len() > max {
                    return Err(self.error(format!(
                        "{}() takes {} argument(s), got {}",
                        name,
                        if min == max {
                            min.to_string()
                        } else {
                            format!("at least {}", min)
                        },
                        args.len()
                    )));
                }
                Ok(Expr::Call(function, args))
            }
            Some(token) => Err(self.error(format!("unexpected {:?} in predicate", token))),
            None => Err(self.error("unexpected end of input in predicate")),
        }
    }
}
