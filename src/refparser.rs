//! A small bundled reference implementation of the [`ParsedPath`]/
//! [`ParsedSegment`] contract, for callers (and this crate's own
//! integration tests) that don't already have a JSONPath parser on hand.
//!
//! This is deliberately not a complete RFC 9535 parser — no function
//! extensions, no `@` path operands nested more than a plain field chain —
//! only enough syntax to drive names, indexes, slices, wildcards,
//! descendants, and a small `&&`/`||`/`!`/parens filter grammar over
//! `@.field`/`$.field` comparisons and existence checks.

use crate::parsed::{OwnedPath, OwnedSegment};
use crate::selector::{FilterPredicate, Selector};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Parse errors from the reference parser, each naming the byte offset (or
/// offending text) where parsing failed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum JsonPathParseError {
    #[error("expected '$' at the start of the path (byte {pos})")]
    MissingRoot { pos: usize },
    #[error("unexpected character {found:?} at byte {pos}")]
    UnexpectedChar { found: char, pos: usize },
    #[error("unterminated bracket starting at byte {pos}")]
    UnterminatedBracket { pos: usize },
    #[error("invalid slice syntax: {text:?}")]
    InvalidSlice { text: String },
    #[error("invalid selector: {text:?}")]
    InvalidSelector { text: String },
    #[error("invalid filter expression: {text:?}")]
    InvalidFilter { text: String },
}

type ParseResult<T> = Result<T, JsonPathParseError>;

/// Parse a single JSONPath expression (e.g. `$.a.b[0,2:5]..c[?(@.x > 1)]`)
/// into an [`OwnedPath`] the core's compiler can fold directly.
pub fn parse(path: &str) -> ParseResult<OwnedPath> {
    let mut cur = Cursor::new(path);
    cur.skip_ws();
    if cur.peek() != Some('$') {
        return Err(JsonPathParseError::MissingRoot { pos: cur.pos });
    }
    cur.advance();

    let mut segments = Vec::new();
    loop {
        cur.skip_ws();
        if cur.eof() {
            break;
        }
        if cur.starts_with("..") {
            cur.advance_n(2);
            segments.push(parse_descendant_segment(&mut cur)?);
        } else if cur.peek() == Some('.') {
            cur.advance();
            segments.push(parse_dot_segment(&mut cur)?);
        } else if cur.peek() == Some('[') {
            let selectors = parse_bracket(&mut cur)?;
            segments.push(OwnedSegment::new(false, selectors));
        } else {
            return Err(JsonPathParseError::UnexpectedChar {
                found: cur.peek().unwrap_or('\0'),
                pos: cur.pos,
            });
        }
    }
    Ok(OwnedPath::new(segments))
}

fn parse_descendant_segment(cur: &mut Cursor) -> ParseResult<OwnedSegment> {
    if cur.peek() == Some('[') {
        let selectors = parse_bracket(cur)?;
        Ok(OwnedSegment::new(true, selectors))
    } else if cur.peek() == Some('*') {
        cur.advance();
        Ok(OwnedSegment::new(true, vec![Selector::Wildcard]))
    } else {
        let name = parse_ident(cur)?;
        Ok(OwnedSegment::new(true, vec![Selector::Name(name)]))
    }
}

fn parse_dot_segment(cur: &mut Cursor) -> ParseResult<OwnedSegment> {
    if cur.peek() == Some('*') {
        cur.advance();
        Ok(OwnedSegment::new(false, vec![Selector::Wildcard]))
    } else {
        let name = parse_ident(cur)?;
        Ok(OwnedSegment::new(false, vec![Selector::Name(name)]))
    }
}

fn parse_ident(cur: &mut Cursor) -> ParseResult<String> {
    let start = cur.pos;
    while let Some(c) = cur.peek() {
        if c.is_alphanumeric() || c == '_' {
            cur.advance();
        } else {
            break;
        }
    }
    if cur.pos == start {
        return Err(JsonPathParseError::UnexpectedChar {
            found: cur.peek().unwrap_or('\0'),
            pos: cur.pos,
        });
    }
    Ok(cur.src[start..cur.pos].to_string())
}

/// Consume a `[...]` bracket segment and split its content into
/// comma-separated selector tokens, respecting quotes and nested
/// brackets/parens (filters can contain both).
fn parse_bracket(cur: &mut Cursor) -> ParseResult<Vec<Selector>> {
    let open_pos = cur.pos;
    cur.advance(); // '['
    let content_start = cur.pos;
    let mut depth = 0i32;
    let mut in_string: Option<char> = None;
    let end;
    loop {
        match cur.peek() {
            None => return Err(JsonPathParseError::UnterminatedBracket { pos: open_pos }),
            Some(c) => {
                if let Some(q) = in_string {
                    cur.advance();
                    if c == '\\' {
                        cur.advance();
                    } else if c == q {
                        in_string = None;
                    }
                } else {
                    match c {
                        '\'' | '"' => {
                            in_string = Some(c);
                            cur.advance();
                        }
                        '[' | '(' => {
                            depth += 1;
                            cur.advance();
                        }
                        ']' if depth == 0 => {
                            end = cur.pos;
                            cur.advance();
                            break;
                        }
                        ']' | ')' => {
                            depth -= 1;
                            cur.advance();
                        }
                        _ => {
                            cur.advance();
                        }
                    }
                }
            }
        }
    }
    let content = &cur.src[content_start..end];
    split_top_level_commas(content)
        .into_iter()
        .map(|tok| parse_selector_token(tok.trim()))
        .collect()
}

fn split_top_level_commas(content: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut in_string: Option<char> = None;
    let mut start = 0usize;
    let chars: Vec<(usize, char)> = content.char_indices().collect();
    let mut idx = 0usize;
    while idx < chars.len() {
        let (pos, c) = chars[idx];
        if let Some(q) = in_string {
            if c == '\\' {
                idx += 1;
            } else if c == q {
                in_string = None;
            }
        } else {
            match c {
                '\'' | '"' => in_string = Some(c),
                '[' | '(' => depth += 1,
                ']' | ')' => depth -= 1,
                ',' if depth == 0 => {
                    out.push(&content[start..pos]);
                    start = pos + c.len_utf8();
                }
                _ => {}
            }
        }
        idx += 1;
    }
    out.push(&content[start..]);
    out
}

fn parse_selector_token(tok: &str) -> ParseResult<Selector> {
    if tok == "*" {
        return Ok(Selector::Wildcard);
    }
    if let Some(rest) = tok.strip_prefix('?') {
        let source = tok.to_string();
        let inner = strip_wrapping_parens(rest.trim());
        let ast = parse_filter_expr(inner)?;
        return Ok(Selector::Filter(Arc::new(RefFilter { source, ast })));
    }
    if tok.starts_with('\'') || tok.starts_with('"') {
        let name = parse_string_literal(tok)?;
        return Ok(Selector::Name(name));
    }
    if tok.contains(':') {
        return parse_slice_token(tok);
    }
    tok.parse::<i64>()
        .map(Selector::Index)
        .map_err(|_| JsonPathParseError::InvalidSelector {
            text: tok.to_string(),
        })
}

fn parse_slice_token(tok: &str) -> ParseResult<Selector> {
    let parts: Vec<&str> = tok.split(':').collect();
    if parts.len() > 3 {
        return Err(JsonPathParseError::InvalidSlice {
            text: tok.to_string(),
        });
    }
    let parse_part = |s: &str| -> ParseResult<Option<i64>> {
        let s = s.trim();
        if s.is_empty() {
            Ok(None)
        } else {
            s.parse::<i64>().map(Some).map_err(|_| JsonPathParseError::InvalidSlice {
                text: tok.to_string(),
            })
        }
    };
    let start = parse_part(parts[0])?;
    let end = if parts.len() > 1 { parse_part(parts[1])? } else { None };
    let step = if parts.len() > 2 { parse_part(parts[2])? } else { None };
    Ok(Selector::Slice { start, end, step })
}

fn parse_string_literal(tok: &str) -> ParseResult<String> {
    let quote = tok.chars().next().ok_or_else(|| JsonPathParseError::InvalidSelector {
        text: tok.to_string(),
    })?;
    if tok.len() < 2 || !tok.ends_with(quote) {
        return Err(JsonPathParseError::InvalidSelector {
            text: tok.to_string(),
        });
    }
    Ok(unescape(&tok[quote.len_utf8()..tok.len() - quote.len_utf8()]))
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn strip_wrapping_parens(s: &str) -> &str {
    let mut s = s.trim();
    while s.starts_with('(') && s.ends_with(')') && parens_fully_wrap(s) {
        s = s[1..s.len() - 1].trim();
    }
    s
}

fn parens_fully_wrap(s: &str) -> bool {
    let mut depth = 0i32;
    let last = s.len() - 1;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 && i != last {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

// ---- filter grammar: `@.field OP literal`, `@.field`/`$.field` existence,
// `&&`/`||`/`!`/parens over those (spec §6 "small filter grammar"). ----

#[derive(Debug, Clone)]
struct RefFilter {
    source: String,
    ast: FilterAst,
}

impl FilterPredicate for RefFilter {
    fn evaluate(&self, current: &Value, root: &Value) -> bool {
        eval_ast(&self.ast, current, root)
    }

    fn canonical(&self) -> &str {
        &self.source
    }
}

#[derive(Debug, Clone)]
enum FilterAst {
    Cmp {
        left: Operand,
        op: CmpOp,
        right: Operand,
    },
    Exists {
        operand: Operand,
    },
    Not(Box<FilterAst>),
    And(Box<FilterAst>, Box<FilterAst>),
    Or(Box<FilterAst>, Box<FilterAst>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone)]
enum Operand {
    CurrentField(Vec<String>),
    RootField(Vec<String>),
    Literal(Value),
}

fn eval_ast(ast: &FilterAst, current: &Value, root: &Value) -> bool {
    match ast {
        FilterAst::Cmp { left, op, right } => {
            match (resolve(left, current, root), resolve(right, current, root)) {
                (Some(l), Some(r)) => compare(*op, &l, &r),
                _ => false,
            }
        }
        FilterAst::Exists { operand } => resolve(operand, current, root).is_some(),
        FilterAst::Not(inner) => !eval_ast(inner, current, root),
        FilterAst::And(a, b) => eval_ast(a, current, root) && eval_ast(b, current, root),
        FilterAst::Or(a, b) => eval_ast(a, current, root) || eval_ast(b, current, root),
    }
}

fn resolve(operand: &Operand, current: &Value, root: &Value) -> Option<Value> {
    match operand {
        Operand::Literal(v) => Some(v.clone()),
        Operand::CurrentField(fields) => resolve_fields(current, fields),
        Operand::RootField(fields) => resolve_fields(root, fields),
    }
}

fn resolve_fields(base: &Value, fields: &[String]) -> Option<Value> {
    let mut cur = base.clone();
    for f in fields {
        cur = cur.as_object()?.get(f)?.clone();
    }
    Some(cur)
}

fn compare(op: CmpOp, a: &Value, b: &Value) -> bool {
    match op {
        CmpOp::Eq => a == b,
        CmpOp::Ne => a != b,
        CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => numeric_cmp(op, x, y),
            _ => match (a.as_str(), b.as_str()) {
                (Some(x), Some(y)) => lexical_cmp(op, x, y),
                _ => false,
            },
        },
    }
}

fn numeric_cmp(op: CmpOp, x: f64, y: f64) -> bool {
    match op {
        CmpOp::Lt => x < y,
        CmpOp::Le => x <= y,
        CmpOp::Gt => x > y,
        CmpOp::Ge => x >= y,
        CmpOp::Eq | CmpOp::Ne => unreachable!("handled by caller"),
    }
}

fn lexical_cmp(op: CmpOp, x: &str, y: &str) -> bool {
    match op {
        CmpOp::Lt => x < y,
        CmpOp::Le => x <= y,
        CmpOp::Gt => x > y,
        CmpOp::Ge => x >= y,
        CmpOp::Eq | CmpOp::Ne => unreachable!("handled by caller"),
    }
}

struct FCursor<'a> {
    s: &'a str,
    pos: usize,
}

impl<'a> FCursor<'a> {
    fn new(s: &'a str) -> Self {
        Self { s, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.s[self.pos..]
    }

    fn eof(&self) -> bool {
        self.pos >= self.s.len()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn advance_n(&mut self, n: usize) {
        for _ in 0..n {
            self.advance();
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t' | '\n' | '\r')) {
            self.advance();
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }
}

fn parse_filter_expr(inner: &str) -> ParseResult<FilterAst> {
    let mut c = FCursor::new(inner);
    let ast = parse_or(&mut c)?;
    c.skip_ws();
    if !c.eof() {
        return Err(JsonPathParseError::InvalidFilter {
            text: inner.to_string(),
        });
    }
    Ok(ast)
}

fn parse_or(c: &mut FCursor) -> ParseResult<FilterAst> {
    let mut left = parse_and(c)?;
    loop {
        c.skip_ws();
        if c.starts_with("||") {
            c.advance_n(2);
            let right = parse_and(c)?;
            left = FilterAst::Or(Box::new(left), Box::new(right));
        } else {
            break;
        }
    }
    Ok(left)
}

fn parse_and(c: &mut FCursor) -> ParseResult<FilterAst> {
    let mut left = parse_unary(c)?;
    loop {
        c.skip_ws();
        if c.starts_with("&&") {
            c.advance_n(2);
            let right = parse_unary(c)?;
            left = FilterAst::And(Box::new(left), Box::new(right));
        } else {
            break;
        }
    }
    Ok(left)
}

fn parse_unary(c: &mut FCursor) -> ParseResult<FilterAst> {
    c.skip_ws();
    if c.peek() == Some('!') {
        c.advance();
        let inner = parse_unary(c)?;
        return Ok(FilterAst::Not(Box::new(inner)));
    }
    if c.peek() == Some('(') {
        c.advance();
        let inner = parse_or(c)?;
        c.skip_ws();
        if c.peek() != Some(')') {
            return Err(JsonPathParseError::InvalidFilter {
                text: c.rest().to_string(),
            });
        }
        c.advance();
        return Ok(inner);
    }
    parse_comparison_or_existence(c)
}

fn parse_comparison_or_existence(c: &mut FCursor) -> ParseResult<FilterAst> {
    let left = parse_operand(c)?;
    c.skip_ws();
    if let Some(op) = try_parse_op(c) {
        let right = parse_operand(c)?;
        Ok(FilterAst::Cmp { left, op, right })
    } else {
        match left {
            Operand::Literal(_) => Err(JsonPathParseError::InvalidFilter {
                text: c.rest().to_string(),
            }),
            operand => Ok(FilterAst::Exists { operand }),
        }
    }
}

fn try_parse_op(c: &mut FCursor) -> Option<CmpOp> {
    const OPS: &[(&str, CmpOp)] = &[
        ("==", CmpOp::Eq),
        ("!=", CmpOp::Ne),
        ("<=", CmpOp::Le),
        (">=", CmpOp::Ge),
        ("<", CmpOp::Lt),
        (">", CmpOp::Gt),
    ];
    for &(text, op) in OPS {
        if c.starts_with(text) {
            c.advance_n(text.len());
            return Some(op);
        }
    }
    None
}

fn parse_operand(c: &mut FCursor) -> ParseResult<Operand> {
    c.skip_ws();
    match c.peek() {
        Some('@') => {
            c.advance();
            Ok(Operand::CurrentField(parse_field_chain(c)?))
        }
        Some('$') => {
            c.advance();
            Ok(Operand::RootField(parse_field_chain(c)?))
        }
        Some('\'') | Some('"') => Ok(Operand::Literal(Value::String(parse_quoted(c)?))),
        Some(d) if d.is_ascii_digit() || d == '-' => Ok(Operand::Literal(parse_number(c)?)),
        _ => {
            if c.starts_with("true") {
                c.advance_n(4);
                Ok(Operand::Literal(Value::Bool(true)))
            } else if c.starts_with("false") {
                c.advance_n(5);
                Ok(Operand::Literal(Value::Bool(false)))
            } else if c.starts_with("null") {
                c.advance_n(4);
                Ok(Operand::Literal(Value::Null))
            } else {
                Err(JsonPathParseError::InvalidFilter {
                    text: c.rest().to_string(),
                })
            }
        }
    }
}

fn parse_field_chain(c: &mut FCursor) -> ParseResult<Vec<String>> {
    let mut fields = Vec::new();
    loop {
        if c.peek() == Some('.') {
            c.advance();
            let start = c.pos;
            while matches!(c.peek(), Some(ch) if ch.is_alphanumeric() || ch == '_') {
                c.advance();
            }
            if c.pos == start {
                return Err(JsonPathParseError::InvalidFilter {
                    text: c.rest().to_string(),
                });
            }
            fields.push(c.s[start..c.pos].to_string());
        } else if c.peek() == Some('[') {
            c.advance();
            c.skip_ws();
            let name = parse_quoted(c)?;
            c.skip_ws();
            if c.peek() != Some(']') {
                return Err(JsonPathParseError::InvalidFilter {
                    text: c.rest().to_string(),
                });
            }
            c.advance();
            fields.push(name);
        } else {
            break;
        }
    }
    Ok(fields)
}

fn parse_quoted(c: &mut FCursor) -> ParseResult<String> {
    let quote = match c.peek() {
        Some(q @ ('\'' | '"')) => q,
        _ => {
            return Err(JsonPathParseError::InvalidFilter {
                text: c.rest().to_string(),
            })
        }
    };
    c.advance();
    let start = c.pos;
    loop {
        match c.peek() {
            None => {
                return Err(JsonPathParseError::InvalidFilter {
                    text: c.s[start..].to_string(),
                })
            }
            Some(ch) if ch == quote => {
                let raw = &c.s[start..c.pos];
                c.advance();
                return Ok(unescape(raw));
            }
            Some('\\') => {
                c.advance();
                c.advance();
            }
            Some(_) => {
                c.advance();
            }
        }
    }
}

fn parse_number(c: &mut FCursor) -> ParseResult<Value> {
    let start = c.pos;
    if c.peek() == Some('-') {
        c.advance();
    }
    while matches!(c.peek(), Some(d) if d.is_ascii_digit()) {
        c.advance();
    }
    if c.peek() == Some('.') {
        c.advance();
        while matches!(c.peek(), Some(d) if d.is_ascii_digit()) {
            c.advance();
        }
    }
    let text = &c.s[start..c.pos];
    text.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| JsonPathParseError::InvalidFilter {
            text: text.to_string(),
        })
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn eof(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn advance_n(&mut self, n: usize) {
        for _ in 0..n {
            self.advance();
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t' | '\n' | '\r')) {
            self.advance();
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }
}
