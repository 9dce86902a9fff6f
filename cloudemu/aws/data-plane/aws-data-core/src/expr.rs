//! Expression evaluator (B): recursive-descent parser/evaluator for
//! the three expression dialects share one AST and one tokenizer:
//! condition expressions (`attribute_exists(#a) AND #b > :v`), filter
//! expressions (same grammar as condition, evaluated post-retrieval),
//! and update expressions (`SET`/`REMOVE`/`ADD`/`DELETE` statements).
//!
//! Placeholders: `#name` resolves through the caller-supplied
//! `expression_attribute_names` map to a real attribute name; `:value`
//! resolves through `expression_attribute_values` to a JSON value.

use crate::error::{EmulatorError, Result};
use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use std::iter::Peekable;
use std::str::Chars;

pub type Names = HashMap<String, String>;
pub type Values = HashMap<String, Value>;

// ---------------------------------------------------------------- tokens

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    HashName(String),
    ColonValue(String),
    Number(f64),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    Comma,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    End,
}

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(s: &'a str) -> Self {
        Lexer { chars: s.chars().peekable() }
    }

    fn tokenize(mut self) -> Result<Vec<Tok>> {
        let mut out = Vec::new();
        loop {
            self.skip_ws();
            let Some(&c) = self.chars.peek() else {
                out.push(Tok::End);
                break;
            };
            match c {
                '(' => { self.chars.next(); out.push(Tok::LParen); }
                ')' => { self.chars.next(); out.push(Tok::RParen); }
                '[' => { self.chars.next(); out.push(Tok::LBracket); }
                ']' => { self.chars.next(); out.push(Tok::RBracket); }
                '.' => { self.chars.next(); out.push(Tok::Dot); }
                ',' => { self.chars.next(); out.push(Tok::Comma); }
                '+' => { self.chars.next(); out.push(Tok::Plus); }
                '-' => { self.chars.next(); out.push(Tok::Minus); }
                '=' => { self.chars.next(); out.push(Tok::Eq); }
                '<' => {
                    self.chars.next();
                    if self.chars.peek() == Some(&'=') { self.chars.next(); out.push(Tok::Le); }
                    else if self.chars.peek() == Some(&'>') { self.chars.next(); out.push(Tok::Ne); }
                    else { out.push(Tok::Lt); }
                }
                '>' => {
                    self.chars.next();
                    if self.chars.peek() == Some(&'=') { self.chars.next(); out.push(Tok::Ge); }
                    else { out.push(Tok::Gt); }
                }
                '#' => {
                    self.chars.next();
                    out.push(Tok::HashName(self.read_ident()));
                }
                ':' => {
                    self.chars.next();
                    out.push(Tok::ColonValue(self.read_ident()));
                }
                c if c.is_ascii_digit() => {
                    out.push(Tok::Number(self.read_number()));
                }
                c if c.is_alphabetic() || c == '_' => {
                    out.push(Tok::Ident(self.read_ident()));
                }
                other => {
                    return Err(EmulatorError::MalformedExpression(format!(
                        "unexpected character '{other}' in expression"
                    )))
                }
            }
        }
        Ok(out)
    }

    fn skip_ws(&mut self) {
        while matches!(self.chars.peek(), Some(c) if c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn read_ident(&mut self) -> String {
        let mut s = String::new();
        while matches!(self.chars.peek(), Some(c) if c.is_alphanumeric() || *c == '_') {
            s.push(self.chars.next().unwrap());
        }
        s
    }

    fn read_number(&mut self) -> f64 {
        let mut s = String::new();
        while matches!(self.chars.peek(), Some(c) if c.is_ascii_digit() || *c == '.') {
            s.push(self.chars.next().unwrap());
        }
        s.parse().unwrap_or(0.0)
    }
}

// ------------------------------------------------------------------ AST

#[derive(Debug, Clone)]
enum Operand {
    Path(Vec<PathSeg>),
    Value(Value),
    Size(Box<Operand>),
    IfNotExists(Box<Operand>, Box<Operand>),
    ListAppend(Box<Operand>, Box<Operand>),
}

#[derive(Debug, Clone)]
enum PathSeg {
    Field(String),
    Index(usize),
}

#[derive(Debug, Clone)]
enum Cond {
    And(Box<Cond>, Box<Cond>),
    Or(Box<Cond>, Box<Cond>),
    Not(Box<Cond>),
    Cmp(Operand, CmpOp, Operand),
    Between(Operand, Operand, Operand),
    In(Operand, Vec<Operand>),
    BeginsWith(Operand, Operand),
    Contains(Operand, Operand),
    AttrExists(Operand),
    AttrNotExists(Operand),
    AttrType(Operand, Operand),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

// --------------------------------------------------------------- parser

struct Parser<'a> {
    toks: Vec<Tok>,
    pos: usize,
    names: &'a Names,
    values: &'a Values,
}

impl<'a> Parser<'a> {
    fn new(toks: Vec<Tok>, names: &'a Names, values: &'a Values) -> Self {
        Parser { toks, pos: 0, names, values }
    }

    fn peek(&self) -> &Tok {
        &self.toks[self.pos]
    }

    fn advance(&mut self) -> Tok {
        let t = self.toks[self.pos].clone();
        if self.pos + 1 < self.toks.len() {
            self.pos += 1;
        }
        t
    }

    fn expect_ident(&mut self, want: &str) -> Result<()> {
        match self.advance() {
            Tok::Ident(s) if s.eq_ignore_ascii_case(want) => Ok(()),
            other => Err(EmulatorError::MalformedExpression(format!(
                "expected '{want}', found {other:?}"
            ))),
        }
    }

    fn is_ident(&self, want: &str) -> bool {
        matches!(self.peek(), Tok::Ident(s) if s.eq_ignore_ascii_case(want))
    }

    // --- condition / filter grammar ---

    fn parse_condition(&mut self) -> Result<Cond> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Cond> {
        let mut left = self.parse_and()?;
        while self.is_ident("OR") {
            self.advance();
            let right = self.parse_and()?;
            left = Cond::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Cond> {
        let mut left = self.parse_not()?;
        while self.is_ident("AND") {
            self.advance();
            let right = self.parse_not()?;
            left = Cond::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Cond> {
        if self.is_ident("NOT") {
            self.advance();
            return Ok(Cond::Not(Box::new(self.parse_not()?)));
        }
        self.parse_primary_cond()
    }

    fn parse_primary_cond(&mut self) -> Result<Cond> {
        if matches!(self.peek(), Tok::LParen) {
            self.advance();
            let c = self.parse_or()?;
            match self.advance() {
                Tok::RParen => return Ok(c),
                other => return Err(EmulatorError::MalformedExpression(format!("expected ), found {other:?}"))),
            }
        }

        // function-call predicates
        if let Tok::Ident(name) = self.peek().clone() {
            let lname = name.to_ascii_lowercase();
            if matches!(self.toks.get(self.pos + 1), Some(Tok::LParen))
                && matches!(
                    lname.as_str(),
                    "attribute_exists" | "attribute_not_exists" | "begins_with" | "contains" | "attribute_type"
                )
            {
                self.advance(); // name
                self.advance(); // (
                let args = self.parse_operand_list()?;
                match self.advance() {
                    Tok::RParen => {}
                    other => return Err(EmulatorError::MalformedExpression(format!("expected ), found {other:?}"))),
                }
                return match lname.as_str() {
                    "attribute_exists" => Ok(Cond::AttrExists(args.into_iter().next().ok_or_else(no_args)?)),
                    "attribute_not_exists" => Ok(Cond::AttrNotExists(args.into_iter().next().ok_or_else(no_args)?)),
                    "begins_with" => {
                        let mut it = args.into_iter();
                        Ok(Cond::BeginsWith(it.next().ok_or_else(no_args)?, it.next().ok_or_else(no_args)?))
                    }
                    "contains" => {
                        let mut it = args.into_iter();
                        Ok(Cond::Contains(it.next().ok_or_else(no_args)?, it.next().ok_or_else(no_args)?))
                    }
                    "attribute_type" => {
                        let mut it = args.into_iter();
                        Ok(Cond::AttrType(it.next().ok_or_else(no_args)?, it.next().ok_or_else(no_args)?))
                    }
                    _ => unreachable!(),
                };
            }
        }

        let left = self.parse_operand()?;

        if self.is_ident("BETWEEN") {
            self.advance();
            let low = self.parse_operand()?;
            self.expect_ident("AND")?;
            let high = self.parse_operand()?;
            return Ok(Cond::Between(left, low, high));
        }
        if self.is_ident("IN") {
            self.advance();
            match self.advance() {
                Tok::LParen => {}
                other => return Err(EmulatorError::MalformedExpression(format!("expected ( after IN, found {other:?}"))),
            }
            let items = self.parse_operand_list()?;
            match self.advance() {
                Tok::RParen => {}
                other => return Err(EmulatorError::MalformedExpression(format!("expected ), found {other:?}"))),
            }
            return Ok(Cond::In(left, items));
        }

        let op = match self.advance() {
            Tok::Eq => CmpOp::Eq,
            Tok::Ne => CmpOp::Ne,
            Tok::Lt => CmpOp::Lt,
            Tok::Le => CmpOp::Le,
            Tok::Gt => CmpOp::Gt,
            Tok::Ge => CmpOp::Ge,
            other => return Err(EmulatorError::MalformedExpression(format!("expected comparison operator, found {other:?}"))),
        };
        let right = self.parse_operand()?;
        Ok(Cond::Cmp(left, op, right))
    }

    fn parse_operand_list(&mut self) -> Result<Vec<Operand>> {
        let mut out = vec![self.parse_operand()?];
        while matches!(self.peek(), Tok::Comma) {
            self.advance();
            out.push(self.parse_operand()?);
        }
        Ok(out)
    }

    fn parse_operand(&mut self) -> Result<Operand> {
        if let Tok::Ident(name) = self.peek().clone() {
            let lname = name.to_ascii_lowercase();
            if matches!(self.toks.get(self.pos + 1), Some(Tok::LParen)) {
                match lname.as_str() {
                    "size" => {
                        self.advance();
                        self.advance();
                        let inner = self.parse_operand()?;
                        match self.advance() {
                            Tok::RParen => {}
                            other => return Err(EmulatorError::MalformedExpression(format!("expected ), found {other:?}"))),
                        }
                        return Ok(Operand::Size(Box::new(inner)));
                    }
                    "if_not_exists" => {
                        self.advance();
                        self.advance();
                        let a = self.parse_operand()?;
                        match self.advance() {
                            Tok::Comma => {}
                            other => return Err(EmulatorError::MalformedExpression(format!("expected , found {other:?}"))),
                        }
                        let b = self.parse_operand()?;
                        match self.advance() {
                            Tok::RParen => {}
                            other => return Err(EmulatorError::MalformedExpression(format!("expected ), found {other:?}"))),
                        }
                        return Ok(Operand::IfNotExists(Box::new(a), Box::new(b)));
                    }
                    "list_append" => {
                        self.advance();
                        self.advance();
                        let a = self.parse_operand()?;
                        match self.advance() {
                            Tok::Comma => {}
                            other => return Err(EmulatorError::MalformedExpression(format!("expected , found {other:?}"))),
                        }
                        let b = self.parse_operand()?;
                        match self.advance() {
                            Tok::RParen => {}
                            other => return Err(EmulatorError::MalformedExpression(format!("expected ), found {other:?}"))),
                        }
                        return Ok(Operand::ListAppend(Box::new(a), Box::new(b)));
                    }
                    _ => {}
                }
            }
        }
        self.parse_path_or_value()
    }

    fn parse_path_or_value(&mut self) -> Result<Operand> {
        match self.advance() {
            Tok::HashName(n) => {
                let real = self.names.get(&n).cloned().unwrap_or(n);
                Ok(Operand::Path(self.parse_path_tail(real)?))
            }
            Tok::Ident(n) => Ok(Operand::Path(self.parse_path_tail(n)?)),
            Tok::ColonValue(v) => {
                let val = self.values.get(&v).cloned().ok_or_else(|| {
                    EmulatorError::MalformedExpression(format!("no value supplied for :{v}"))
                })?;
                Ok(Operand::Value(val))
            }
            Tok::Number(n) => Ok(Operand::Value(Value::Number(
                Number::from_f64(n).unwrap_or_else(|| Number::from(0)),
            ))),
            other => Err(EmulatorError::MalformedExpression(format!("unexpected token {other:?}"))),
        }
    }

    fn parse_path_tail(&mut self, first: String) -> Result<Vec<PathSeg>> {
        let mut segs = vec![PathSeg::Field(first)];
        loop {
            match self.peek() {
                Tok::Dot => {
                    self.advance();
                    match self.advance() {
                        Tok::HashName(n) => segs.push(PathSeg::Field(self.names.get(&n).cloned().unwrap_or(n))),
                        Tok::Ident(n) => segs.push(PathSeg::Field(n)),
                        other => return Err(EmulatorError::MalformedExpression(format!("expected name after ., found {other:?}"))),
                    }
                }
                Tok::LBracket => {
                    self.advance();
                    match self.advance() {
                        Tok::Number(n) => segs.push(PathSeg::Index(n as usize)),
                        other => return Err(EmulatorError::MalformedExpression(format!("expected index, found {other:?}"))),
                    }
                    match self.advance() {
                        Tok::RBracket => {}
                        other => return Err(EmulatorError::MalformedExpression(format!("expected ], found {other:?}"))),
                    }
                }
                _ => break,
            }
        }
        Ok(segs)
    }
}

fn no_args() -> EmulatorError {
    EmulatorError::MalformedExpression("function called with too few arguments".into())
}

// ---------------------------------------------------------------- eval

fn resolve_path<'a>(item: &'a Map<String, Value>, segs: &[PathSeg]) -> Option<&'a Value> {
    let (first, rest) = segs.split_first()?;
    let PathSeg::Field(name) = first else { return None };
    let mut current = item.get(name)?;
    for seg in rest {
        current = match (seg, current) {
            (PathSeg::Field(n), Value::Object(m)) => m.get(n)?,
            (PathSeg::Index(i), Value::Array(a)) => a.get(*i)?,
            _ => return None,
        };
    }
    Some(current)
}

fn eval_operand(item: &Map<String, Value>, op: &Operand) -> Option<Value> {
    match op {
        Operand::Path(segs) => resolve_path(item, segs).cloned(),
        Operand::Value(v) => Some(v.clone()),
        Operand::Size(inner) => {
            let v = eval_operand(item, inner)?;
            let n = match v {
                Value::String(s) => s.chars().count(),
                Value::Array(a) => a.len(),
                Value::Object(m) => m.len(),
                _ => return None,
            };
            Some(Value::Number(Number::from(n)))
        }
        Operand::IfNotExists(path, fallback) => {
            Some(eval_operand(item, path).unwrap_or_else(|| eval_operand(item, fallback).unwrap_or(Value::Null)))
        }
        Operand::ListAppend(a, b) => {
            let mut av = match eval_operand(item, a) {
                Some(Value::Array(a)) => a,
                _ => Vec::new(),
            };
            if let Some(Value::Array(bv)) = eval_operand(item, b) {
                av.extend(bv);
            }
            Some(Value::Array(av))
        }
    }
}

fn numeric(v: &Value) -> Option<f64> {
    v.as_f64()
}

fn compare(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    if let (Some(x), Some(y)) = (numeric(a), numeric(b)) {
        return x.partial_cmp(&y);
    }
    if let (Value::String(x), Value::String(y)) = (a, b) {
        return Some(x.cmp(y));
    }
    None
}

fn eval_cond(item: &Map<String, Value>, cond: &Cond) -> bool {
    match cond {
        Cond::And(a, b) => eval_cond(item, a) && eval_cond(item, b),
        Cond::Or(a, b) => eval_cond(item, a) || eval_cond(item, b),
        Cond::Not(a) => !eval_cond(item, a),
        Cond::Cmp(a, op, b) => {
            let (Some(av), Some(bv)) = (eval_operand(item, a), eval_operand(item, b)) else { return false };
            match op {
                CmpOp::Eq => av == bv,
                CmpOp::Ne => av != bv,
                CmpOp::Lt => compare(&av, &bv).map(|o| o.is_lt()).unwrap_or(false),
                CmpOp::Le => compare(&av, &bv).map(|o| o.is_le()).unwrap_or(false),
                CmpOp::Gt => compare(&av, &bv).map(|o| o.is_gt()).unwrap_or(false),
                CmpOp::Ge => compare(&av, &bv).map(|o| o.is_ge()).unwrap_or(false),
            }
        }
        Cond::Between(v, lo, hi) => {
            let (Some(vv), Some(lov), Some(hiv)) = (eval_operand(item, v), eval_operand(item, lo), eval_operand(item, hi)) else {
                return false;
            };
            compare(&vv, &lov).map(|o| o.is_ge()).unwrap_or(false)
                && compare(&vv, &hiv).map(|o| o.is_le()).unwrap_or(false)
        }
        Cond::In(v, items) => {
            let Some(vv) = eval_operand(item, v) else { return false };
            items.iter().filter_map(|i| eval_operand(item, i)).any(|iv| iv == vv)
        }
        Cond::BeginsWith(a, b) => {
            let (Some(Value::String(av)), Some(Value::String(bv))) = (eval_operand(item, a), eval_operand(item, b)) else {
                return false;
            };
            av.starts_with(&bv)
        }
        Cond::Contains(a, b) => match (eval_operand(item, a), eval_operand(item, b)) {
            (Some(Value::String(av)), Some(Value::String(bv))) => av.contains(&bv),
            (Some(Value::Array(av)), Some(bv)) => av.contains(&bv),
            _ => false,
        },
        Cond::AttrExists(a) => eval_operand(item, a).is_some(),
        Cond::AttrNotExists(a) => eval_operand(item, a).is_none(),
        Cond::AttrType(a, t) => {
            let (Some(av), Some(Value::String(tv))) = (eval_operand(item, a), eval_operand(item, t)) else { return false };
            crate::codec::wire_type_tag(&av) == tv
        }
    }
}

/// Evaluate a condition or filter expression against an item.
pub fn evaluate_condition(expr: &str, item: &Map<String, Value>, names: &Names, values: &Values) -> Result<bool> {
    let toks = Lexer::new(expr).tokenize()?;
    let mut parser = Parser::new(toks, names, values);
    let cond = parser.parse_condition()?;
    Ok(eval_cond(item, &cond))
}

/// Alias kept distinct in the public surface so callers documenting
/// *why* they invoke the evaluator (condition vs. filter) read clearly,
/// even though the grammar is shared.
pub fn evaluate_filter(expr: &str, item: &Map<String, Value>, names: &Names, values: &Values) -> Result<bool> {
    evaluate_condition(expr, item, names, values)
}

// ------------------------------------------------------------- updates

#[derive(Debug, Clone)]
enum UpdateAction {
    Set(Vec<PathSeg>, Operand),
    SetAdd(Vec<PathSeg>, Operand, Operand),
    SetSub(Vec<PathSeg>, Operand, Operand),
    Remove(Vec<PathSeg>),
    Add(Vec<PathSeg>, Operand),
    Delete(Vec<PathSeg>, Operand),
}

fn assign_path(item: &mut Map<String, Value>, segs: &[PathSeg], value: Value) {
    let (first, rest) = match segs.split_first() {
        Some(x) => x,
        None => return,
    };
    let PathSeg::Field(name) = first else { return };
    if rest.is_empty() {
        item.insert(name.clone(), value);
        return;
    }
    let entry = item.entry(name.clone()).or_insert_with(|| Value::Object(Map::new()));
    assign_nested(entry, rest, value);
}

fn assign_nested(current: &mut Value, segs: &[PathSeg], value: Value) {
    let (first, rest) = match segs.split_first() {
        Some(x) => x,
        None => {
            *current = value;
            return;
        }
    };
    match first {
        PathSeg::Field(name) => {
            if !current.is_object() {
                *current = Value::Object(Map::new());
            }
            let map = current.as_object_mut().unwrap();
            let entry = map.entry(name.clone()).or_insert(Value::Null);
            if rest.is_empty() {
                *entry = value;
            } else {
                assign_nested(entry, rest, value);
            }
        }
        PathSeg::Index(idx) => {
            if !current.is_array() {
                *current = Value::Array(Vec::new());
            }
            let arr = current.as_array_mut().unwrap();
            while arr.len() <= *idx {
                arr.push(Value::Null);
            }
            if rest.is_empty() {
                arr[*idx] = value;
            } else {
                assign_nested(&mut arr[*idx], rest, value);
            }
        }
    }
}

fn remove_path(item: &mut Map<String, Value>, segs: &[PathSeg]) {
    if segs.len() == 1 {
        if let PathSeg::Field(name) = &segs[0] {
            item.remove(name);
        }
        return;
    }
    let Some(Value::Object(_)) = segs.first().map(|_| ()).map(|_| item.get("_")) else { };
    // walk to parent container
    let (last, init) = segs.split_last().unwrap();
    let (first, rest) = init.split_first().unwrap();
    let PathSeg::Field(name) = first else { return };
    let Some(mut current) = item.get_mut(name) else { return };
    for seg in rest {
        current = match (seg, current) {
            (PathSeg::Field(n), Value::Object(m)) => match m.get_mut(n) {
                Some(v) => v,
                None => return,
            },
            (PathSeg::Index(i), Value::Array(a)) => match a.get_mut(*i) {
                Some(v) => v,
                None => return,
            },
            _ => return,
        };
    }
    match (last, current) {
        (PathSeg::Field(n), Value::Object(m)) => {
            m.remove(n);
        }
        (PathSeg::Index(i), Value::Array(a)) => {
            if *i < a.len() {
                a.remove(*i);
            }
        }
        _ => {}
    }
}

struct UpdateParser<'a> {
    toks: Vec<Tok>,
    pos: usize,
    names: &'a Names,
    values: &'a Values,
}

impl<'a> UpdateParser<'a> {
    fn peek(&self) -> &Tok {
        &self.toks[self.pos]
    }

    fn advance(&mut self) -> Tok {
        let t = self.toks[self.pos].clone();
        if self.pos + 1 < self.toks.len() {
            self.pos += 1;
        }
        t
    }

    fn is_clause_keyword(&self) -> Option<String> {
        if let Tok::Ident(s) = self.peek() {
            let u = s.to_ascii_uppercase();
            if matches!(u.as_str(), "SET" | "REMOVE" | "ADD" | "DELETE") {
                return Some(u);
            }
        }
        None
    }

    fn parse_path(&mut self) -> Result<Vec<PathSeg>> {
        let mut inner = Parser { toks: self.toks.clone(), pos: self.pos, names: self.names, values: self.values };
        let first = match inner.advance() {
            Tok::HashName(n) => inner.names.get(&n).cloned().unwrap_or(n),
            Tok::Ident(n) => n,
            other => return Err(EmulatorError::MalformedExpression(format!("expected path, found {other:?}"))),
        };
        let segs = inner.parse_path_tail(first)?;
        self.pos = inner.pos;
        Ok(segs)
    }

    fn parse_operand(&mut self) -> Result<Operand> {
        let mut inner = Parser { toks: self.toks.clone(), pos: self.pos, names: self.names, values: self.values };
        let op = inner.parse_operand()?;
        self.pos = inner.pos;
        Ok(op)
    }

    fn parse(mut self) -> Result<Vec<UpdateAction>> {
        let mut actions = Vec::new();
        loop {
            let Some(clause) = self.is_clause_keyword() else {
                if matches!(self.peek(), Tok::End) {
                    break;
                }
                return Err(EmulatorError::MalformedExpression(format!("expected clause keyword, found {:?}", self.peek())));
            };
            self.advance();
            loop {
                match clause.as_str() {
                    "SET" => {
                        let path = self.parse_path()?;
                        match self.advance() {
                            Tok::Eq => {}
                            other => return Err(EmulatorError::MalformedExpression(format!("expected =, found {other:?}"))),
                        }
                        let lhs = self.parse_operand()?;
                        if matches!(self.peek(), Tok::Plus | Tok::Minus) {
                            let is_add = matches!(self.peek(), Tok::Plus);
                            self.advance();
                            let rhs = self.parse_operand()?;
                            actions.push(if is_add {
                                UpdateAction::SetAdd(path, lhs, rhs)
                            } else {
                                UpdateAction::SetSub(path, lhs, rhs)
                            });
                        } else {
                            actions.push(UpdateAction::Set(path, lhs));
                        }
                    }
                    "REMOVE" => {
                        let path = self.parse_path()?;
                        actions.push(UpdateAction::Remove(path));
                    }
                    "ADD" => {
                        let path = self.parse_path()?;
                        let val = self.parse_operand()?;
                        actions.push(UpdateAction::Add(path, val));
                    }
                    "DELETE" => {
                        let path = self.parse_path()?;
                        let val = self.parse_operand()?;
                        actions.push(UpdateAction::Delete(path, val));
                    }
                    _ => unreachable!(),
                }
                if matches!(self.peek(), Tok::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
            if self.is_clause_keyword().is_none() {
                break;
            }
        }
        Ok(actions)
    }
}

/// Apply an update expression in place against `item`.
pub fn apply_update(expr: &str, item: &mut Map<String, Value>, names: &Names, values: &Values) -> Result<()> {
    let toks = Lexer::new(expr).tokenize()?;
    let actions = (UpdateParser { toks, pos: 0, names, values }).parse()?;

    for action in actions {
        match action {
            UpdateAction::Set(path, op) => {
                let val = eval_operand(item, &op).unwrap_or(Value::Null);
                assign_path(item, &path, val);
            }
            UpdateAction::SetAdd(path, a, b) => {
                let av = eval_operand(item, &a).unwrap_or(Value::Null);
                let bv = eval_operand(item, &b).unwrap_or(Value::Null);
                let result = match (numeric(&av), numeric(&bv)) {
                    (Some(x), Some(y)) => Value::Number(Number::from_f64(x + y).unwrap_or_else(|| Number::from(0))),
                    _ => Value::Null,
                };
                assign_path(item, &path, result);
            }
            UpdateAction::SetSub(path, a, b) => {
                let av = eval_operand(item, &a).unwrap_or(Value::Null);
                let bv = eval_operand(item, &b).unwrap_or(Value::Null);
                let result = match (numeric(&av), numeric(&bv)) {
                    (Some(x), Some(y)) => Value::Number(Number::from_f64(x - y).unwrap_or_else(|| Number::from(0))),
                    _ => Value::Null,
                };
                assign_path(item, &path, result);
            }
            UpdateAction::Remove(path) => remove_path(item, &path),
            UpdateAction::Add(path, op) => {
                let delta = eval_operand(item, &op).unwrap_or(Value::Null);
                let current = resolve_path(item, &path).cloned();
                let result = match (current, &delta) {
                    (Some(cur), _) if numeric(&cur).is_some() && numeric(&delta).is_some() => {
                        Value::Number(Number::from_f64(numeric(&cur).unwrap() + numeric(&delta).unwrap()).unwrap_or_else(|| Number::from(0)))
                    }
                    (None, _) if numeric(&delta).is_some() => delta.clone(),
                    (Some(Value::Array(mut cur)), Value::Array(add)) => {
                        for v in add {
                            if !cur.contains(v) {
                                cur.push(v.clone());
                            }
                        }
                        Value::Array(cur)
                    }
                    (None, Value::Array(_)) => delta.clone(),
                    _ => delta.clone(),
                };
                assign_path(item, &path, result);
            }
            UpdateAction::Delete(path, op) => {
                let to_remove = eval_operand(item, &op).unwrap_or(Value::Null);
                if let Some(Value::Array(cur)) = resolve_path(item, &path).cloned() {
                    if let Value::Array(remove_set) = to_remove {
                        let filtered: Vec<Value> = cur.into_iter().filter(|v| !remove_set.contains(v)).collect();
                        assign_path(item, &path, Value::Array(filtered));
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn names() -> Names {
        HashMap::new()
    }

    #[test]
    fn simple_comparison() {
        let item = json!({"age": 30}).as_object().unwrap().clone();
        let mut values = Values::new();
        values.insert(":a".into(), json!(18));
        assert!(evaluate_condition("age > :a", &item, &names(), &values).unwrap());
    }

    #[test]
    fn attribute_exists_and_not_exists() {
        let item = json!({"a": 1}).as_object().unwrap().clone();
        assert!(evaluate_condition("attribute_exists(a)", &item, &names(), &Values::new()).unwrap());
        assert!(evaluate_condition("attribute_not_exists(b)", &item, &names(), &Values::new()).unwrap());
    }

    #[test]
    fn begins_with_and_hash_name() {
        let item = json!({"name": "hello-world"}).as_object().unwrap().clone();
        let mut ns = Names::new();
        ns.insert("#n".into(), "name".into());
        let mut vs = Values::new();
        vs.insert(":p".into(), json!("hello"));
        assert!(evaluate_condition("begins_with(#n, :p)", &item, &ns, &vs).unwrap());
    }

    #[test]
    fn and_or_not_precedence() {
        let item = json!({"a": 1, "b": 2}).as_object().unwrap().clone();
        let mut vs = Values::new();
        vs.insert(":one".into(), json!(1));
        vs.insert(":two".into(), json!(2));
        vs.insert(":three".into(), json!(3));
        assert!(evaluate_condition("a = :one AND b = :two", &item, &names(), &vs).unwrap());
        assert!(evaluate_condition("a = :three OR b = :two", &item, &names(), &vs).unwrap());
        assert!(evaluate_condition("NOT a = :three", &item, &names(), &vs).unwrap());
    }

    #[test]
    fn update_set_add_remove() {
        let mut item = json!({"count": 1, "tmp": "x"}).as_object().unwrap().clone();
        let mut vs = Values::new();
        vs.insert(":inc".into(), json!(5));
        apply_update("SET count = count + :inc REMOVE tmp", &mut item, &names(), &vs).unwrap();
        assert_eq!(item.get("count").unwrap(), &json!(6.0));
        assert!(!item.contains_key("tmp"));
    }

    #[test]
    fn update_add_to_set() {
        let mut item = json!({"tags": ["a", "b"]}).as_object().unwrap().clone();
        let mut vs = Values::new();
        vs.insert(":t".into(), json!(["c"]));
        apply_update("ADD tags :t", &mut item, &names(), &vs).unwrap();
        assert_eq!(item.get("tags").unwrap(), &json!(["a", "b", "c"]));
    }
}
