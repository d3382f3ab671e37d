// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Condition expressions for `_if` / `_elif`.
//!
//! The normalizer stores a condition as a list of tokens
//! (`a`, `==`, `%!0!%`, `&`, `!`, `b`). They are parsed into an [`Expr`] and
//! partially evaluated: when every operand resolves the result is a plain
//! boolean, otherwise the unresolved part is returned as a residual
//! expression with the resolved operands folded to literals.

use crate::value::Value;
use crate::vars::{literal, Lookup, Resolver};
use regex::Regex;
use std::cmp::Ordering;

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// `=` / `==`
    Eq,
    /// `!=` / `!`
    Ne,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Le,
    /// `>=`
    Ge,
    /// `~` regex match
    Match,
}

impl CmpOp {
    fn parse(token: &str) -> Option<Self> {
        Some(match token {
            "=" | "==" => CmpOp::Eq,
            "!=" | "!" => CmpOp::Ne,
            "<" => CmpOp::Lt,
            ">" => CmpOp::Gt,
            "<=" => CmpOp::Le,
            ">=" => CmpOp::Ge,
            "~" => CmpOp::Match,
            _ => return None,
        })
    }

    fn as_str(self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Gt => ">",
            CmpOp::Le => "<=",
            CmpOp::Ge => ">=",
            CmpOp::Match => "~",
        }
    }

    /// Applies the operator to two resolved values.
    pub fn apply(self, left: &Value, right: &Value) -> bool {
        match self {
            CmpOp::Eq => left.loose_eq(right),
            CmpOp::Ne => !left.loose_eq(right),
            CmpOp::Lt => left.loose_cmp(right) == Some(Ordering::Less),
            CmpOp::Gt => left.loose_cmp(right) == Some(Ordering::Greater),
            CmpOp::Le => matches!(left.loose_cmp(right), Some(Ordering::Less | Ordering::Equal)),
            CmpOp::Ge => matches!(
                left.loose_cmp(right),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            CmpOp::Match => match Regex::new(&right.to_string()) {
                Ok(re) => re.is_match(&left.to_string()),
                Err(e) => {
                    tracing::debug!("Invalid pattern in condition: {}", e);
                    false
                }
            },
        }
    }
}

/// A condition expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// An operand as written: a path or a literal atom.
    Atom(String),
    /// A value folded during partial evaluation.
    Lit(Value),
    /// `!e`
    Not(Box<Expr>),
    /// `a & b`
    And(Box<Expr>, Box<Expr>),
    /// `a | b`
    Or(Box<Expr>, Box<Expr>),
    /// `a ^ b`
    Xor(Box<Expr>, Box<Expr>),
    /// `a op b`
    Cmp(CmpOp, Box<Expr>, Box<Expr>),
}

/// Outcome of partial evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Partial {
    /// Fully resolved.
    Known(bool),
    /// Depends on request data.
    Residual(Expr),
}

fn is_operator(token: &str) -> bool {
    matches!(
        token,
        "=" | "==" | "!=" | "!" | "<" | ">" | "<=" | ">=" | "~" | "&" | "&&" | "|" | "||" | "^"
            | "(" | ")"
    )
}

struct Parser<'t> {
    tokens: &'t [String],
    pos: usize,
}

impl<'t> Parser<'t> {
    fn peek(&self) -> Option<&'t str> {
        self.tokens.get(self.pos).map(String::as_str)
    }

    fn bump(&mut self) -> Option<&'t str> {
        let token = self.peek();
        self.pos += 1;
        token
    }

    fn or(&mut self) -> Expr {
        let mut left = self.xor();
        while matches!(self.peek(), Some("|") | Some("||")) {
            self.bump();
            let right = self.xor();
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        left
    }

    fn xor(&mut self) -> Expr {
        let mut left = self.and();
        while self.peek() == Some("^") {
            self.bump();
            let right = self.and();
            left = Expr::Xor(Box::new(left), Box::new(right));
        }
        left
    }

    fn and(&mut self) -> Expr {
        let mut left = self.unary();
        while matches!(self.peek(), Some("&") | Some("&&")) {
            self.bump();
            let right = self.unary();
            left = Expr::And(Box::new(left), Box::new(right));
        }
        left
    }

    fn unary(&mut self) -> Expr {
        match self.peek() {
            Some("!") => {
                self.bump();
                Expr::Not(Box::new(self.unary()))
            }
            Some("(") => {
                self.bump();
                let inner = self.or();
                if self.peek() == Some(")") {
                    self.bump();
                }
                inner
            }
            _ => self.cmp(),
        }
    }

    fn operand(&mut self) -> Expr {
        match self.peek() {
            Some(token) if !is_operator(token) => {
                self.bump();
                Expr::Atom(token.to_string())
            }
            _ => Expr::Lit(Value::Null),
        }
    }

    fn cmp(&mut self) -> Expr {
        let left = self.operand();
        if let Some(op) = self.peek().and_then(CmpOp::parse) {
            self.bump();
            let right = self.operand();
            return Expr::Cmp(op, Box::new(left), Box::new(right));
        }
        left
    }
}

/// Parses condition tokens.
pub fn parse(tokens: &[String]) -> Expr {
    if tokens.is_empty() {
        return Expr::Lit(Value::Null);
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.or();
    if parser.pos < tokens.len() {
        tracing::debug!("Ignoring trailing condition tokens: {:?}", &tokens[parser.pos..]);
    }
    expr
}

enum Operand {
    Known(Value),
    Unknown(Expr),
}

fn operand(expr: &Expr, r: &Resolver<'_>) -> Operand {
    match expr {
        Expr::Lit(v) => Operand::Known(v.clone()),
        Expr::Atom(atom) => match r.value(atom) {
            Lookup::Found(v) => Operand::Known(v),
            Lookup::Unknown => Operand::Unknown(expr.clone()),
        },
        other => match other.eval(r) {
            Partial::Known(b) => Operand::Known(Value::Bool(b)),
            Partial::Residual(e) => Operand::Unknown(e),
        },
    }
}

fn fold(op: Operand, original: &Expr) -> Expr {
    match op {
        Operand::Known(v) if v.is_scalar() => Expr::Lit(v),
        Operand::Known(_) => original.clone(),
        Operand::Unknown(e) => e,
    }
}

impl Expr {
    /// Partially evaluates the expression.
    pub fn eval(&self, r: &Resolver<'_>) -> Partial {
        match self {
            Expr::Lit(v) => Partial::Known(v.is_truthy()),
            Expr::Atom(_) => match operand(self, r) {
                Operand::Known(v) => Partial::Known(v.is_truthy()),
                Operand::Unknown(e) => Partial::Residual(e),
            },
            Expr::Not(inner) => match inner.eval(r) {
                Partial::Known(b) => Partial::Known(!b),
                Partial::Residual(e) => Partial::Residual(Expr::Not(Box::new(e))),
            },
            Expr::And(a, b) => match a.eval(r) {
                Partial::Known(false) => Partial::Known(false),
                Partial::Known(true) => b.eval(r),
                Partial::Residual(left) => match b.eval(r) {
                    Partial::Known(false) => Partial::Known(false),
                    Partial::Known(true) => Partial::Residual(left),
                    Partial::Residual(right) => {
                        Partial::Residual(Expr::And(Box::new(left), Box::new(right)))
                    }
                },
            },
            Expr::Or(a, b) => match a.eval(r) {
                Partial::Known(true) => Partial::Known(true),
                Partial::Known(false) => b.eval(r),
                Partial::Residual(left) => match b.eval(r) {
                    Partial::Known(true) => Partial::Known(true),
                    Partial::Known(false) => Partial::Residual(left),
                    Partial::Residual(right) => {
                        Partial::Residual(Expr::Or(Box::new(left), Box::new(right)))
                    }
                },
            },
            Expr::Xor(a, b) => match (a.eval(r), b.eval(r)) {
                (Partial::Known(x), Partial::Known(y)) => Partial::Known(x ^ y),
                (Partial::Known(x), Partial::Residual(e)) | (Partial::Residual(e), Partial::Known(x)) => {
                    Partial::Residual(if x { Expr::Not(Box::new(e)) } else { e })
                }
                (Partial::Residual(x), Partial::Residual(y)) => {
                    Partial::Residual(Expr::Xor(Box::new(x), Box::new(y)))
                }
            },
            Expr::Cmp(op, a, b) => match (operand(a, r), operand(b, r)) {
                (Operand::Known(x), Operand::Known(y)) => Partial::Known(op.apply(&x, &y)),
                (x, y) => Partial::Residual(Expr::Cmp(*op, Box::new(fold(x, a)), Box::new(fold(y, b)))),
            },
        }
    }

    /// Renders the expression back into condition tokens.
    pub fn to_tokens(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.write_tokens(&mut out);
        out
    }

    fn write_tokens(&self, out: &mut Vec<String>) {
        let group = |out: &mut Vec<String>, a: &Expr, op: &str, b: &Expr| {
            out.push("(".into());
            a.write_tokens(out);
            out.push(op.into());
            b.write_tokens(out);
            out.push(")".into());
        };
        match self {
            Expr::Atom(a) => out.push(a.clone()),
            Expr::Lit(v) => out.push(literal_token(v)),
            Expr::Not(e) => {
                out.push("!".into());
                out.push("(".into());
                e.write_tokens(out);
                out.push(")".into());
            }
            Expr::And(a, b) => group(out, a, "&", b),
            Expr::Or(a, b) => group(out, a, "|", b),
            Expr::Xor(a, b) => group(out, a, "^", b),
            Expr::Cmp(op, a, b) => {
                a.write_tokens(out);
                out.push(op.as_str().into());
                b.write_tokens(out);
            }
        }
    }
}

/// Renders a scalar as an atom that parses back to the same value.
pub fn literal_token(v: &Value) -> String {
    match v {
        Value::Null => "null".to_string(),
        Value::Str(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
        Value::Array(_) | Value::Map(_) => v.is_truthy().to_string(),
        Value::Float(f) if f.fract() == 0.0 && f.is_finite() => format!("{:.1}", f),
        other => other.to_string(),
    }
}

/// Parses and evaluates condition tokens in one step.
pub fn evaluate(tokens: &[String], r: &Resolver<'_>) -> Partial {
    parse(tokens).eval(r)
}

/// Returns true if `token` parses as a literal atom.
pub fn is_literal(token: &str) -> bool {
    literal(token, &[]).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{scope_from_json, Scope};
    use serde_json::json;

    fn tokens(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    fn known(src: &str, scope: &Scope) -> Partial {
        evaluate(&tokens(src), &Resolver::new(scope, &[], false))
    }

    #[test]
    fn test_comparisons() {
        let scope = scope_from_json(json!({"x": "x", "n": 5, "name": "turbx"}));
        assert_eq!(known("x = 'x'", &scope), Partial::Known(true));
        assert_eq!(known("x = 'y'", &scope), Partial::Known(false));
        assert_eq!(known("n > 3", &scope), Partial::Known(true));
        assert_eq!(known("n <= 4.5", &scope), Partial::Known(false));
        assert_eq!(known("n ! 5", &scope), Partial::Known(false));
        assert_eq!(known("name ~ '^tu'", &scope), Partial::Known(true));
    }

    #[test]
    fn test_logic_and_groups() {
        let scope = scope_from_json(json!({"a": true, "b": false, "c": 1}));
        assert_eq!(known("a & b", &scope), Partial::Known(false));
        assert_eq!(known("a && ! b", &scope), Partial::Known(true));
        assert_eq!(known("b | ( c = 1 )", &scope), Partial::Known(true));
        assert_eq!(known("a ^ c", &scope), Partial::Known(false));
        assert_eq!(known("missing", &scope), Partial::Known(false));
        assert_eq!(known("", &scope), Partial::Known(false));
    }

    #[test]
    fn test_residual_folding() {
        let scope = scope_from_json(json!({"$lang": "en"}));
        let r = Resolver::new(&scope, &[], true);

        assert_eq!(evaluate(&tokens("$lang = 'en' & user"), &r), Partial::Residual(Expr::Atom("user".into())));
        assert_eq!(evaluate(&tokens("$lang = 'de' & user"), &r), Partial::Known(false));
        assert_eq!(evaluate(&tokens("user | $lang"), &r), Partial::Known(true));

        let Partial::Residual(expr) = evaluate(&tokens("user.lang = $lang"), &r) else {
            panic!("expected residual");
        };
        assert_eq!(expr.to_tokens(), tokens("user.lang = 'en'"));
    }

    #[test]
    fn test_residual_matches_single_pass() {
        let consts = scope_from_json(json!({"$min": 3}));
        let full = scope_from_json(json!({"$min": 3, "count": 7}));
        let src = tokens("count >= $min & ! ( count > 10 )");

        let Partial::Residual(residual) = evaluate(&src, &Resolver::new(&consts, &[], true)) else {
            panic!("expected residual");
        };
        let second = evaluate(&residual.to_tokens(), &Resolver::new(&full, &[], false));
        let single = evaluate(&src, &Resolver::new(&full, &[], false));
        assert_eq!(second, single);
        assert_eq!(single, Partial::Known(true));
    }

    #[test]
    fn test_literal_tokens() {
        assert_eq!(literal_token(&Value::Str("it's".into())), "'it\\'s'");
        assert_eq!(literal_token(&Value::Float(2.0)), "2.0");
        assert_eq!(literal_token(&Value::Int(2)), "2");
        assert!(is_literal(&literal_token(&Value::Str("a b".into()))));
    }
}
