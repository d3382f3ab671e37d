// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Variable resolution.
//!
//! Expressions look like `user.name|user.login|'anonymous'`. Each `|`
//! alternative is either a literal atom (quoted string, number, boolean,
//! `null`, or a second-tier `%!n!%` string) or a path of `.name` and
//! `[expr]` segments rooted in the scope.
//!
//! During pre-compile only constant data is available. A path whose root
//! name is absent and does not start with `$` is [`Lookup::Unknown`], which
//! stops folding of the enclosing construct.

use crate::lexer::{second_tier_index, unescape_quoted, StringEntry};
use crate::value::{Scope, Value};

/// Result of resolving an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// The expression resolved (possibly to null).
    Found(Value),
    /// Pre-compile only: the expression depends on request data.
    Unknown,
}

impl Lookup {
    /// Returns the value, treating unknown as null.
    pub fn into_value(self) -> Value {
        match self {
            Lookup::Found(v) => v,
            Lookup::Unknown => Value::Null,
        }
    }
}

/// Splits a `key=expr` binding. Comparison operators are not bindings.
pub fn split_binding(expr: &str) -> (Option<&str>, &str) {
    if let Some(idx) = expr.find('=') {
        let key = expr[..idx].trim();
        let rest = &expr[idx + 1..];
        let is_name = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '$' | ':' | '.'));
        if is_name && !rest.starts_with('=') {
            return (Some(key), rest.trim());
        }
    }
    (None, expr.trim())
}

/// Splits on a separator outside quotes and brackets.
fn split_top_level(expr: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in expr.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => quote = Some(c),
            '[' => depth += 1,
            ']' => depth -= 1,
            c if c == sep && depth == 0 => {
                parts.push(&expr[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&expr[start..]);
    parts
}

fn is_number_like(s: &str) -> bool {
    let s = s.strip_prefix('-').unwrap_or(s);
    s.starts_with(|c: char| c.is_ascii_digit())
        || (s.starts_with('.') && s[1..].starts_with(|c: char| c.is_ascii_digit()))
}

/// Parses a literal atom. Returns `None` when the atom is a path.
pub fn literal(atom: &str, strings: &[StringEntry]) -> Option<Value> {
    let atom = atom.trim();
    if atom.is_empty() {
        return Some(Value::Null);
    }
    if let Some(n) = second_tier_index(atom) {
        return Some(Value::Str(
            strings.get(n).map(StringEntry::unescaped).unwrap_or_default(),
        ));
    }
    let first = atom.chars().next().unwrap_or(' ');
    if matches!(first, '\'' | '"' | '`') && atom.len() >= 2 && atom.ends_with(first) {
        return Some(Value::Str(unescape_quoted(&atom[1..atom.len() - 1])));
    }
    match atom {
        "true" => return Some(Value::Bool(true)),
        "false" => return Some(Value::Bool(false)),
        "null" | "nil" => return Some(Value::Null),
        _ => {}
    }
    if is_number_like(atom) {
        if let Ok(i) = atom.parse::<i64>() {
            return Some(Value::Int(i));
        }
        if let Ok(f) = atom.parse::<f64>() {
            return Some(Value::Float(f));
        }
    }
    None
}

/// Evaluates expressions against a scope.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    scope: &'a Scope,
    strings: &'a [StringEntry],
    pre: bool,
}

impl<'a> Resolver<'a> {
    /// Creates a resolver. `pre` selects pre-compile semantics.
    pub fn new(scope: &'a Scope, strings: &'a [StringEntry], pre: bool) -> Self {
        Self { scope, strings, pre }
    }

    /// The scope this resolver reads.
    pub fn scope(&self) -> &'a Scope {
        self.scope
    }

    /// The string table used for `%!n!%` atoms.
    pub fn strings(&self) -> &'a [StringEntry] {
        self.strings
    }

    /// Returns true in pre-compile mode.
    pub fn is_pre(&self) -> bool {
        self.pre
    }

    /// Resolves in value context: the first alternative that is neither null
    /// nor `false` wins, else the last alternative's value.
    pub fn value(&self, expr: &str) -> Lookup {
        let mut last = Value::Null;
        for alt in split_top_level(expr, '|') {
            match self.atom(alt) {
                Lookup::Unknown => return Lookup::Unknown,
                Lookup::Found(v) => {
                    if !v.is_null() && v != Value::Bool(false) {
                        return Lookup::Found(v);
                    }
                    last = v;
                }
            }
        }
        Lookup::Found(last)
    }

    /// Resolves in string context. `None` means unknown (pre-compile only).
    pub fn text(&self, expr: &str) -> Option<String> {
        for alt in split_top_level(expr, '|') {
            match self.atom(alt) {
                Lookup::Unknown => return None,
                Lookup::Found(v) => {
                    if v.is_scalar() && !v.is_null() && v != Value::Bool(false) {
                        return Some(v.to_string());
                    }
                }
            }
        }
        Some(String::new())
    }

    /// Resolves a single alternative.
    pub fn atom(&self, atom: &str) -> Lookup {
        let atom = atom.trim();
        if let Some(v) = literal(atom, self.strings) {
            return Lookup::Found(v);
        }
        self.path(atom)
    }

    fn path(&self, path: &str) -> Lookup {
        let bytes = path.as_bytes();
        let root_end = path.find(['.', '[']).unwrap_or(path.len());
        let root = &path[..root_end];
        let mut current = match self.scope.get(root) {
            Some(v) => v.clone(),
            None if self.pre && !root.starts_with('$') => return Lookup::Unknown,
            None => return Lookup::Found(Value::Null),
        };

        let mut i = root_end;
        while i < bytes.len() {
            let key = match bytes[i] {
                b'.' => {
                    let start = i + 1;
                    let end = path[start..]
                        .find(['.', '['])
                        .map(|e| start + e)
                        .unwrap_or(path.len());
                    i = end;
                    Value::Str(path[start..end].to_string())
                }
                b'[' => {
                    let start = i + 1;
                    let mut depth = 1;
                    let mut j = start;
                    while j < bytes.len() {
                        match bytes[j] {
                            b'[' => depth += 1,
                            b']' => {
                                depth -= 1;
                                if depth == 0 {
                                    break;
                                }
                            }
                            _ => {}
                        }
                        j += 1;
                    }
                    i = (j + 1).min(bytes.len());
                    match self.value(&path[start..j.min(bytes.len())]) {
                        Lookup::Found(v) => v,
                        Lookup::Unknown => return Lookup::Unknown,
                    }
                }
                _ => return Lookup::Found(Value::Null),
            };
            current = match current.index(&key) {
                Some(v) => v.clone(),
                None => return Lookup::Found(Value::Null),
            };
        }
        Lookup::Found(current)
    }
}
