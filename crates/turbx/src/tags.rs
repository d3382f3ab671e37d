// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Tag normalization.
//!
//! Function tags (`_name`), component tags (`Name`) and imports (`_:name`) are
//! rewritten into depth-indexed placeholders whose attributes live in a side
//! table:
//!
//! ```text
//! <_if a = 'x'><Card title={{t}}/></_if>
//! <_if:0 0><Card:1 1/></_if:0>
//! ```
//!
//! HTML tags are left inline. `_elif` and `_else` are always self-closing
//! markers carrying the depth of the enclosing `_if` content.

use crate::lexer::{decode_strings, first_tier_index, Decode, StringEntry};
use std::collections::HashMap;

/// Tags that never take a closing tag.
pub const VOID_TAGS: &[&str] = &[
    "br", "hr", "wbr", "meta", "link", "param", "base", "input", "img", "area", "col", "command",
    "embed", "keygen", "source", "track",
];

const CONDITION_TAGS: &[&str] = &["_if", "_elif", "_else"];

/// The attributes of one tag occurrence.
///
/// Positional arguments use the keys `"0"`, `"1"`, …; bare `{{…}}` holes use
/// `"-1"`, `"-2"`, ….
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttrSet {
    values: HashMap<String, String>,
    order: Vec<String>,
}

impl AttrSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set of positional arguments.
    pub fn positional<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::new();
        for (i, arg) in args.into_iter().enumerate() {
            set.insert(i.to_string(), arg);
        }
        set
    }

    /// Inserts or replaces a value, keeping first insertion order.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        if !self.values.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.values.insert(key, value.into());
    }

    /// Looks up a value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Returns true if the key exists.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Positional arguments in order.
    pub fn args(&self) -> Vec<&str> {
        let mut args = Vec::new();
        while let Some(v) = self.get(&args.len().to_string()) {
            args.push(v);
        }
        args
    }

    /// All entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.order
            .iter()
            .filter_map(|k| self.values.get(k).map(|v| (k.as_str(), v.as_str())))
    }

    /// Named entries (neither positional nor hole keys) in insertion order.
    pub fn named(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter().filter(|(k, _)| k.parse::<i64>().is_err())
    }

    /// Bare hole entries (negative keys) in insertion order.
    pub fn spreads(&self) -> impl Iterator<Item = &str> {
        self.iter()
            .filter(|(k, _)| k.starts_with('-') && k[1..].parse::<u64>().is_ok())
            .map(|(_, v)| v)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true when the set has no entries.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Splits a `{{expr}}` / `{{{expr}}}` value into its expression and raw flag.
pub fn hole_of(value: &str) -> Option<(&str, bool)> {
    let v = value.trim();
    if let Some(inner) = v.strip_prefix("{{{").and_then(|s| s.strip_suffix("}}}")) {
        return Some((inner.trim(), true));
    }
    v.strip_prefix("{{")
        .and_then(|s| s.strip_suffix("}}"))
        .map(|inner| (inner.trim(), false))
}

/// Kind of a depth placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderKind {
    /// `<name:d n>`
    Open,
    /// `</name:d>`
    Close,
    /// `<name:d n/>`
    SelfClosing,
}

/// A parsed depth placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder<'a> {
    /// Tag name including its `_` prefix.
    pub name: &'a str,
    /// Depth index.
    pub depth: usize,
    /// Attribute table index.
    pub attrs: Option<usize>,
    /// Open, close or self-closing.
    pub kind: PlaceholderKind,
    /// Byte offset of `<`.
    pub start: usize,
    /// Byte offset after `>`.
    pub end: usize,
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.' | b'$' | b'!' | b':')
}

fn is_special_name(name: &str) -> bool {
    name.starts_with('_') || name.starts_with(|c: char| c.is_ascii_uppercase())
}

/// Parses a depth placeholder starting at `start`.
pub fn parse_placeholder(text: &str, start: usize) -> Option<Placeholder<'_>> {
    let bytes = text.as_bytes();
    if bytes.get(start) != Some(&b'<') {
        return None;
    }
    let mut i = start + 1;
    let closing = bytes.get(i) == Some(&b'/');
    if closing {
        i += 1;
    }
    let name_start = i;
    while i < bytes.len() && is_name_byte(bytes[i]) {
        i += 1;
    }
    let full = &text[name_start..i];
    let colon = full.rfind(':')?;
    let (name, depth) = (&full[..colon], &full[colon + 1..]);
    if name.is_empty() || !is_special_name(name) {
        return None;
    }
    let depth = depth.parse::<usize>().ok()?;

    let mut attrs = None;
    if !closing && bytes.get(i) == Some(&b' ') {
        let digits_start = i + 1;
        let mut j = digits_start;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        attrs = Some(text[digits_start..j].parse::<usize>().ok()?);
        i = j;
    }
    let kind = if closing {
        PlaceholderKind::Close
    } else if bytes.get(i) == Some(&b'/') {
        i += 1;
        PlaceholderKind::SelfClosing
    } else {
        PlaceholderKind::Open
    };
    if bytes.get(i) != Some(&b'>') {
        return None;
    }
    Some(Placeholder {
        name,
        depth,
        attrs,
        kind,
        start,
        end: i + 1,
    })
}

/// Finds the next placeholder at or after `from`.
pub fn next_placeholder(text: &str, from: usize) -> Option<Placeholder<'_>> {
    let mut search = from;
    while let Some(idx) = text[search..].find('<') {
        let pos = search + idx;
        if let Some(p) = parse_placeholder(text, pos) {
            return Some(p);
        }
        search = pos + 1;
    }
    None
}

/// Finds the byte range of `</name:depth>` after `from`.
pub fn find_closer(text: &str, from: usize, name: &str, depth: usize) -> Option<(usize, usize)> {
    let needle = closer(name, depth);
    text[from..]
        .find(&needle)
        .map(|i| (from + i, from + i + needle.len()))
}

/// Renders a placeholder.
pub fn placeholder(name: &str, depth: usize, attrs: Option<usize>, self_closing: bool) -> String {
    let idx = attrs.map(|n| format!(" {}", n)).unwrap_or_default();
    let slash = if self_closing { "/" } else { "" };
    format!("<{}:{}{}{}>", name, depth, idx, slash)
}

/// Renders the closer `</name:depth>` of a placeholder.
pub fn closer(name: &str, depth: usize) -> String {
    format!("</{}:{}>", name, depth)
}

/// Lowers the depth of every placeholder in `text` by `by`.
///
/// Used when a branch body is inlined in place of its enclosing tag.
pub fn lower_depth(text: &str, by: usize) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pos = 0;
    while let Some(p) = next_placeholder(text, pos) {
        out.push_str(&text[pos..p.start]);
        let depth = p.depth.saturating_sub(by);
        match p.kind {
            PlaceholderKind::Close => out.push_str(&closer(p.name, depth)),
            kind => out.push_str(&placeholder(
                p.name,
                depth,
                p.attrs,
                kind == PlaceholderKind::SelfClosing,
            )),
        }
        pos = p.end;
    }
    out.push_str(&text[pos..]);
    out
}

/// Output of [`normalize`].
#[derive(Debug, Default)]
pub struct Normalized {
    /// Rewritten source.
    pub html: String,
    /// Attribute table indexed by the placeholders.
    pub attrs: Vec<AttrSet>,
}

struct RawTag<'a> {
    closing: bool,
    name: &'a str,
    tail: &'a str,
    self_closing: bool,
    end: usize,
}

fn skip_hole(bytes: &[u8], i: usize) -> Option<usize> {
    if bytes.get(i) == Some(&b'{') && bytes.get(i + 1) == Some(&b'{') {
        let rest = std::str::from_utf8(&bytes[i..]).ok()?;
        rest.find("}}").map(|end| {
            let mut j = i + end + 2;
            if bytes.get(j) == Some(&b'}') {
                j += 1;
            }
            j
        })
    } else {
        None
    }
}

/// A `>` inside a condition tag is a comparison when surrounded by whitespace
/// and followed by another token on the same tag.
fn is_condition_gt(bytes: &[u8], i: usize) -> bool {
    if bytes.get(i + 1) == Some(&b'=') {
        return true;
    }
    let before_ws = i > 0 && bytes[i - 1].is_ascii_whitespace();
    let after_ws = bytes.get(i + 1).is_some_and(|b| *b == b' ' || *b == b'\t');
    if !(before_ws && after_ws) {
        return false;
    }
    let mut j = i + 1;
    while j < bytes.len() && (bytes[j] == b' ' || bytes[j] == b'\t') {
        j += 1;
    }
    j < bytes.len() && !matches!(bytes[j], b'<' | b'\n' | b'\r' | b'>')
}

fn scan_tag(src: &str, start: usize) -> Option<RawTag<'_>> {
    let bytes = src.as_bytes();
    let mut i = start + 1;
    let closing = bytes.get(i) == Some(&b'/');
    if closing {
        i += 1;
    }
    let name_start = i;
    while i < bytes.len() && is_name_byte(bytes[i]) {
        i += 1;
    }
    if i == name_start {
        return None;
    }
    let name = &src[name_start..i];
    if !matches!(bytes.get(i), Some(b'>') | Some(b'/') | Some(b' ' | b'\t' | b'\n' | b'\r')) {
        return None;
    }
    let condition = CONDITION_TAGS.contains(&name);
    let tail_start = i;
    while i < bytes.len() {
        if let Some(next) = skip_hole(bytes, i) {
            i = next;
            continue;
        }
        match bytes[i] {
            b'<' if !(condition && matches!(bytes.get(i + 1), Some(b'=' | b' ' | b'\t'))) => {
                return None
            }
            b'>' if condition && is_condition_gt(bytes, i) => i += 1,
            b'>' => {
                let raw_tail = &src[tail_start..i];
                let trimmed = raw_tail.trim_end();
                let self_closing = trimmed.ends_with('/');
                let tail = if self_closing {
                    trimmed[..trimmed.len() - 1].trim()
                } else {
                    trimmed.trim()
                };
                return Some(RawTag {
                    closing,
                    name,
                    tail,
                    self_closing,
                    end: i + 1,
                });
            }
            _ => i += 1,
        }
    }
    None
}

const OPERATOR_BYTES: &[u8] = b"=!<>&|()~^";

/// Splits a condition tail into operands and operators.
fn condition_tokens(tail: &str) -> Vec<String> {
    let bytes = tail.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if let Some(next) = skip_hole(bytes, i) {
            tokens.push(tail[i..next].to_string());
            i = next;
            continue;
        }
        if b == b'%' && bytes.get(i + 1) == Some(&b'!') {
            if let Some(end) = tail[i + 2..].find("!%") {
                let stop = i + 2 + end + 2;
                tokens.push(tail[i..stop].to_string());
                i = stop;
                continue;
            }
        }
        if OPERATOR_BYTES.contains(&b) {
            let two = tail.get(i..i + 2).unwrap_or("");
            if matches!(two, "!=" | "<=" | ">=" | "==" | "&&" | "||") {
                tokens.push(two.to_string());
                i += 2;
            } else {
                tokens.push((b as char).to_string());
                i += 1;
            }
            continue;
        }
        let start = i;
        while i < bytes.len()
            && !bytes[i].is_ascii_whitespace()
            && !OPERATOR_BYTES.contains(&bytes[i])
            && !(bytes[i] == b'%' && bytes.get(i + 1) == Some(&b'!'))
        {
            i += 1;
        }
        tokens.push(tail[start..i].to_string());
    }
    tokens
}

/// Splits a regular attribute tail on whitespace, keeping holes whole and
/// joining `key = value` into `key=value`.
fn attribute_tokens(tail: &str) -> Vec<String> {
    let bytes = tail.as_bytes();
    let mut tokens: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut i = 0;
    while i < bytes.len() {
        if let Some(next) = skip_hole(bytes, i) {
            current.push_str(&tail[i..next]);
            i = next;
            continue;
        }
        let b = bytes[i];
        if b.is_ascii_whitespace() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            i += 1;
            continue;
        }
        if b == b'=' {
            // `key = value` joins; a standalone `=path` derives its key later
            let spaced_after = bytes.get(i + 1).is_some_and(|c| c.is_ascii_whitespace());
            if current.is_empty() && spaced_after {
                match tokens.pop() {
                    Some(prev) if !prev.contains('=') => current = prev,
                    Some(prev) => tokens.push(prev),
                    None => {}
                }
            }
            current.push('=');
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            continue;
        }
        let ch_len = tail[i..].chars().next().map(char::len_utf8).unwrap_or(1);
        current.push_str(&tail[i..i + ch_len]);
        i += ch_len;
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Turns a value token into its stored form: quoted holes are unwrapped and
/// remaining string literals become second-tier references.
fn attribute_value(token: &str, strings: &[StringEntry]) -> String {
    if let Some(entry) = first_tier_index(token).and_then(|n| strings.get(n)) {
        if hole_of(&entry.body).is_some() {
            return entry.body.trim().to_string();
        }
    }
    decode_strings(token, strings, Decode::Rehash)
}

fn build_attrs(name: &str, tail: &str, strings: &[StringEntry]) -> AttrSet {
    let mut set = AttrSet::new();
    if tail.is_empty() {
        return set;
    }
    if CONDITION_TAGS.contains(&name) {
        for (i, token) in condition_tokens(tail).iter().enumerate() {
            set.insert(i.to_string(), decode_strings(token, strings, Decode::Rehash));
        }
        return set;
    }

    let mut positional = 0usize;
    let mut holes = 0usize;
    for token in attribute_tokens(tail) {
        if hole_of(&token).is_some() {
            holes += 1;
            set.insert(format!("-{}", holes), token);
            continue;
        }
        if let Some((key, value)) = token.split_once('=') {
            let value = attribute_value(value, strings);
            let key = if key.is_empty() {
                let path = hole_of(&value).map(|(e, _)| e).unwrap_or(&value);
                path.rsplit('.').next().unwrap_or(path).to_string()
            } else {
                decode_strings(key, strings, Decode::Unquote)
            };
            set.insert(key, value);
        } else {
            set.insert(positional.to_string(), attribute_value(&token, strings));
            positional += 1;
        }
    }
    set
}

/// Rewrites function, component and import tags into depth placeholders.
pub fn normalize(src: &str, strings: &[StringEntry]) -> Normalized {
    let mut out = Normalized {
        html: String::with_capacity(src.len()),
        attrs: Vec::new(),
    };
    let mut depth = 0usize;
    let mut last = 0;
    let mut search = 0;

    while let Some(idx) = src[search..].find('<') {
        let pos = search + idx;
        search = pos + 1;
        let Some(tag) = scan_tag(src, pos) else {
            continue;
        };
        if tag.name.starts_with('!') {
            continue;
        }

        let replacement = if tag.self_closing && !tag.closing && tag.name.eq_ignore_ascii_case("body") {
            "<BODY/>".to_string()
        } else if !is_special_name(tag.name) {
            continue;
        } else if tag.closing {
            if depth == 0 {
                tracing::warn!("Unbalanced closing tag </{}> kept verbatim", tag.name);
                continue;
            }
            depth -= 1;
            closer(tag.name, depth)
        } else {
            let attrs = build_attrs(tag.name, tag.tail, strings);
            let idx = if attrs.is_empty() {
                None
            } else {
                out.attrs.push(attrs);
                Some(out.attrs.len() - 1)
            };
            let marker = matches!(tag.name, "_elif" | "_else");
            if tag.self_closing || marker {
                placeholder(tag.name, depth, idx, true)
            } else {
                depth += 1;
                placeholder(tag.name, depth - 1, idx, false)
            }
        };

        out.html.push_str(&src[last..pos]);
        out.html.push_str(&replacement);
        last = tag.end;
        search = tag.end;
    }

    if depth != 0 {
        tracing::warn!("{} function or component tag(s) left open", depth);
    }
    out.html.push_str(&src[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::extract;

    fn run(src: &str) -> (Normalized, Vec<StringEntry>) {
        let (text, strings) = extract(src);
        (normalize(&text, &strings), strings)
    }

    #[test]
    fn test_function_and_component_depths() {
        let (n, _) = run("<div><_if ok><Card title={{t}}/><p>x</p></_if></div>");
        assert_eq!(n.html, "<div><_if:0 0><Card:1 1/><p>x</p></_if:0></div>");
        assert_eq!(n.attrs[0].get("0"), Some("ok"));
        assert_eq!(n.attrs[1].get("title"), Some("{{t}}"));
    }

    #[test]
    fn test_closers_match_depth() {
        let (n, _) = run("<_each a><_each b><X>y</X></_each></_each>");
        assert_eq!(
            n.html,
            "<_each:0 0><_each:1 1><X:2>y</X:2></_each:1></_each:0>"
        );
    }

    #[test]
    fn test_normalized_closers_are_found() {
        let (n, _) = run("<_if a>x</_if>");
        let open = next_placeholder(&n.html, 0).unwrap();
        assert_eq!(open.kind, PlaceholderKind::Open);
        assert_eq!(find_closer(&n.html, open.end, "_if", 0), Some((10, 18)));
    }

    #[test]
    fn test_condition_operators() {
        let (n, strings) = run("<_if a=='x'&&b>=2 | !c>yes</_if>");
        assert_eq!(n.html, "<_if:0 0>yes</_if:0>");
        let args = n.attrs[0].args();
        assert_eq!(args, vec!["a", "==", "%!0!%", "&&", "b", ">=", "2", "|", "!", "c"]);
        assert_eq!(strings[0].body, "x");
    }

    #[test]
    fn test_condition_gt_with_spaces() {
        let (n, _) = run("<_if count > 3>many</_if>");
        assert_eq!(n.html, "<_if:0 0>many</_if:0>");
        assert_eq!(n.attrs[0].args(), vec!["count", ">", "3"]);
    }

    #[test]
    fn test_elif_else_are_markers() {
        let (n, _) = run("<_if a>1<_elif b>2<_else>3</_if>");
        assert_eq!(n.html, "<_if:0 0>1<_elif:1 1/>2<_else:1/>3</_if:0>");
    }

    #[test]
    fn test_attribute_forms() {
        let (n, _) = run("<Nav  home = \"/\" =page.title {{extra}} wide \"{{{raw}}}\"/>");
        assert_eq!(n.html, "<Nav:0 0/>");
        let set = &n.attrs[0];
        assert_eq!(set.get("home"), Some("%!0!%"));
        assert_eq!(set.get("title"), Some("page.title"));
        assert_eq!(set.get("-1"), Some("{{extra}}"));
        assert_eq!(set.get("0"), Some("wide"));
        assert_eq!(set.get("1"), Some("{{{raw}}}"));
        assert_eq!(set.spreads().collect::<Vec<_>>(), vec!["{{extra}}"]);
        assert_eq!(set.named().map(|(k, _)| k).collect::<Vec<_>>(), vec!["home", "title"]);
    }

    #[test]
    fn test_html_and_body_marker() {
        let (n, _) = run("<!DOCTYPE html><main class=\"x\"><body/></main><img src=a/>");
        assert_eq!(n.html, "<!DOCTYPE html><main class=%!s0!%><BODY/></main><img src=a/>");
        assert!(n.attrs.is_empty());
    }

    #[test]
    fn test_import_placeholder() {
        let (n, _) = run("<_:nav/>");
        assert_eq!(n.html, "<_:nav:0/>");
        let p = parse_placeholder(&n.html, 0).unwrap();
        assert_eq!(p.name, "_:nav");
        assert_eq!(p.kind, PlaceholderKind::SelfClosing);
        assert_eq!(p.attrs, None);
    }

    #[test]
    fn test_parse_placeholder() {
        let text = "ab<_if:2 14>c</_if:2>";
        let p = next_placeholder(text, 0).unwrap();
        assert_eq!((p.name, p.depth, p.attrs, p.kind), ("_if", 2, Some(14), PlaceholderKind::Open));
        assert_eq!(&text[p.start..p.end], "<_if:2 14>");
        assert_eq!(find_closer(text, p.end, "_if", 2), Some((13, 21)));
        assert!(parse_placeholder("<div:1>", 0).is_none());
    }

    #[test]
    fn test_lower_depth() {
        let text = "a<_if:2 4>b<_else:3/>c</_if:2><Card:2/>";
        assert_eq!(lower_depth(text, 1), "a<_if:1 4>b<_else:2/>c</_if:1><Card:1/>");
        assert_eq!(lower_depth("<X:0/>", 1), "<X:0/>");
    }

    #[test]
    fn test_hole_of() {
        assert_eq!(hole_of("{{ a.b }}"), Some(("a.b", false)));
        assert_eq!(hole_of("{{{a}}}"), Some(("a", true)));
        assert_eq!(hole_of("a"), None);
    }
}
