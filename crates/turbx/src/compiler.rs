// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The render pass over the intermediate form.
//!
//! One [`Compiler`] walks a [`TemplateFile`] level by level: the placeholders
//! at the current depth are expanded (`if`, `each`, functions, components,
//! imports), the text between them has its attribute and text holes filled,
//! and expanded bodies are rendered one level deeper.
//!
//! The same walk runs in two modes:
//!
//! - **compile**: every value inserted into the output is stored in a
//!   [`RenderState`] and referenced by a `%!v<n>!%` token, so inserted data is
//!   never scanned again. Tokens are expanded once at the very end.
//! - **pre** (fold): only constant data is visible. Whatever can be decided is
//!   inlined, the rest is written back as residual placeholders for the
//!   compile pass.

use crate::cache::TemplateFile;
use crate::codec;
use crate::escape::{escape_attr, escape_html};
use crate::expr::{self, Partial};
use crate::extensions::{function_name, FunctionContext, FunctionRegistry, OEmbedProvider};
use crate::holes::replace_holes;
use crate::layout;
use crate::lexer::{decode_escapes, encode_escapes, reinject_strings, shield, StringEntry};
use crate::script::{self, AssetHooks};
use crate::tags::{
    closer, find_closer, hole_of, lower_depth, next_placeholder, parse_placeholder, placeholder, AttrSet,
    Placeholder, PlaceholderKind,
};
use crate::value::{Scope, Value};
use crate::vars::{literal, split_binding, Lookup, Resolver};
use lazy_static::lazy_static;
use rand::seq::SliceRandom;
use regex::{Captures, Regex};
use std::sync::{Arc, Mutex, MutexGuard};

lazy_static! {
    static ref FRAGMENT: Regex = Regex::new(r"%!v(\d+)!%").unwrap();
    static ref VAR_NAME: Regex = Regex::new(r"^[\w\-$]+$").unwrap();
}

/// Components nested deeper than this render empty.
pub const MAX_COMPONENT_DEPTH: usize = 64;

/// Default length of `<_rand>` values.
pub const DEFAULT_RAND_SIZE: usize = 64;

const LOOP_TAGS: &[&str] = &["_each", "_for", "_foreach", "_for_each"];

/// Placeholders a pre-compile `each` may unroll.
const FOLDABLE_TAGS: &[&str] = &[
    "_if", "_elif", "_else", "_each", "_for", "_foreach", "_for_each", "_lorem", "_youtube", "_yt",
];

const FN_OPEN: &str = "%!fn:";

/// Where a referenced template is looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// `<Name/>`: the components directory first, then the root.
    Component,
    /// `<_:name/>`: the root only.
    Import,
    /// The page layout.
    Layout,
}

/// Loads pre-compiled records for components, imports and layouts.
pub trait FileSource: Send + Sync {
    /// Returns the record, or `None` when the template does not exist.
    fn load(&self, kind: SourceKind, name: &str) -> Option<Arc<TemplateFile>>;
}

/// Everything a render borrows from the engine.
#[derive(Clone, Copy)]
pub struct Env<'e> {
    /// Component, import and layout lookups.
    pub source: &'e dyn FileSource,
    /// Tag functions.
    pub functions: &'e FunctionRegistry,
    /// Script and style transforms.
    pub hooks: &'e dyn AssetHooks,
    /// oEmbed lookups for the YouTube embed.
    pub oembed: Option<&'e dyn OEmbedProvider>,
    /// Base URL of the static assets.
    pub assets: &'e str,
}

/// Fragments produced during one render.
#[derive(Debug, Default)]
pub struct RenderState {
    fragments: Mutex<Vec<String>>,
}

impl RenderState {
    /// Creates an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    fn fragments(&self) -> MutexGuard<'_, Vec<String>> {
        self.fragments
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stores an encoded fragment and returns its token.
    pub fn stash(&self, fragment: String) -> String {
        let mut fragments = self.fragments();
        fragments.push(fragment);
        format!("%!v{}!%", fragments.len() - 1)
    }

    /// Replaces every token with its fragment, recursively.
    pub fn assemble(&self, text: &str) -> String {
        let fragments = self.fragments();
        expand_tokens(text, &fragments, fragments.len())
    }
}

/// A fragment only refers to fragments stored before it, so `limit` shrinks
/// with every level of recursion.
fn expand_tokens(text: &str, fragments: &[String], limit: usize) -> String {
    if !text.contains("%!v") {
        return text.to_string();
    }
    FRAGMENT
        .replace_all(text, |caps: &Captures| {
            match caps[1].parse::<usize>() {
                Ok(n) if n < limit => expand_tokens(&fragments[n], fragments, n),
                _ => String::new(),
            }
        })
        .into_owned()
}

/// The template being rendered and what it was called with.
struct Frame<'f> {
    file: &'f TemplateFile,
    body_token: Option<String>,
    allow_import: bool,
    depth: usize,
}

impl<'f> Frame<'f> {
    fn root(file: &'f TemplateFile) -> Self {
        Self {
            file,
            body_token: None,
            allow_import: true,
            depth: 0,
        }
    }
}

/// Parsed `each` arguments.
#[derive(Debug, Default, PartialEq)]
struct LoopSpec<'t> {
    source: &'t str,
    value: Option<&'t str>,
    key: Option<&'t str>,
    index: Option<&'t str>,
    reverse: bool,
}

impl<'t> LoopSpec<'t> {
    fn parse(args: &[&'t str]) -> Option<Self> {
        let (&source, rest) = args.split_first()?;
        let mut spec = LoopSpec {
            source,
            ..Default::default()
        };
        let mut bare = Vec::new();
        let mut i = 0;
        while i < rest.len() {
            match rest[i] {
                "as" | "of" | "in" if i + 1 < rest.len() => {
                    let name = Some(rest[i + 1]);
                    match rest[i] {
                        "as" => spec.value = name,
                        "of" => spec.key = name,
                        _ => spec.index = name,
                    }
                    i += 2;
                    continue;
                }
                "desc" | "reverse" => spec.reverse = true,
                other => bare.push(other),
            }
            i += 1;
        }
        for name in bare {
            let slot = [&mut spec.value, &mut spec.key, &mut spec.index]
                .into_iter()
                .find(|slot| slot.is_none());
            match slot {
                Some(slot) => *slot = Some(name),
                None => tracing::debug!("each: ignoring extra argument {}", name),
            }
        }
        if spec.value.is_none() && !spec.source.contains("..") && literal(spec.source, &[]).is_none() {
            spec.value = spec.source.rsplit('.').next();
        }
        Some(spec)
    }

    fn names(&self) -> Vec<&'t str> {
        [self.value, self.key, self.index].into_iter().flatten().collect()
    }
}

/// One loop iteration: key (index for arrays), item and ordinal.
type LoopItem = (Value, Value, usize);

fn int_range(from: i64, to: i64) -> Vec<LoopItem> {
    let values: Vec<i64> = if from <= to {
        (from..=to).collect()
    } else {
        (to..=from).rev().collect()
    };
    values
        .into_iter()
        .enumerate()
        .map(|(i, v)| (Value::Int(i as i64), Value::Int(v), i))
        .collect()
}

fn count_range(n: i64) -> Vec<LoopItem> {
    match n {
        0 => Vec::new(),
        n if n > 0 => int_range(0, n - 1),
        n => int_range(0, n + 1),
    }
}

/// Rewrites `$name` for loop-bound names into `{{name}}`, outside tags and
/// holes. A trailing `.field` chain is kept in the hole.
fn bind_dollar_refs(body: &str, names: &[&str]) -> String {
    if !body.contains('$') || names.is_empty() {
        return body.to_string();
    }
    let bytes = body.as_bytes();
    let mut out = String::with_capacity(body.len());
    let mut last = 0;
    let mut i = 0;
    let is_ident = |b: u8| b.is_ascii_alphanumeric() || b == b'_';
    while i < bytes.len() {
        match bytes[i] {
            b'{' if bytes.get(i + 1) == Some(&b'{') => {
                i = body[i..].find("}}").map(|e| i + e + 2).unwrap_or(bytes.len());
            }
            b'<' => {
                i = body[i..].find('>').map(|e| i + e + 1).unwrap_or(bytes.len());
            }
            b'$' if i == 0 || !is_ident(bytes[i - 1]) => {
                let start = i + 1;
                let mut end = start;
                while end < bytes.len() && is_ident(bytes[end]) {
                    end += 1;
                }
                if !names.contains(&&body[start..end]) {
                    i = end.max(i + 1);
                    continue;
                }
                while bytes.get(end) == Some(&b'.') && bytes.get(end + 1).is_some_and(|b| is_ident(*b)) {
                    end += 1;
                    while end < bytes.len() && is_ident(bytes[end]) {
                        end += 1;
                    }
                }
                out.push_str(&body[last..i]);
                out.push_str("{{");
                out.push_str(&body[start..end]);
                out.push_str("}}");
                last = end;
                i = end;
            }
            _ => i += 1,
        }
    }
    out.push_str(&body[last..]);
    out
}

/// Splits `if` content into branches at the `_elif`/`_else` markers of `depth`.
/// A branch condition of `None` is the `else` branch.
fn if_branches(content: &str, depth: usize, first: Option<usize>) -> Vec<(Option<Option<usize>>, &str)> {
    let mut branches = Vec::new();
    let mut cond = Some(first);
    let mut start = 0;
    let mut pos = 0;
    while let Some(p) = next_placeholder(content, pos) {
        pos = p.end;
        if p.depth != depth || p.kind != PlaceholderKind::SelfClosing {
            continue;
        }
        let next = match p.name {
            "_elif" => Some(p.attrs),
            "_else" => None,
            _ => continue,
        };
        branches.push((cond, &content[start..p.start]));
        cond = next;
        start = p.end;
    }
    branches.push((cond, &content[start..]));
    branches
}

fn condition_tokens(set: Option<&AttrSet>) -> Vec<String> {
    set.map(|s| s.args().into_iter().map(String::from).collect())
        .unwrap_or_default()
}

fn random_string(size: usize, exclude: &str) -> String {
    let pool: Vec<char> = ('0'..='9')
        .chain('a'..='z')
        .chain('A'..='Z')
        .filter(|c| !exclude.contains(*c))
        .collect();
    let mut rng = rand::thread_rng();
    (0..size).filter_map(|_| pool.choose(&mut rng).copied()).collect()
}

/// Renders the body of a tag like an attribute value: holes resolve, other
/// tokens are taken as literals or paths.
fn attr_value(raw: &str, r: &Resolver<'_>) -> Value {
    if let Some((expr, _)) = hole_of(raw) {
        return r.value(split_binding(expr).1).into_value();
    }
    if let Some(v) = literal(raw, r.strings()) {
        return v;
    }
    match r.value(raw) {
        Lookup::Found(v) if !v.is_null() => v,
        _ => Value::Str(raw.to_string()),
    }
}

/// Walks a template in compile or pre mode.
pub struct Compiler<'e> {
    env: Env<'e>,
    state: RenderState,
    pre: bool,
    base_attrs: usize,
    extra_attrs: Mutex<Vec<AttrSet>>,
}

impl<'e> Compiler<'e> {
    /// Creates a compile-mode walker.
    pub fn new(env: Env<'e>) -> Self {
        Self {
            env,
            state: RenderState::new(),
            pre: false,
            base_attrs: 0,
            extra_attrs: Mutex::new(Vec::new()),
        }
    }

    /// Creates a pre-mode walker for `file`.
    pub fn folding(env: Env<'e>, file: &TemplateFile) -> Self {
        Self {
            pre: true,
            base_attrs: file.attrs.len(),
            ..Self::new(env)
        }
    }

    /// The fragments collected so far.
    pub fn state(&self) -> &RenderState {
        &self.state
    }

    fn emit(&self, html: &str) -> String {
        if self.pre {
            shield(html)
        } else {
            self.state.stash(encode_escapes(html))
        }
    }

    fn push_attrs(&self, set: AttrSet) -> usize {
        let mut extra = self
            .extra_attrs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        extra.push(set);
        self.base_attrs + extra.len() - 1
    }

    /// Renders `file` as a page body with a private copy of `scope`.
    pub fn render_root(&self, file: &TemplateFile, scope: &Scope) -> String {
        let mut scope = scope.clone();
        self.render_file(&Frame::root(file), &mut scope)
    }

    fn render_file(&self, frame: &Frame<'_>, scope: &mut Scope) -> String {
        let out = self.render_fragment(frame, &frame.file.html, 0, scope);
        if self.pre {
            return out;
        }
        let out = script::reinject(&out, &frame.file.scripts, self.env.hooks, |html| {
            self.state.stash(html)
        });
        reinject_strings(&out, &frame.file.strings)
    }

    /// Renders a child fragment one level deeper.
    fn render_child(&self, frame: &Frame<'_>, text: &str, level: usize, scope: &mut Scope) -> String {
        let out = self.render_fragment(frame, text, level + 1, scope);
        if self.pre {
            lower_depth(&out, 1)
        } else {
            out
        }
    }

    fn render_fragment(&self, frame: &Frame<'_>, text: &str, level: usize, scope: &mut Scope) -> String {
        let mut out = String::with_capacity(text.len());
        let mut pos = 0;
        let mut search = 0;
        while let Some(p) = next_placeholder(text, search) {
            if p.depth != level || p.kind == PlaceholderKind::Close {
                search = p.end;
                continue;
            }
            out.push_str(&self.render_text(frame, &text[pos..p.start], scope));
            match p.kind {
                PlaceholderKind::SelfClosing if matches!(p.name, "_elif" | "_else") => {
                    tracing::debug!("Dropping stray {} marker", p.name);
                    pos = p.end;
                }
                PlaceholderKind::SelfClosing => {
                    out.push_str(&self.expand(frame, &p, None, &text[p.start..p.end], level, scope));
                    pos = p.end;
                }
                _ => match find_closer(text, p.end, p.name, p.depth) {
                    Some((close_start, close_end)) => {
                        let content = &text[p.end..close_start];
                        let block = &text[p.start..close_end];
                        out.push_str(&self.expand(frame, &p, Some(content), block, level, scope));
                        pos = close_end;
                    }
                    None => {
                        tracing::warn!("Unbalanced <{}> kept verbatim", p.name);
                        out.push_str(&text[p.start..p.end]);
                        pos = p.end;
                    }
                },
            }
            search = pos;
        }
        out.push_str(&self.render_text(frame, &text[pos..], scope));
        out
    }

    /// Fills the holes of plain text and unwraps residual function blocks.
    fn render_text(&self, frame: &Frame<'_>, text: &str, scope: &mut Scope) -> String {
        if text.is_empty() {
            return String::new();
        }
        if self.pre || !text.contains(FN_OPEN) {
            return self.interpolate(frame, text, scope);
        }
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find(FN_OPEN) {
            let payload_start = start + FN_OPEN.len();
            let Some(len) = rest[payload_start..].find("!%") else {
                break;
            };
            out.push_str(&self.interpolate(frame, &rest[..start], scope));
            let payload = &rest[payload_start..payload_start + len];
            match codec::decompress_str(payload) {
                Ok(block) => {
                    let depth = parse_placeholder(&block, 0).map(|p| p.depth).unwrap_or(0);
                    out.push_str(&self.render_fragment(frame, &block, depth, scope));
                }
                Err(e) => tracing::warn!("Dropping undecodable function block: {}", e),
            }
            rest = &rest[payload_start + len + 2..];
        }
        out.push_str(&self.interpolate(frame, rest, scope));
        out
    }

    fn interpolate(&self, frame: &Frame<'_>, text: &str, scope: &Scope) -> String {
        if !text.contains("{{") {
            return text.to_string();
        }
        let r = Resolver::new(scope, &frame.file.strings, self.pre);
        let text = self.attribute_holes(text, &r);
        replace_holes(&text, |expr, raw| self.text_hole(frame, expr, raw, &r))
    }

    /// Resolves holes inside inline HTML tags.
    fn attribute_holes(&self, text: &str, r: &Resolver<'_>) -> String {
        let bytes = text.as_bytes();
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] != b'<' || !bytes.get(i + 1).is_some_and(|b| b.is_ascii_alphabetic()) {
                i += 1;
                continue;
            }
            let mut j = i + 1;
            while j < bytes.len() && bytes[j] != b'>' && bytes[j] != b'<' {
                if bytes[j] == b'{' && bytes.get(j + 1) == Some(&b'{') {
                    j = text[j..].find("}}").map(|e| j + e + 2).unwrap_or(bytes.len());
                    while bytes.get(j) == Some(&b'}') {
                        j += 1;
                    }
                    continue;
                }
                j += 1;
            }
            if bytes.get(j) != Some(&b'>') {
                i = j;
                continue;
            }
            let tag = &text[i..=j];
            if tag.contains("{{") {
                out.push_str(&text[last..i]);
                out.push_str(&replace_holes(tag, |expr, raw| self.attribute_hole(expr, raw, r)));
                last = j + 1;
            }
            i = j + 1;
        }
        out.push_str(&text[last..]);
        out
    }

    fn attribute_hole(&self, expr: &str, raw: bool, r: &Resolver<'_>) -> Option<String> {
        let (key, path) = split_binding(expr);
        let value = r.text(path)?;
        let html = match key {
            Some(_) if value.is_empty() => return Some(String::new()),
            Some(key) => format!("{}=\"{}\"", key, escape_attr(&value)),
            None if raw => value,
            None => escape_attr(&value),
        };
        Some(self.emit(&html))
    }

    fn text_hole(&self, frame: &Frame<'_>, expr: &str, raw: bool, r: &Resolver<'_>) -> Option<String> {
        let (_, path) = split_binding(expr);
        if let Some(token) = &frame.body_token {
            if path == "body" {
                return Some(token.clone());
            }
        }
        let value = r.text(path)?;
        if frame.body_token.as_deref() == Some(value.as_str()) {
            return Some(value);
        }
        let html = if raw { value } else { escape_html(&value) };
        Some(self.emit(&html))
    }

    fn expand(
        &self,
        frame: &Frame<'_>,
        p: &Placeholder<'_>,
        content: Option<&str>,
        block: &str,
        level: usize,
        scope: &mut Scope,
    ) -> String {
        let empty = AttrSet::new();
        let attrs = p.attrs.and_then(|i| frame.file.attr(i)).unwrap_or(&empty);
        let name = p.name.to_ascii_lowercase();

        if name == "_if" {
            return self.render_if(frame, p, content.unwrap_or(""), level, scope);
        }
        if LOOP_TAGS.contains(&name.as_str()) {
            return self.render_each(frame, attrs, content.unwrap_or(""), block, level, scope);
        }
        if let Some(import) = p.name.strip_prefix("_:") {
            return self.render_component(frame, SourceKind::Import, import, attrs, content, block, level, scope);
        }
        if !p.name.starts_with('_') {
            return self.render_component(frame, SourceKind::Component, p.name, attrs, content, block, level, scope);
        }
        match name.as_str() {
            "_set" => self.render_set(frame, attrs, block, scope),
            "_rand" => self.render_rand(frame, attrs, block, scope),
            _ => self.render_function(frame, &name, attrs, content, block, scope),
        }
    }

    fn residual(&self, block: &str) -> String {
        match codec::compress(block.as_bytes()) {
            Ok(payload) => format!("{}{}!%", FN_OPEN, payload),
            Err(e) => {
                tracing::warn!("Keeping function block uncompressed: {}", e);
                block.to_string()
            }
        }
    }

    fn render_if(&self, frame: &Frame<'_>, p: &Placeholder<'_>, content: &str, level: usize, scope: &mut Scope) -> String {
        let mut residual: Vec<(Option<expr::Expr>, &str)> = Vec::new();
        for (cond, body) in if_branches(content, level + 1, p.attrs) {
            let outcome = match cond {
                None => Partial::Known(true),
                Some(idx) => {
                    let r = Resolver::new(scope, &frame.file.strings, self.pre);
                    expr::evaluate(&condition_tokens(idx.and_then(|i| frame.file.attr(i))), &r)
                }
            };
            match outcome {
                Partial::Known(true) if residual.is_empty() => {
                    return self.render_child(frame, body, level, scope);
                }
                Partial::Known(true) => {
                    residual.push((None, body));
                    break;
                }
                Partial::Known(false) => {}
                Partial::Residual(e) => residual.push((Some(e), body)),
            }
        }

        let mut out = String::new();
        for (i, (cond, body)) in residual.into_iter().enumerate() {
            let idx = cond.map(|e| self.push_attrs(AttrSet::positional(e.to_tokens())));
            if i == 0 {
                out.push_str(&placeholder("_if", level, idx, false));
            } else if idx.is_some() {
                out.push_str(&placeholder("_elif", level + 1, idx, true));
            } else {
                out.push_str(&placeholder("_else", level + 1, None, true));
            }
            // Bodies keep their depth but fold what is already bound, such
            // as the item of an unrolled loop.
            out.push_str(&self.render_fragment(frame, body, level + 1, &mut scope.clone()));
        }
        if !out.is_empty() {
            out.push_str(&closer("_if", level));
        }
        out
    }

    fn loop_items(&self, spec: &LoopSpec<'_>, r: &Resolver<'_>) -> Option<Vec<LoopItem>> {
        let bound = |atom: &str| -> Option<Option<i64>> {
            match r.value(atom) {
                Lookup::Found(v) => Some(v.as_int()),
                Lookup::Unknown => None,
            }
        };
        let mut items = if let Some((from, to)) = spec.source.split_once("..") {
            match (bound(from)?, bound(to)?) {
                (Some(from), Some(to)) => int_range(from, to),
                _ => Vec::new(),
            }
        } else {
            match r.value(spec.source) {
                Lookup::Unknown => return None,
                Lookup::Found(Value::Array(list)) => list
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| (Value::Int(i as i64), v, i))
                    .collect(),
                Lookup::Found(Value::Map(map)) => map
                    .into_iter()
                    .enumerate()
                    .map(|(i, (k, v))| (Value::Str(k), v, i))
                    .collect(),
                Lookup::Found(v @ (Value::Int(_) | Value::Float(_))) => {
                    count_range(v.as_int().unwrap_or(0))
                }
                Lookup::Found(_) => Vec::new(),
            }
        };
        if spec.reverse {
            items.reverse();
        }
        Some(items)
    }

    fn render_each(
        &self,
        frame: &Frame<'_>,
        attrs: &AttrSet,
        content: &str,
        block: &str,
        level: usize,
        scope: &mut Scope,
    ) -> String {
        let args = attrs.args();
        let Some(spec) = LoopSpec::parse(&args) else {
            tracing::debug!("each: missing source");
            return String::new();
        };
        let items = {
            let r = Resolver::new(scope, &frame.file.strings, self.pre);
            self.loop_items(&spec, &r)
        };
        let Some(items) = items else {
            return block.to_string();
        };
        if self.pre && !foldable(content) {
            return block.to_string();
        }

        let body = bind_dollar_refs(content, &spec.names());
        let mut out = String::new();
        for (key, item, ordinal) in items {
            let mut iteration = scope.clone();
            if let Some(name) = spec.value {
                iteration.insert(name.to_string(), item);
            }
            if let Some(name) = spec.key {
                iteration.insert(name.to_string(), key);
            }
            if let Some(name) = spec.index {
                iteration.insert(name.to_string(), Value::Int(ordinal as i64));
            }
            out.push_str(&self.render_child(frame, &body, level, &mut iteration));
        }
        out
    }

    fn render_set(&self, frame: &Frame<'_>, attrs: &AttrSet, block: &str, scope: &mut Scope) -> String {
        if self.pre {
            return self.residual(block);
        }
        let values: Vec<(String, Value)> = {
            let r = Resolver::new(scope, &frame.file.strings, false);
            attrs
                .named()
                .filter(|(key, _)| VAR_NAME.is_match(key))
                .map(|(key, raw)| (key.to_string(), attr_value(raw, &r)))
                .collect()
        };
        scope.extend(values);
        String::new()
    }

    fn render_rand(&self, frame: &Frame<'_>, attrs: &AttrSet, block: &str, scope: &mut Scope) -> String {
        let Some(var) = attrs.get("0").filter(|v| VAR_NAME.is_match(v)) else {
            return String::new();
        };
        if self.pre && !var.starts_with('$') {
            return self.residual(block);
        }
        let prefix = attrs.get("1").filter(|v| VAR_NAME.is_match(v)).unwrap_or("");
        let size = attrs
            .get("size")
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_RAND_SIZE);
        let exclude = match attrs.get("exclude") {
            Some(raw) => literal(raw, &frame.file.strings)
                .map(|v| v.to_string())
                .unwrap_or_else(|| raw.to_string()),
            None => String::new(),
        };
        let value = format!("{}{}", prefix, random_string(size, &exclude));
        scope.insert(var.to_string(), Value::Str(value));
        String::new()
    }

    fn render_function(
        &self,
        frame: &Frame<'_>,
        name: &str,
        attrs: &AttrSet,
        content: Option<&str>,
        block: &str,
        scope: &Scope,
    ) -> String {
        let Some(function) = self.env.functions.get(name) else {
            if self.pre {
                return self.residual(block);
            }
            tracing::debug!("Unknown function {}", name);
            return String::new();
        };
        if self.pre && !function.pre_aware() {
            return self.residual(block);
        }
        let fname = function_name(name);
        let ctx = FunctionContext {
            name: &fname,
            attrs,
            content,
            resolver: Resolver::new(scope, &frame.file.strings, self.pre),
            assets: self.env.assets,
            oembed: self.env.oembed,
        };
        match function.call(&ctx) {
            Some(html) => self.emit(&html),
            None if self.pre => self.residual(block),
            None => String::new(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn render_component(
        &self,
        frame: &Frame<'_>,
        kind: SourceKind,
        name: &str,
        attrs: &AttrSet,
        content: Option<&str>,
        block: &str,
        level: usize,
        scope: &Scope,
    ) -> String {
        if self.pre {
            return block.to_string();
        }
        if frame.depth >= MAX_COMPONENT_DEPTH {
            tracing::warn!("Component depth limit reached at <{}>", name);
            return String::new();
        }
        if kind == SourceKind::Import
            && !(frame.allow_import && scope.get("allowImport").is_some_and(Value::is_truthy))
        {
            tracing::debug!("Import of {} is not allowed here", name);
            return String::new();
        }
        let Some(file) = self.env.source.load(kind, name) else {
            tracing::debug!("Unknown component {}", name);
            return String::new();
        };

        let mut child = scope.clone();
        {
            let r = Resolver::new(scope, &frame.file.strings, false);
            for (key, raw) in attrs.named() {
                child.insert(key.to_string(), attr_value(raw, &r));
            }
            for spread in attrs.spreads() {
                let Some((expr, _)) = hole_of(spread) else {
                    continue;
                };
                let (key, path) = split_binding(expr);
                match (key, r.value(path).into_value()) {
                    (Some(key), value) => {
                        child.insert(key.to_string(), value);
                    }
                    (None, Value::Map(map)) => child.extend(map),
                    (None, value) => {
                        let key = path.rsplit('.').next().unwrap_or(path);
                        child.insert(key.to_string(), value);
                    }
                }
            }
        }

        let body_token = content.map(|content| {
            let mut caller = scope.clone();
            let body = self.render_fragment(frame, content, level + 1, &mut caller);
            let body = script::reinject(&body, &frame.file.scripts, self.env.hooks, |html| {
                self.state.stash(html)
            });
            self.state.stash(reinject_strings(&body, &frame.file.strings))
        });
        match &body_token {
            Some(token) => child.insert("body".to_string(), Value::Str(token.clone())),
            None => child.remove("body"),
        };

        let inner = Frame {
            file: file.as_ref(),
            body_token,
            allow_import: frame.allow_import && !disables_import(attrs),
            depth: frame.depth + 1,
        };
        let html = self.render_file(&inner, &mut child);
        self.state.stash(html)
    }
}

/// `_noimport` may be written bare or as `_noimport=true`.
fn disables_import(attrs: &AttrSet) -> bool {
    attrs.contains("_noimport") || attrs.args().contains(&"_noimport")
}

/// True when a pre-compile `each` body holds only unrollable placeholders.
fn foldable(content: &str) -> bool {
    if content.contains(FN_OPEN) {
        return false;
    }
    let mut pos = 0;
    while let Some(p) = next_placeholder(content, pos) {
        if !FOLDABLE_TAGS.contains(&p.name.to_ascii_lowercase().as_str()) {
            return false;
        }
        pos = p.end;
    }
    true
}

/// Renders a page and merges it into its layout.
///
/// The layout renders on a scoped thread while the page renders on the
/// caller's; a layout that fails to render is skipped.
pub fn compile(env: Env<'_>, file: &TemplateFile, scope: &Scope, layout_name: Option<&str>) -> String {
    let compiler = Compiler::new(env);
    let layout_file = layout_name
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .and_then(|name| env.source.load(SourceKind::Layout, name))
        .filter(|layout| layout.path != file.path);

    let (page, layout_html) = std::thread::scope(|s| {
        let handle = layout_file.as_deref().map(|layout| {
            let compiler = &compiler;
            s.spawn(move || compiler.render_root(layout, scope))
        });
        let page = compiler.render_root(file, scope);
        let layout_html = handle.and_then(|h| match h.join() {
            Ok(html) => Some(html),
            Err(_) => {
                tracing::warn!("Layout render failed for {}", file.path);
                None
            }
        });
        (page, layout_html)
    });

    // Stashed fragments are spliced in first so component output is visible
    // to the meta move.
    let page = compiler.state.assemble(&page);
    let merged = match layout_html {
        Some(layout_html) => layout::merge(&compiler.state.assemble(&layout_html), &page),
        None => page,
    };
    let html = decode_escapes(&merged);
    let html = layout::inject_public(&html, scope);
    layout::inject_youtube(&html, env.assets)
}

/// Folds `file` against a constant scope.
///
/// Returns the residual intermediate form and the attribute table extended
/// with the sets of residual conditions.
pub fn fold(env: Env<'_>, file: &TemplateFile, scope: &Scope) -> (String, Vec<AttrSet>) {
    let compiler = Compiler::folding(env, file);
    let html = compiler.render_root(file, scope);
    let mut attrs = file.attrs.clone();
    attrs.extend(
        compiler
            .extra_attrs
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner()),
    );
    (html, attrs)
}

/// Runs pre-aware functions whose arguments are all static, at any depth.
pub fn expand_static_functions(env: Env<'_>, html: &str, attrs: &[AttrSet], strings: &[StringEntry]) -> String {
    let empty_scope = Scope::new();
    let empty = AttrSet::new();
    let mut out = String::with_capacity(html.len());
    let mut pos = 0;
    let mut search = 0;
    while let Some(p) = next_placeholder(html, search) {
        search = p.end;
        if p.kind == PlaceholderKind::Close || !p.name.starts_with('_') || p.name.starts_with("_:") {
            continue;
        }
        let Some(function) = env.functions.get(p.name).filter(|f| f.pre_aware()) else {
            continue;
        };
        let set = p.attrs.and_then(|i| attrs.get(i)).unwrap_or(&empty);
        let (content, end) = match p.kind {
            PlaceholderKind::SelfClosing => (None, p.end),
            _ => match find_closer(html, p.end, p.name, p.depth) {
                Some((close_start, close_end)) => (Some(&html[p.end..close_start]), close_end),
                None => continue,
            },
        };
        let name = function_name(p.name);
        let ctx = FunctionContext {
            name: &name,
            attrs: set,
            content,
            resolver: Resolver::new(&empty_scope, strings, true),
            assets: env.assets,
            oembed: env.oembed,
        };
        if !ctx.is_static() {
            continue;
        }
        if let Some(result) = function.call(&ctx) {
            out.push_str(&html[pos..p.start]);
            out.push_str(&encode_escapes(&result));
            pos = end;
            search = end;
        }
    }
    out.push_str(&html[pos..]);
    out
}
