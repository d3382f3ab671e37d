// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Script sink.
//!
//! `<script>`, `<style>`, `<markdown>`, `<text>` and `<raw>` blocks (plus their
//! short aliases) are opaque to the template language. They are lifted out of
//! the source before tags are normalized and replaced with a
//! `<!_script <n>/>` marker, then rendered back at the end of a compile.

use crate::escape::escape_html;
use crate::lexer::{decode_escapes, decode_strings, encode_escapes, Decode, StringEntry};
use crate::markdown;
use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    static ref SCRIPT_MARKER: Regex = Regex::new(r"<!_script (\d+)/>").unwrap();
}

/// Kind of a captured block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    /// `script`, `js`
    Script,
    /// `style`, `css`, `less`
    Style,
    /// `markdown`, `md`
    Markdown,
    /// `text`, `txt`
    Text,
    /// `raw`
    Raw,
}

impl ScriptKind {
    /// One byte tag of the kind.
    pub fn tag(self) -> char {
        match self {
            ScriptKind::Script => 'j',
            ScriptKind::Style => 'c',
            ScriptKind::Markdown => 'm',
            ScriptKind::Text => 't',
            ScriptKind::Raw => 'r',
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "script" | "js" => ScriptKind::Script,
            "style" | "css" | "less" => ScriptKind::Style,
            "markdown" | "md" => ScriptKind::Markdown,
            "text" | "txt" => ScriptKind::Text,
            "raw" => ScriptKind::Raw,
            _ => return None,
        })
    }
}

/// A captured block.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptBlock {
    /// Block kind.
    pub kind: ScriptKind,
    /// Attribute text of the opening tag, leading whitespace included.
    pub attrs: String,
    /// Body exactly as written in the source.
    pub body: String,
    /// The block was written as `<less>`.
    pub less: bool,
}

/// Transformations applied to script and style bodies on output.
pub trait AssetHooks: Send + Sync {
    /// Minifies a script body.
    fn minify_js(&self, source: &str) -> String {
        source.to_string()
    }

    /// Compiles a LESS stylesheet to CSS.
    fn compile_less(&self, source: &str) -> String {
        source.to_string()
    }
}

/// Hooks that leave every body untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl AssetHooks for NoopHooks {}

impl ScriptBlock {
    /// Renders the block. The result is in encoded form.
    pub fn render(&self, hooks: &dyn AssetHooks) -> String {
        let html = match self.kind {
            ScriptKind::Script => {
                format!("<script{}>{}</script>", self.attrs, hooks.minify_js(&self.body))
            }
            ScriptKind::Style => {
                let css = if self.less {
                    hooks.compile_less(&self.body)
                } else {
                    self.body.clone()
                };
                format!("<style{}>{}</style>", self.attrs, css)
            }
            ScriptKind::Markdown => format!(
                "<div class=\"markdown\"{}>{}</div>",
                self.attrs,
                markdown::render(&self.body)
            ),
            ScriptKind::Text => format!(
                "<div class=\"text\"{}>{}</div>",
                self.attrs,
                escape_html(&self.body)
            ),
            ScriptKind::Raw => format!("<div class=\"raw\"{}>{}</div>", self.attrs, self.body),
        };
        encode_escapes(&html)
    }
}

fn tag_name_at(src: &str, pos: usize) -> Option<(&str, usize)> {
    let rest = &src[pos + 1..];
    let len = rest
        .bytes()
        .take_while(|b| b.is_ascii_alphabetic())
        .count();
    if len == 0 {
        return None;
    }
    match rest.as_bytes().get(len) {
        Some(b'>') | Some(b'/') | Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r') => {
            Some((&rest[..len], pos + 1 + len))
        }
        _ => None,
    }
}

fn find_closer(src: &str, from: usize, name: &str) -> Option<(usize, usize)> {
    let lower = src[from..].to_ascii_lowercase();
    let closer = format!("</{}", name);
    let mut search = 0;
    while let Some(idx) = lower[search..].find(&closer) {
        let start = search + idx;
        let after = start + closer.len();
        let tail = &lower[after..];
        let ws = tail.len() - tail.trim_start().len();
        if tail[ws..].starts_with('>') {
            return Some((from + start, from + after + ws + 1));
        }
        search = after;
    }
    None
}

/// Lifts blocks out of the source.
///
/// `strings` is the table produced by the lexer; bodies are stored with their
/// literals restored and the encoding escape decoded.
pub fn sink(src: &str, strings: &[StringEntry]) -> (String, Vec<ScriptBlock>) {
    let mut out = String::with_capacity(src.len());
    let mut blocks = Vec::new();
    let mut last = 0;
    let mut search = 0;

    while let Some(idx) = src[search..].find('<') {
        let pos = search + idx;
        search = pos + 1;
        let Some((name, name_end)) = tag_name_at(src, pos) else {
            continue;
        };
        let lname = name.to_ascii_lowercase();
        let Some(kind) = ScriptKind::from_name(&lname) else {
            continue;
        };
        let Some(gt) = src[name_end..].find('>').map(|i| name_end + i) else {
            continue;
        };
        let self_closing = src[..gt].ends_with('/');
        let attrs_end = if self_closing { gt - 1 } else { gt };
        let attrs = decode_escapes(&decode_strings(
            src[name_end..attrs_end].trim_end(),
            strings,
            Decode::Requote,
        ));

        let (body, end) = if self_closing {
            (String::new(), gt + 1)
        } else {
            match find_closer(src, gt + 1, &lname) {
                Some((body_end, end)) => (src[gt + 1..body_end].to_string(), end),
                None => {
                    tracing::warn!("Unterminated <{}> block kept verbatim", name);
                    continue;
                }
            }
        };

        out.push_str(&src[last..pos]);
        out.push_str(&format!("<!_script {}/>", blocks.len()));
        blocks.push(ScriptBlock {
            kind,
            attrs,
            body: decode_escapes(&decode_strings(&body, strings, Decode::Requote)),
            less: lname == "less",
        });
        last = end;
        search = end;
    }

    out.push_str(&src[last..]);
    (out, blocks)
}

/// Replaces every `<!_script n/>` marker using `emit` on the rendered block.
pub fn reinject<F>(text: &str, blocks: &[ScriptBlock], hooks: &dyn AssetHooks, mut emit: F) -> String
where
    F: FnMut(String) -> String,
{
    if !text.contains("<!_script ") {
        return text.to_string();
    }
    SCRIPT_MARKER
        .replace_all(text, |caps: &Captures| {
            match caps[1].parse::<usize>().ok().and_then(|n| blocks.get(n)) {
                Some(block) => emit(block.render(hooks)),
                None => String::new(),
            }
        })
        .into_owned()
}
