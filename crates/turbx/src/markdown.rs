// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Inline markdown dialect.
//!
//! A streaming compiler over a byte reader with one byte of look-ahead. Each
//! line is dispatched on its first significant byte (heading, rule, list item,
//! blockquote) and the rest of the line goes through the inline pass:
//! emphasis families, code, autolinks and `[name](url){attrs}` links and
//! embeds. HTML tags, `{{holes}}` and `%!…!%` placeholders pass through
//! untouched, so the compiler can run over template text.

use crate::escape::escape_attr;

const IMAGE_EXT: &[&str] = &[
    "apng", "png", "jpg", "jpeg", "webp", "avif", "gif", "jfif", "pjpeg", "pjp", "svg", "bmp",
    "ico", "cur", "tif", "tiff",
];
const VIDEO_EXT: &[&str] = &["mp4", "mov", "webm", "avi", "mpeg", "ogv", "ts", "3gp", "3gp2"];
const AUDIO_EXT: &[&str] = &[
    "mp3", "wav", "weba", "ogg", "oga", "aac", "mid", "midi", "opus", "3gpp", "3gpp2",
];

/// Renders markdown to HTML.
pub fn render(src: &str) -> String {
    let mut compiler = Compiler::new(src);
    compiler.run();
    compiler.out
}

/// Renders a single line of inline markdown.
pub fn render_inline(src: &str) -> String {
    let mut compiler = Compiler::new(src);
    while !compiler.r.eof() {
        compiler.inline();
        if compiler.r.peek() == Some(b'\n') {
            compiler.out.push('\n');
            compiler.r.advance(1);
        }
    }
    compiler.out
}

struct Reader<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Reader<'a> {
    fn eof(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.as_bytes().get(self.pos + offset).copied()
    }

    fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.src.len());
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    /// The remainder of the current line, newline excluded.
    fn line(&self) -> &'a str {
        let rest = self.rest();
        &rest[..rest.find('\n').unwrap_or(rest.len())]
    }

    fn starts_with(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    fn prev(&self) -> Option<u8> {
        self.pos.checked_sub(1).map(|p| self.src.as_bytes()[p])
    }

    /// Copies one full UTF-8 character.
    fn take_char(&mut self, out: &mut String) {
        if let Some(c) = self.rest().chars().next() {
            out.push(c);
            self.pos += c.len_utf8();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Unordered,
    Ordered,
    Reversed,
}

impl ListKind {
    fn open(self) -> &'static str {
        match self {
            ListKind::Unordered => "<ul>",
            ListKind::Ordered => "<ol>",
            ListKind::Reversed => "<ol reversed>",
        }
    }

    fn close(self) -> &'static str {
        match self {
            ListKind::Unordered => "</ul>",
            ListKind::Ordered | ListKind::Reversed => "</ol>",
        }
    }

    fn same_family(self, other: ListKind) -> bool {
        (self == ListKind::Unordered) == (other == ListKind::Unordered)
    }
}

struct Compiler<'a> {
    r: Reader<'a>,
    out: String,
    lists: Vec<(usize, ListKind)>,
    quote_open: bool,
}

/// Parses a list marker at the start of `line`: kind, ordinal, marker length.
fn list_marker(line: &str) -> Option<(ListKind, Option<u64>, usize)> {
    let bytes = line.as_bytes();
    match bytes.first()? {
        b'-' | b'*' | b'~' if bytes.get(1) == Some(&b' ') => Some((ListKind::Unordered, None, 2)),
        b'0'..=b'9' => {
            let digits = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
            if bytes.get(digits) == Some(&b'.') && bytes.get(digits + 1) == Some(&b' ') {
                let n = line[..digits].parse().ok();
                Some((ListKind::Ordered, n, digits + 2))
            } else {
                None
            }
        }
        _ => None,
    }
}

fn indent_of(line: &str) -> (usize, usize) {
    let mut width = 0;
    let mut bytes = 0;
    for b in line.bytes() {
        match b {
            b' ' => width += 1,
            b'\t' => width += 4,
            _ => break,
        }
        bytes += 1;
    }
    (width, bytes)
}

fn is_rule(line: &str) -> bool {
    let trimmed = line.trim_end();
    trimmed.starts_with("---") && trimmed.bytes().all(|b| b == b'-' || b == b' ')
}

fn extension(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file = path.rsplit('/').next().unwrap_or(path);
    match file.rfind('.') {
        Some(i) => file[i + 1..].to_ascii_lowercase(),
        None => String::new(),
    }
}

fn media_type(kind: &str, ext: &str) -> String {
    let sub = match (kind, ext) {
        ("video", "mov") => "quicktime",
        ("video", "ogv") => "ogg",
        ("video", "ts") => "mp2t",
        ("video", "avi") => "x-msvideo",
        ("video", "3gp") => "3gpp",
        ("audio", "mp3") => "mpeg",
        ("audio", "oga") => "ogg",
        ("audio", "weba") => "webm",
        ("audio", "mid") => "midi",
        _ => ext,
    };
    format!("{}/{}", kind, sub)
}

fn is_url_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"_-.~:/?#[]@!$&\"'()*+,;%=".contains(&b)
}

/// Parsed `{attrs}` of a link or embed.
#[derive(Debug, Default, PartialEq)]
struct LinkAttrs {
    attrs: Vec<(String, Option<String>)>,
    style: Vec<String>,
}

impl LinkAttrs {
    fn parse(src: &str) -> Self {
        let bytes = src.as_bytes();
        let mut parsed = LinkAttrs::default();
        let mut i = 0;
        while i < bytes.len() {
            if matches!(bytes[i], b' ' | b';' | b'\t') {
                i += 1;
                continue;
            }
            let start = i;
            while i < bytes.len() && !matches!(bytes[i], b'=' | b':' | b' ' | b';' | b'\t') {
                i += 1;
            }
            let key = src[start..i].to_string();
            match bytes.get(i) {
                Some(b'=') => {
                    i += 1;
                    let value = match bytes.get(i) {
                        Some(q @ (b'"' | b'\'')) => {
                            let q = *q;
                            let vstart = i + 1;
                            let end = src[vstart..]
                                .find(q as char)
                                .map(|e| vstart + e)
                                .unwrap_or(bytes.len());
                            i = (end + 1).min(bytes.len());
                            src[vstart..end].to_string()
                        }
                        _ => {
                            let vstart = i;
                            while i < bytes.len() && !matches!(bytes[i], b' ' | b';' | b'\t') {
                                i += 1;
                            }
                            src[vstart..i].to_string()
                        }
                    };
                    parsed.attrs.push((key, Some(value)));
                }
                Some(b':') => {
                    i += 1;
                    let vstart = i;
                    while i < bytes.len() && bytes[i] != b';' {
                        i += 1;
                    }
                    parsed
                        .style
                        .push(format!("{}:{}", key.trim(), src[vstart..i].trim()));
                }
                _ => {
                    if !key.is_empty() {
                        parsed.attrs.push((key, None));
                    }
                }
            }
            if i == start {
                i += 1;
            }
        }
        parsed
    }

    fn take_flag(&mut self, name: &str) -> bool {
        let before = self.attrs.len();
        self.attrs.retain(|(k, _)| k != name);
        before != self.attrs.len()
    }

    fn render(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.attrs {
            out.push(' ');
            out.push_str(&escape_attr(key));
            if let Some(v) = value {
                out.push_str(&format!("=\"{}\"", escape_attr(v)));
            }
        }
        if !self.style.is_empty() {
            out.push_str(&format!(" style=\"{}\"", escape_attr(&self.style.join(";"))));
        }
        out
    }
}

/// Finds the `]` matching the `[` at `open`, honouring nesting and quotes.
fn matching_bracket(line: &str, open: usize) -> Option<usize> {
    let bytes = line.as_bytes();
    let mut depth = 0;
    let mut quote: Option<u8> = None;
    let mut i = open;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 1;
            } else if b == q {
                quote = None;
            }
        } else {
            match b {
                b'"' | b'`' => quote = Some(b),
                b'[' => depth += 1,
                b']' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    None
}

/// A parsed `[name](url){attrs}` span.
struct LinkSpan<'a> {
    name: &'a str,
    url: &'a str,
    attrs: Option<&'a str>,
    len: usize,
}

fn parse_link(line: &str) -> Option<LinkSpan<'_>> {
    let close = matching_bracket(line, 0)?;
    let after = &line[close + 1..];
    let inner = after.strip_prefix('(')?;
    let url_end = inner.find(')')?;
    let mut len = close + 1 + 1 + url_end + 1;
    let mut attrs = None;
    let tail = &line[len..];
    if tail.starts_with('{') && !tail.starts_with("{{") {
        if let Some(end) = tail.find('}') {
            attrs = Some(&tail[1..end]);
            len += end + 1;
        }
    }
    Some(LinkSpan {
        name: &line[1..close],
        url: inner[..url_end].trim(),
        attrs,
        len,
    })
}

/// Finds a closing run of exactly `n` bytes `c` in `line`.
fn closing_run(line: &str, c: u8, n: usize) -> Option<usize> {
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == c {
            let run = bytes[i..].iter().take_while(|b| **b == c).count();
            if run == n && i > 0 && !bytes[i - 1].is_ascii_whitespace() {
                return Some(i);
            }
            i += run;
        } else {
            i += 1;
        }
    }
    None
}

impl<'a> Compiler<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            r: Reader { src, pos: 0 },
            out: String::with_capacity(src.len() + src.len() / 4),
            lists: Vec::new(),
            quote_open: false,
        }
    }

    fn run(&mut self) {
        while !self.r.eof() {
            self.line();
        }
        self.close_lists(0);
        self.close_quote();
    }

    fn newline(&mut self, emit: bool) {
        if self.r.peek() == Some(b'\n') {
            if emit {
                self.out.push('\n');
            }
            self.r.advance(1);
        }
    }

    /// Closes open lists until `keep` remain.
    fn close_lists(&mut self, keep: usize) {
        while self.lists.len() > keep {
            if let Some((_, kind)) = self.lists.pop() {
                self.out.push_str(kind.close());
            }
        }
    }

    fn close_quote(&mut self) {
        if self.quote_open {
            self.out.push_str("</blockquote>");
            self.quote_open = false;
        }
    }

    fn line(&mut self) {
        let (mut indent, indent_bytes) = indent_of(self.r.line());
        let leading = &self.r.rest()[..indent_bytes];
        self.r.advance(indent_bytes);

        if self.r.line().trim().is_empty() {
            self.close_lists(0);
            self.close_quote();
            let blank = self.r.line().len();
            self.r.advance(blank);
            self.newline(true);
            return;
        }

        if self.r.peek() == Some(b'>') {
            if !self.quote_open {
                self.out.push_str("<blockquote>");
                self.quote_open = true;
            }
            self.r.advance(1);
            if self.r.peek() == Some(b' ') {
                self.r.advance(1);
            }
            indent = 0;
        } else {
            self.close_quote();
        }

        let line = self.r.line();
        if is_rule(line) {
            self.close_lists(0);
            self.out.push_str("<hr/>");
            self.r.advance(line.len());
            self.newline(true);
            return;
        }

        if self.r.peek() == Some(b'#') {
            let level = line.bytes().take_while(|b| *b == b'#').count();
            if level <= 6 {
                self.close_lists(0);
                self.r.advance(level);
                if self.r.peek() == Some(b' ') {
                    self.r.advance(1);
                }
                self.out.push_str(&format!("<h{}>", level));
                self.inline();
                self.out.push_str(&format!("</h{}>", level));
                self.newline(true);
                return;
            }
        }

        if let Some((kind, number, marker_len)) = list_marker(line) {
            self.open_item(indent, kind, number);
            self.r.advance(marker_len);
            self.out.push_str("<li>");
            self.inline();
            self.out.push_str("</li>");
            self.newline(false);
            return;
        }

        self.close_lists(0);
        self.out.push_str(leading);
        self.inline();
        self.newline(true);
    }

    fn open_item(&mut self, indent: usize, kind: ListKind, number: Option<u64>) {
        while let Some(&(top, _)) = self.lists.last() {
            if top > indent {
                self.close_lists(self.lists.len() - 1);
            } else {
                break;
            }
        }
        match self.lists.last() {
            Some(&(top, current)) if top == indent && current.same_family(kind) => return,
            Some(&(top, _)) if top == indent => self.close_lists(self.lists.len() - 1),
            _ => {}
        }
        let kind = match (kind, number) {
            (ListKind::Ordered, Some(n)) => match self.next_sibling_number(indent) {
                Some(next) if next < n => ListKind::Reversed,
                _ => ListKind::Ordered,
            },
            _ => kind,
        };
        self.out.push_str(kind.open());
        self.lists.push((indent, kind));
    }

    /// Ordinal of the next ordered item at the same indent, if any.
    fn next_sibling_number(&self, indent: usize) -> Option<u64> {
        for line in self.r.rest().split('\n').skip(1) {
            if line.trim().is_empty() {
                return None;
            }
            let (width, bytes) = indent_of(line);
            if width > indent {
                continue;
            }
            if width < indent {
                return None;
            }
            return match list_marker(&line[bytes..]) {
                Some((ListKind::Ordered, n, _)) => n,
                _ => None,
            };
        }
        None
    }

    /// Inline pass over the rest of the current line.
    fn inline(&mut self) {
        while let Some(b) = self.r.peek() {
            if b == b'\n' {
                return;
            }
            match b {
                b'\\' if self.r.peek_at(1).is_some_and(|c| c.is_ascii_punctuation()) => {
                    self.r.advance(1);
                    self.r.take_char(&mut self.out);
                }
                b'<' if self
                    .r
                    .peek_at(1)
                    .is_some_and(|c| c.is_ascii_alphabetic() || matches!(c, b'/' | b'!' | b'_')) =>
                {
                    self.passthrough(">", 1)
                }
                b'{' if self.r.starts_with("{{{") => self.passthrough("}}}", 3),
                b'{' if self.r.starts_with("{{") => self.passthrough("}}", 2),
                b'%' if self.r.peek_at(1) == Some(b'!') => self.passthrough("!%", 2),
                b'`' if self.r.starts_with("```") => self.code_fence(),
                b'`' => self.inline_code(),
                b'!' if self.r.peek_at(1) == Some(b'[') => self.link(true),
                b'[' => self.link(false),
                b'h' if self.at_autolink() => self.autolink(),
                b'*' => self.emphasis(),
                b'_' if self.r.starts_with("__") => {
                    self.wrap("__", "<u>", "</u>");
                }
                b'~' if self.r.starts_with("~~") => self.strike(),
                b'-' if self.r.starts_with("--") && !self.r.starts_with("---") => {
                    self.wrap("--", "<s>", "</s>");
                }
                _ => self.r.take_char(&mut self.out),
            }
        }
    }

    /// Copies through the next `end` marker (searching from `skip`), or one byte.
    fn passthrough(&mut self, end: &str, skip: usize) {
        let line = self.r.line();
        match line.get(skip..).and_then(|s| s.find(end)) {
            Some(i) => {
                let len = skip + i + end.len();
                self.out.push_str(&line[..len]);
                self.r.advance(len);
            }
            None => self.r.take_char(&mut self.out),
        }
    }

    fn code_fence(&mut self) {
        let rest = self.r.rest();
        let Some(close) = rest[3..].find("```").map(|i| i + 3) else {
            self.out.push_str("```");
            self.r.advance(3);
            return;
        };
        let inner = &rest[3..close];
        let lang_len = inner
            .bytes()
            .take_while(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'+'))
            .count();
        let (lang, body) = if lang_len > 0 && inner[lang_len..].starts_with('\n') {
            (&inner[..lang_len], &inner[lang_len + 1..])
        } else {
            ("", inner.strip_prefix('\n').unwrap_or(inner))
        };
        let body = body.strip_suffix('\n').unwrap_or(body);
        if lang.is_empty() {
            self.out.push_str(&format!("<pre>{}</pre>", body));
        } else {
            self.out
                .push_str(&format!("<code lang=\"{}\">{}</code>", escape_attr(lang), body));
        }
        self.r.advance(close + 3);
    }

    fn inline_code(&mut self) {
        let line = self.r.line();
        match line[1..].find('`') {
            Some(end) => {
                self.out.push_str(&format!("<pre>{}</pre>", &line[1..end + 1]));
                self.r.advance(end + 2);
            }
            None => self.r.take_char(&mut self.out),
        }
    }

    fn at_autolink(&self) -> bool {
        (self.r.starts_with("https://") || self.r.starts_with("http://"))
            && !self.r.prev().is_some_and(|p| p.is_ascii_alphanumeric())
    }

    fn autolink(&mut self) {
        let line = self.r.line();
        let mut len = line.bytes().take_while(|b| is_url_byte(*b)).count();
        // trailing punctuation belongs to the sentence
        while len > 0 {
            let last = line.as_bytes()[len - 1];
            let unbalanced_paren =
                last == b')' && line[..len].matches('(').count() < line[..len].matches(')').count();
            if matches!(last, b'.' | b',' | b';' | b':' | b'!' | b'?' | b'\'' | b'"') || unbalanced_paren {
                len -= 1;
            } else {
                break;
            }
        }
        let url = &line[..len];
        self.out.push_str(&format!(
            "<a href=\"{}\">{}</a>",
            escape_attr(url),
            url
        ));
        self.r.advance(len);
    }

    fn link(&mut self, embed: bool) {
        let offset = usize::from(embed);
        let line = &self.r.line()[offset..];
        let Some(span) = parse_link(line) else {
            self.r.take_char(&mut self.out);
            return;
        };
        let mut attrs = span.attrs.map(LinkAttrs::parse).unwrap_or_default();
        let html = if embed {
            embed_html(span.name, span.url, &mut attrs)
        } else {
            format!(
                "<a href=\"{}\"{}>{}</a>",
                escape_attr(span.url),
                attrs.render(),
                render_inline(span.name)
            )
        };
        self.out.push_str(&html);
        self.r.advance(offset + span.len);
    }

    fn emphasis(&mut self) {
        let line = self.r.line();
        let run = line.bytes().take_while(|b| *b == b'*').count();
        if run > 3 || line.as_bytes().get(run).map_or(true, |b| b.is_ascii_whitespace()) {
            self.out.push_str(&line[..run]);
            self.r.advance(run);
            return;
        }
        let Some(close) = closing_run(&line[run..], b'*', run) else {
            self.out.push_str(&line[..run]);
            self.r.advance(run);
            return;
        };
        let inner = render_inline(&line[run..run + close]);
        let (open, end) = match run {
            1 => ("<em>", "</em>"),
            2 => ("<strong>", "</strong>"),
            _ => ("<em><strong>", "</strong></em>"),
        };
        self.out.push_str(&format!("{}{}{}", open, inner, end));
        self.r.advance(run + close + run);
    }

    /// Wraps `marker…marker` in the given tags. Returns the bytes consumed,
    /// or `None` when the marker was emitted literally.
    fn wrap(&mut self, marker: &str, open: &str, close: &str) -> Option<usize> {
        let line = self.r.line();
        let body = &line[marker.len()..];
        let valid_start = body.bytes().next().is_some_and(|b| !b.is_ascii_whitespace());
        match body.find(marker).filter(|&end| valid_start && end > 0) {
            Some(end) => {
                self.out
                    .push_str(&format!("{}{}{}", open, render_inline(&body[..end]), close));
                let consumed = marker.len() + end + marker.len();
                self.r.advance(consumed);
                Some(consumed)
            }
            None => {
                self.out.push_str(marker);
                self.r.advance(marker.len());
                None
            }
        }
    }

    fn strike(&mut self) {
        if self.wrap("~~", "<del>", "</del>").is_none() {
            return;
        }
        let space = self.r.peek() == Some(b' ') && self.r.rest()[1..].starts_with("~~");
        if space {
            self.out.push(' ');
            self.r.advance(1);
        }
        if self.r.starts_with("~~") {
            self.wrap("~~", "<ins>", "</ins>");
        }
    }
}

fn embed_html(name: &str, url: &str, attrs: &mut LinkAttrs) -> String {
    let sources: Vec<&str> = url.split('|').map(str::trim).filter(|s| !s.is_empty()).collect();
    let first = sources.first().copied().unwrap_or("");
    let ext = extension(first);
    let media = if VIDEO_EXT.contains(&ext.as_str()) {
        Some("video")
    } else if AUDIO_EXT.contains(&ext.as_str()) {
        Some("audio")
    } else {
        None
    };

    if let Some(kind) = media {
        let controls = if attrs.take_flag("no-controls") {
            ""
        } else {
            " controls"
        };
        let mut html = format!("<{}{}{}>", kind, controls, attrs.render());
        for src in &sources {
            html.push_str(&format!(
                "<source src=\"{}\" type=\"{}\"/>",
                escape_attr(src),
                media_type(kind, &extension(src))
            ));
        }
        html.push_str(&render_inline(name));
        html.push_str(&format!("</{}>", kind));
        return html;
    }

    if IMAGE_EXT.contains(&ext.as_str()) {
        return format!(
            "<img src=\"{}\" alt=\"{}\"{}/>",
            escape_attr(first),
            escape_attr(name),
            attrs.render()
        );
    }

    format!(
        "<iframe src=\"{}\" title=\"{}\"{}></iframe>",
        escape_attr(first),
        escape_attr(name),
        attrs.render()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headings() {
        assert_eq!(render("# Hello"), "<h1>Hello</h1>");
        assert_eq!(render("### Three\ntext"), "<h3>Three</h3>\ntext");
        assert_eq!(render("####### seven"), "####### seven");
    }

    #[test]
    fn test_nested_list() {
        assert_eq!(
            render("- a\n  - b\n- c"),
            "<ul><li>a</li><ul><li>b</li></ul><li>c</li></ul>"
        );
    }

    #[test]
    fn test_ordered_lists() {
        assert_eq!(render("1. a\n2. b"), "<ol><li>a</li><li>b</li></ol>");
        assert_eq!(render("3. c\n2. b\n1. a"), "<ol reversed><li>c</li><li>b</li><li>a</li></ol>");
        assert_eq!(render("- a\n\ntext"), "<ul><li>a</li></ul>\ntext");
    }

    #[test]
    fn test_rule_and_quote() {
        assert_eq!(render("---"), "<hr/>");
        assert_eq!(render("- - -"), "<ul><li>- -</li></ul>");
        assert_eq!(render("> quoted\n> more\nafter"), "<blockquote>quoted\nmore\n</blockquote>after");
    }

    #[test]
    fn test_emphasis() {
        assert_eq!(render("*a* **b** ***c***"), "<em>a</em> <strong>b</strong> <em><strong>c</strong></em>");
        assert_eq!(render("***x***"), "<em><strong>x</strong></em>");
        assert_eq!(render("__u__ --s--"), "<u>u</u> <s>s</s>");
        assert_eq!(render("~~old~~~~new~~"), "<del>old</del><ins>new</ins>");
        assert_eq!(render("~~old~~ ~~new~~"), "<del>old</del> <ins>new</ins>");
        assert_eq!(render("2 * 3 * 4"), "2 * 3 * 4");
    }

    #[test]
    fn test_code() {
        assert_eq!(render("```\nlet a;\n```"), "<pre>let a;</pre>");
        assert_eq!(render("```js\nlet a;\n```"), "<code lang=\"js\">let a;</code>");
        assert_eq!(render("use `x` here"), "use <pre>x</pre> here");
    }

    #[test]
    fn test_autolink() {
        assert_eq!(
            render("visit https://example.com."),
            "visit <a href=\"https://example.com\">https://example.com</a>."
        );
        assert_eq!(
            render("(see https://a.b/c?d=1)"),
            "(see <a href=\"https://a.b/c?d=1\">https://a.b/c?d=1</a>)"
        );
    }

    #[test]
    fn test_links_and_embeds() {
        assert_eq!(
            render("![alt](clip.mp4)"),
            "<video controls><source src=\"clip.mp4\" type=\"video/mp4\"/>alt</video>"
        );
        assert_eq!(
            render("![a](x.webm|x.mp4){no-controls loop}"),
            "<video loop><source src=\"x.webm\" type=\"video/webm\"/><source src=\"x.mp4\" type=\"video/mp4\"/>a</video>"
        );
        assert_eq!(render("![cat](cat.PNG)"), "<img src=\"cat.PNG\" alt=\"cat\"/>");
        assert_eq!(
            render("![song](a.mp3)"),
            "<audio controls><source src=\"a.mp3\" type=\"audio/mpeg\"/>song</audio>"
        );
        assert_eq!(
            render("![map](https://maps.example/embed)"),
            "<iframe src=\"https://maps.example/embed\" title=\"map\"></iframe>"
        );
        assert_eq!(
            render("[**docs** [v2]](/docs){target=_blank color:red; bold}"),
            "<a href=\"/docs\" target=\"_blank\" bold style=\"color:red\"><strong>docs</strong> [v2]</a>"
        );
        assert_eq!(render("[not a link]"), "[not a link]");
    }

    #[test]
    fn test_attrs_always_advance() {
        let parsed = LinkAttrs::parse("a=\"unterminated b:c");
        assert_eq!(parsed.attrs, vec![("a".to_string(), Some("unterminated b:c".to_string()))]);
        let parsed = LinkAttrs::parse("=;:==");
        assert!(parsed.attrs.len() <= 3);
    }

    #[test]
    fn test_passthrough() {
        assert_eq!(render("<div class=\"*x*\">{{a*b}}</div>"), "<div class=\"*x*\">{{a*b}}</div>");
        assert_eq!(render("<_if:0 0>*y*</_if:0>"), "<_if:0 0><em>y</em></_if:0>");
    }
}
