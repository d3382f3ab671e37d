// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Lexical extraction: encoding escape, comments and string literals.
//!
//! The template is rewritten source-to-source. Before any placeholder is
//! introduced, literal `%!` and `!%` are encoded as `%!o!%` and `%!c!%` so the
//! placeholder grammar (`%!s3!%`, `%!3!%`, `%!v3!%`, `%!fn:…!%`) stays
//! unambiguous. Quoted strings are lifted into a [`StringEntry`] table and
//! replaced with first-tier `%!s<n>!%` placeholders. Second-tier `%!<n>!%`
//! placeholders index the same table and survive into the intermediate form.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

/// Encoded form of a literal `%!`.
pub const OPEN_ESCAPE: &str = "%!o!%";
/// Encoded form of a literal `!%`.
pub const CLOSE_ESCAPE: &str = "%!c!%";
/// Shielded form of `{` in folded values.
pub const BRACE_ESCAPE: &str = "%!b!%";
/// Shielded form of `<` in folded values.
pub const TAG_ESCAPE: &str = "%!t!%";

lazy_static! {
    static ref STRING_HOLE: Regex = Regex::new(r"%!s(\d+)!%").unwrap();
    static ref SECOND_TIER: Regex = Regex::new(r"%!(\d+)!%").unwrap();
    static ref NUMERIC: Regex = Regex::new(r"^-?[0-9]+(\.[0-9]+)?$").unwrap();
}

/// A quoted literal lifted out of the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringEntry {
    /// Text between the quotes, escapes kept as written.
    pub body: String,
    /// The quote character: `"`, `'` or `` ` ``.
    pub quote: char,
}

impl StringEntry {
    /// Returns the literal with its quotes restored.
    pub fn requoted(&self) -> String {
        format!("{q}{}{q}", self.body, q = self.quote)
    }

    /// Returns the body with backslash escapes resolved.
    pub fn unescaped(&self) -> String {
        unescape_quoted(&self.body)
    }
}

/// How [`decode_strings`] rewrites `%!s<n>!%` placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decode {
    /// Restore the literal with its original quotes.
    Requote,
    /// Emit the bare body when it is an integer or decimal, else requote.
    NumericOnly,
    /// Emit the bare body.
    Unquote,
    /// Demote to a second-tier `%!<n>!%` reference.
    Rehash,
}

/// Replaces literal `%!` and `!%` with their encoded markers.
pub fn encode_escapes(src: &str) -> String {
    let bytes = src.as_bytes();
    let mut out = String::with_capacity(src.len());
    let mut last = 0;
    let mut i = 0;
    while i + 1 < bytes.len() {
        let marker = match (bytes[i], bytes[i + 1]) {
            (b'%', b'!') => OPEN_ESCAPE,
            (b'!', b'%') => CLOSE_ESCAPE,
            _ => {
                i += 1;
                continue;
            }
        };
        out.push_str(&src[last..i]);
        out.push_str(marker);
        i += 2;
        last = i;
    }
    out.push_str(&src[last..]);
    out
}

/// Encodes a value folded into an intermediate form.
///
/// Besides the escape markers, `{` and `<` are shielded so a later render of
/// the form cannot read the value as a hole or a tag.
pub fn shield(src: &str) -> String {
    encode_escapes(src)
        .replace('{', BRACE_ESCAPE)
        .replace('<', TAG_ESCAPE)
}

/// Reverses [`encode_escapes`] and [`shield`].
pub fn decode_escapes(src: &str) -> String {
    if !src.contains("%!") {
        return src.to_string();
    }
    let mut out = String::with_capacity(src.len());
    let mut rest = src;
    while let Some(pos) = rest.find("%!") {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if tail.starts_with(OPEN_ESCAPE) {
            out.push_str("%!");
            rest = &tail[OPEN_ESCAPE.len()..];
        } else if tail.starts_with(CLOSE_ESCAPE) {
            out.push_str("!%");
            rest = &tail[CLOSE_ESCAPE.len()..];
        } else if tail.starts_with(BRACE_ESCAPE) {
            out.push('{');
            rest = &tail[BRACE_ESCAPE.len()..];
        } else if tail.starts_with(TAG_ESCAPE) {
            out.push('<');
            rest = &tail[TAG_ESCAPE.len()..];
        } else {
            out.push_str("%!");
            rest = &tail[2..];
        }
    }
    out.push_str(rest);
    out
}

fn at_line_start(bytes: &[u8], pos: usize) -> bool {
    bytes[..pos]
        .iter()
        .rev()
        .take_while(|b| **b != b'\n')
        .all(|b| *b == b' ' || *b == b'\t' || *b == b'\r')
}

/// Finds the closing quote for a string starting at `start` (the opening quote).
fn closing_quote(bytes: &[u8], start: usize, quote: u8) -> Option<usize> {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return Some(i),
            _ => i += 1,
        }
    }
    None
}

/// Removes comments and lifts quoted strings into a table.
///
/// Returns the rewritten source and the string table. Comments and strings
/// that never terminate are kept verbatim.
pub fn extract(src: &str) -> (String, Vec<StringEntry>) {
    let bytes = src.as_bytes();
    let mut out = String::with_capacity(src.len());
    let mut table = Vec::new();
    let mut last = 0;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();

        let skip_to = if b == b'<' && src[i..].starts_with("<!--") {
            match src[i + 4..].find("-->") {
                Some(end) => Some(i + 4 + end + 3),
                None => {
                    tracing::warn!("Unterminated HTML comment kept verbatim");
                    break;
                }
            }
        } else if b == b'/' && next == Some(b'*') {
            match src[i + 2..].find("*/") {
                Some(end) => Some(i + 2 + end + 2),
                None => {
                    tracing::warn!("Unterminated block comment kept verbatim");
                    break;
                }
            }
        } else if ((b == b'/' && next == Some(b'/')) || (b == b'#' && next == Some(b'!')))
            && at_line_start(bytes, i)
        {
            Some(src[i..].find('\n').map(|end| i + end).unwrap_or(bytes.len()))
        } else {
            None
        };

        if let Some(end) = skip_to {
            out.push_str(&src[last..i]);
            i = end;
            last = i;
            continue;
        }

        let is_quote = match b {
            b'"' | b'`' => true,
            b'\'' => i == 0 || !bytes[i - 1].is_ascii_alphanumeric(),
            _ => false,
        };
        if is_quote {
            if let Some(end) = closing_quote(bytes, i, b) {
                out.push_str(&src[last..i]);
                out.push_str(&format!("%!s{}!%", table.len()));
                table.push(StringEntry {
                    body: src[i + 1..end].to_string(),
                    quote: b as char,
                });
                i = end + 1;
                last = i;
                continue;
            }
        }
        i += 1;
    }

    out.push_str(&src[last..]);
    (out, table)
}

/// Rewrites every first-tier `%!s<n>!%` placeholder according to `mode`.
pub fn decode_strings(text: &str, table: &[StringEntry], mode: Decode) -> String {
    STRING_HOLE
        .replace_all(text, |caps: &Captures| {
            let Some(entry) = caps[1].parse::<usize>().ok().and_then(|n| table.get(n)) else {
                return caps[0].to_string();
            };
            match mode {
                Decode::Requote => entry.requoted(),
                Decode::NumericOnly if NUMERIC.is_match(&entry.body) => entry.body.clone(),
                Decode::NumericOnly => entry.requoted(),
                Decode::Unquote => entry.body.clone(),
                Decode::Rehash => format!("%!{}!%", &caps[1]),
            }
        })
        .into_owned()
}

/// Restores second-tier `%!<n>!%` references with their quoted literal.
pub fn reinject_strings(text: &str, table: &[StringEntry]) -> String {
    if !text.contains("%!") {
        return text.to_string();
    }
    SECOND_TIER
        .replace_all(text, |caps: &Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|n| table.get(n))
                .map(StringEntry::requoted)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Parses an exact second-tier reference `%!<n>!%`.
pub fn second_tier_index(atom: &str) -> Option<usize> {
    atom.strip_prefix("%!")?.strip_suffix("!%")?.parse().ok()
}

/// Parses an exact first-tier reference `%!s<n>!%`.
pub fn first_tier_index(atom: &str) -> Option<usize> {
    atom.strip_prefix("%!s")?.strip_suffix("!%")?.parse().ok()
}

/// Resolves backslash escapes inside a quoted body.
pub fn unescape_quoted(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_roundtrip() {
        for src in ["plain", "50%! off", "wow!%", "%!%", "!%!", "%!c!%", "a%!s1!%b"] {
            let encoded = encode_escapes(src);
            assert_eq!(decode_escapes(&encoded), src, "source {:?}", src);
        }
    }

    #[test]
    fn test_shield_hides_holes_and_tags() {
        let shielded = shield("<b>{{user}}</b> %!b!%");
        assert!(!shielded.contains('{') && !shielded.contains('<'));
        assert_eq!(decode_escapes(&shielded), "<b>{{user}}</b> %!b!%");
    }

    #[test]
    fn test_encoded_has_no_stray_placeholders() {
        let encoded = encode_escapes("x %!s0!% y %!3!% z");
        assert!(!STRING_HOLE.is_match(&encoded));
        assert!(!SECOND_TIER.is_match(&encoded));
    }

    #[test]
    fn test_extract_strings() {
        let (out, table) = extract(r#"<a href="x.html" title='it\'s'>go</a>"#);
        assert_eq!(out, "<a href=%!s0!% title=%!s1!%>go</a>");
        assert_eq!(table[0], StringEntry { body: "x.html".into(), quote: '"' });
        assert_eq!(table[1].body, r"it\'s");
        assert_eq!(table[1].unescaped(), "it's");
        assert_eq!(decode_strings(&out, &table, Decode::Requote), r#"<a href="x.html" title='it\'s'>go</a>"#);
    }

    #[test]
    fn test_extract_comments() {
        let src = "<p>a</p><!-- gone -->\n// line comment\nkeep https://x.y\n/* block */b\n#! shebang\nc";
        let (out, table) = extract(src);
        assert!(table.is_empty());
        assert_eq!(out, "<p>a</p>\n\nkeep https://x.y\nb\n\nc");
    }

    #[test]
    fn test_apostrophe_is_not_a_string() {
        let (out, table) = extract("don't stop, it's 'fine'");
        assert_eq!(out, "don't stop, it's %!s0!%");
        assert_eq!(table[0].body, "fine");
    }

    #[test]
    fn test_unterminated_constructs_are_verbatim() {
        let (out, table) = extract("say \"hello");
        assert_eq!(out, "say \"hello");
        assert!(table.is_empty());

        let (out, _) = extract("a <!-- never closed");
        assert_eq!(out, "a <!-- never closed");
    }

    #[test]
    fn test_decode_modes() {
        let table = vec![
            StringEntry { body: "42".into(), quote: '\'' },
            StringEntry { body: "abc".into(), quote: '"' },
        ];
        let text = "%!s0!% %!s1!%";
        assert_eq!(decode_strings(text, &table, Decode::NumericOnly), "42 \"abc\"");
        assert_eq!(decode_strings(text, &table, Decode::Unquote), "42 abc");
        assert_eq!(decode_strings(text, &table, Decode::Rehash), "%!0!% %!1!%");
        assert_eq!(reinject_strings("%!0!% %!1!%", &table), "'42' \"abc\"");
    }

    #[test]
    fn test_tier_parsing() {
        assert_eq!(second_tier_index("%!12!%"), Some(12));
        assert_eq!(second_tier_index("%!s12!%"), None);
        assert_eq!(first_tier_index("%!s3!%"), Some(3));
    }
}
