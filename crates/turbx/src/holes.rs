// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! `{{expr}}` / `{{{expr}}}` interpolation holes.

use crate::lexer::{decode_strings, Decode, StringEntry};

/// Walks every hole in `text` and replaces it with the result of `f`.
///
/// `f` receives the trimmed expression and the raw flag (`true` for triple
/// braces). Returning `None` keeps the hole verbatim.
pub fn replace_holes<F>(text: &str, mut f: F) -> String
where
    F: FnMut(&str, bool) -> Option<String>,
{
    if !text.contains("{{") {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find("{{") {
        let raw = rest[open..].starts_with("{{{");
        let (open_len, close) = if raw { (3, "}}}") } else { (2, "}}") };
        let inner_start = open + open_len;
        let Some(close_at) = rest[inner_start..].find(close) else {
            break;
        };
        let inner_end = inner_start + close_at;
        let end = inner_end + close.len();
        out.push_str(&rest[..open]);
        match f(rest[inner_start..inner_end].trim(), raw) {
            Some(replacement) => out.push_str(&replacement),
            None => out.push_str(&rest[open..end]),
        }
        rest = &rest[end..];
    }
    out.push_str(rest);
    out
}

/// Demotes string literals inside holes to second-tier references so the
/// expression survives later rewrites untouched.
pub fn preserve(text: &str, strings: &[StringEntry]) -> String {
    replace_holes(text, |expr, raw| {
        let expr = decode_strings(expr, strings, Decode::Rehash);
        Some(if raw {
            format!("{{{{{{{}}}}}}}", expr)
        } else {
            format!("{{{{{}}}}}", expr)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_holes() {
        let out = replace_holes("a {{ x }} b {{{y}}} c {{z", |expr, raw| {
            Some(format!("[{}:{}]", expr, raw))
        });
        assert_eq!(out, "a [x:false] b [y:true] c {{z");
    }

    #[test]
    fn test_keep_verbatim() {
        let out = replace_holes("{{a}}{{b}}", |expr, _| (expr == "a").then(|| "A".to_string()));
        assert_eq!(out, "A{{b}}");
    }

    #[test]
    fn test_preserve_demotes_strings() {
        let strings = vec![StringEntry { body: "none".into(), quote: '\'' }];
        assert_eq!(preserve("<p>{{ name | %!s0!% }}</p>", &strings), "<p>{{name | %!0!%}}</p>");
        assert_eq!(preserve("{{{ html }}}", &strings), "{{{html}}}");
    }
}
