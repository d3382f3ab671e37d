// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! `<_json path indent prefix/>` renders a variable as JSON.
//!
//! `indent` (spaces per level, default 0 for compact output) and `prefix`
//! (spaces before every line after the first) are independent non-negative
//! integers, given positionally or as `indent=` / `prefix=`.

use super::{FunctionContext, TagFunction};
use crate::value::Value;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

/// The `json` tag function.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json;

fn spaces(ctx: &FunctionContext<'_>, key: &str, position: &str) -> usize {
    let raw = ctx.arg(key).or_else(|| ctx.arg(position));
    match raw.map(|r| ctx.resolver.value(r).into_value()) {
        Some(v) => v.as_int().map(|n| n.max(0) as usize).unwrap_or(0),
        None => 0,
    }
}

/// Serializes `value` with the given indent, then prefixes continuation lines.
pub fn to_json(value: &Value, indent: usize, prefix: usize) -> serde_json::Result<String> {
    let text = if indent == 0 {
        serde_json::to_string(value)?
    } else {
        let indent_bytes = vec![b' '; indent];
        let mut buf = Vec::new();
        let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(&indent_bytes));
        value.serialize(&mut ser)?;
        String::from_utf8_lossy(&buf).into_owned()
    };
    let text = text.replace('<', "\\u003c");
    if prefix == 0 {
        return Ok(text);
    }
    let pad = " ".repeat(prefix);
    Ok(text.replace('\n', &format!("\n{}", pad)))
}

impl TagFunction for Json {
    fn call(&self, ctx: &FunctionContext<'_>) -> Option<String> {
        let value = ctx.value("0").into_value();
        let indent = spaces(ctx, "indent", "1");
        let prefix = spaces(ctx, "prefix", "2");
        match to_json(&value, indent, prefix) {
            Ok(json) => Some(json),
            Err(e) => {
                tracing::warn!("json: failed to serialize value: {}", e);
                Some(String::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::AttrSet;
    use crate::value::{scope_from_json, Scope};
    use crate::vars::Resolver;
    use serde_json::json;

    fn call(attrs: AttrSet, scope: &Scope) -> String {
        let ctx = FunctionContext {
            name: "json",
            attrs: &attrs,
            content: None,
            resolver: Resolver::new(scope, &[], false),
            assets: "",
            oembed: None,
        };
        Json.call(&ctx).unwrap()
    }

    #[test]
    fn test_compact() {
        let scope = scope_from_json(json!({"user": {"name": "Ada", "tags": [1, 2]}}));
        assert_eq!(
            call(AttrSet::positional(["user"]), &scope),
            r#"{"name":"Ada","tags":[1,2]}"#
        );
        assert_eq!(call(AttrSet::positional(["missing"]), &scope), "null");
    }

    #[test]
    fn test_indent_and_prefix_are_independent() {
        let scope = scope_from_json(json!({"a": {"b": 1}}));
        assert_eq!(call(AttrSet::positional(["a", "2"]), &scope), "{\n  \"b\": 1\n}");
        assert_eq!(
            call(AttrSet::positional(["a", "2", "4"]), &scope),
            "{\n      \"b\": 1\n    }"
        );
        let mut named = AttrSet::positional(["a"]);
        named.insert("prefix", "1");
        assert_eq!(call(named, &scope), r#"{"b":1}"#);
    }

    #[test]
    fn test_script_safe() {
        let scope = scope_from_json(json!({"s": "</script>"}));
        assert_eq!(call(AttrSet::positional(["s"]), &scope), r#""\u003c/script>""#);
    }
}
