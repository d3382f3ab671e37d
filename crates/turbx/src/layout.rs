// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Layout merge and head injection.
//!
//! A layout receives the rendered page at its `<BODY/>` marker. Layouts that
//! lack the marker get one synthesized at the first of these that exists:
//!
//! 1. before `</main>`
//! 2. after `</header>`
//! 3. before `<footer`
//! 4. before `</body>`
//! 5. before `</head>`
//! 6. at the end
//!
//! After the merge, `public.js` and `public.css` from the scope are written
//! into `<head>`, along with the YouTube client assets when the page uses them.

use crate::extensions::youtube::{CLIENT_CLASS, CLIENT_SCRIPT, CLIENT_STYLE};
use crate::value::{Scope, Value};
use lazy_static::lazy_static;
use regex::Regex;

/// The marker a layout carries where the page goes.
pub const BODY_MARKER: &str = "<BODY/>";

lazy_static! {
    static ref MARKER: Regex = Regex::new(r"(?i)<body\s*/>").unwrap();
    static ref META: Regex = Regex::new(r"(?i)<meta\b[^>]*>").unwrap();
    static ref HEAD_OPEN: Regex = Regex::new(r"(?i)<head(\s[^>]*)?>").unwrap();
}

/// Case-insensitive byte offset of `needle`.
fn find_ci(haystack: &str, needle: &str) -> Option<usize> {
    haystack.to_ascii_lowercase().find(&needle.to_ascii_lowercase())
}

fn insert_at(text: &str, at: usize, insert: &str) -> String {
    let mut out = String::with_capacity(text.len() + insert.len());
    out.push_str(&text[..at]);
    out.push_str(insert);
    out.push_str(&text[at..]);
    out
}

/// Returns the layout with a `<BODY/>` marker, synthesizing one if missing.
pub fn ensure_body_marker(layout: &str) -> String {
    if MARKER.is_match(layout) {
        return layout.to_string();
    }
    let at = find_ci(layout, "</main>")
        .or_else(|| find_ci(layout, "</header>").map(|i| i + "</header>".len()))
        .or_else(|| find_ci(layout, "<footer"))
        .or_else(|| find_ci(layout, "</body>"))
        .or_else(|| find_ci(layout, "</head>"))
        .unwrap_or(layout.len());
    insert_at(layout, at, BODY_MARKER)
}

/// Moves the page's `<meta>` tags into the layout's `<head>`.
///
/// Returns the layout and the page. Without a `<head>` nothing moves.
pub fn move_meta(layout: &str, page: &str) -> (String, String) {
    let Some(head) = HEAD_OPEN.find(layout) else {
        return (layout.to_string(), page.to_string());
    };
    let metas: String = META.find_iter(page).map(|m| m.as_str()).collect();
    if metas.is_empty() {
        return (layout.to_string(), page.to_string());
    }
    let layout = insert_at(layout, head.end(), &metas);
    (layout, META.replace_all(page, "").into_owned())
}

/// Removes stray `<BODY/>` markers.
pub fn strip_markers(text: &str) -> String {
    MARKER.replace_all(text, "").into_owned()
}

/// Splices `page` into the first `<BODY/>` marker of `layout`.
pub fn merge(layout: &str, page: &str) -> String {
    let layout = ensure_body_marker(layout);
    let page = strip_markers(page);
    let (layout, page) = move_meta(&layout, &page);
    match MARKER.find(&layout) {
        Some(m) => {
            let mut out = String::with_capacity(layout.len() + page.len());
            out.push_str(&layout[..m.start()]);
            out.push_str(&page);
            out.push_str(&strip_markers(&layout[m.end()..]));
            out
        }
        None => page,
    }
}

/// Inserts before `</head>`, or at the start when there is no head.
fn inject_head(html: &str, snippet: &str) -> String {
    match find_ci(html, "</head>") {
        Some(at) => insert_at(html, at, snippet),
        None => format!("{}{}", snippet, html),
    }
}

fn public_option<'s>(scope: &'s Scope, key: &str) -> Option<&'s std::collections::BTreeMap<String, Value>> {
    match scope.get("public")?.index(&Value::from(key))? {
        Value::Map(map) => Some(map),
        _ => None,
    }
}

fn css_variables(map: &std::collections::BTreeMap<String, Value>) -> String {
    let mut css = String::from("<style>:root{");
    for (key, value) in map {
        let key: String = key
            .chars()
            .filter(|c| c.is_alphanumeric() || matches!(c, '_' | '-'))
            .collect();
        if key.is_empty() {
            continue;
        }
        let value: String = value
            .to_string()
            .chars()
            .filter(|c| !matches!(c, ';' | '{' | '}' | '<' | '>'))
            .collect();
        css.push_str(&format!("--{}:{};", key, value));
    }
    css.push_str("}</style>");
    css
}

/// Writes `public.js` as `OPTS` and `public.css` as custom properties.
pub fn inject_public(html: &str, scope: &Scope) -> String {
    let mut snippet = String::new();
    if let Some(js) = public_option(scope, "js") {
        match serde_json::to_string(&Value::Map(js.clone())) {
            Ok(json) => snippet.push_str(&format!("<script>OPTS={}</script>", json.replace("</", "<\\/"))),
            Err(e) => tracing::warn!("Failed to serialize public.js: {}", e),
        }
    }
    if let Some(css) = public_option(scope, "css") {
        snippet.push_str(&css_variables(css));
    }
    if snippet.is_empty() {
        return html.to_string();
    }
    inject_head(html, &snippet)
}

/// Adds the YouTube client script and stylesheet when the page needs them.
pub fn inject_youtube(html: &str, assets: &str) -> String {
    if !html.contains(CLIENT_CLASS) || html.contains(CLIENT_SCRIPT) {
        return html.to_string();
    }
    let base = assets.trim_end_matches('/');
    let snippet = format!(
        "<script src=\"{base}/{}\" defer></script><link rel=\"stylesheet\" href=\"{base}/{}\"/>",
        CLIENT_SCRIPT, CLIENT_STYLE
    );
    inject_head(html, &snippet)
}
