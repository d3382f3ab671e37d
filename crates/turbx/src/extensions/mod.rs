// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Tag functions.
//!
//! A tag function handles `<_name …/>` or `<_name …>content</_name>`. The
//! control-flow tags (`if`, `each`, `set`, `rand`) are part of the compiler;
//! everything else goes through a [`FunctionRegistry`]: built-ins first, then
//! functions registered by the host.
//!
//! Functions that are [`pre_aware`](TagFunction::pre_aware) also run during
//! pre-compile, where only constant data is visible. They return `None` to
//! leave the tag for the compile pass.

/// `<_json>`
pub mod json;
/// `<_lorem>`
pub mod lorem;
/// `<_youtube>` / `<_yt>`
pub mod youtube;

use crate::error::{Result, TurbxError};
use crate::lexer::second_tier_index;
use crate::tags::{hole_of, AttrSet};
use crate::value::Value;
use crate::vars::{literal, split_binding, Lookup, Resolver};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub use youtube::{OEmbed, OEmbedProvider};

/// Names that user functions may not take.
pub const RESERVED: &[&str] = &["if", "elif", "else", "each"];

/// Everything a tag function sees of its call site.
pub struct FunctionContext<'a> {
    /// Function name without the leading `_`.
    pub name: &'a str,
    /// Attributes of the tag.
    pub attrs: &'a AttrSet,
    /// Content between the opening and closing tag, in intermediate form.
    pub content: Option<&'a str>,
    /// Variable access.
    pub resolver: Resolver<'a>,
    /// Base URL of the engine's static assets.
    pub assets: &'a str,
    /// oEmbed metadata source; `None` selects fast mode.
    pub oembed: Option<&'a dyn OEmbedProvider>,
}

impl<'a> FunctionContext<'a> {
    /// True during pre-compile.
    pub fn is_pre(&self) -> bool {
        self.resolver.is_pre()
    }

    /// Raw attribute value.
    pub fn arg(&self, key: &str) -> Option<&'a str> {
        self.attrs.get(key)
    }

    /// Resolves an attribute as a variable path (or hole, or literal).
    pub fn value(&self, key: &str) -> Lookup {
        match self.arg(key) {
            Some(raw) => self.resolve(raw),
            None => Lookup::Found(Value::Null),
        }
    }

    /// Resolves an attribute as a word: bare tokens are taken literally,
    /// holes are looked up. `None` when the value depends on request data.
    pub fn word(&self, key: &str) -> Option<Option<String>> {
        let Some(raw) = self.arg(key) else {
            return Some(None);
        };
        if hole_of(raw).is_some() {
            return match self.resolve(raw) {
                Lookup::Found(v) => Some(Some(v.to_string())),
                Lookup::Unknown => None,
            };
        }
        Some(Some(match literal(raw, self.resolver.strings()) {
            Some(v) if second_tier_index(raw).is_some() || raw.starts_with(['\'', '"', '`']) => {
                v.to_string()
            }
            _ => raw.to_string(),
        }))
    }

    fn resolve(&self, raw: &str) -> Lookup {
        match hole_of(raw) {
            Some((expr, _)) => self.resolver.value(split_binding(expr).1),
            None => self.resolver.value(raw),
        }
    }

    /// True when no attribute is a `{{…}}` hole.
    pub fn is_static(&self) -> bool {
        self.attrs.iter().all(|(_, v)| hole_of(v).is_none())
    }
}

/// A tag function.
pub trait TagFunction: Send + Sync {
    /// Produces the HTML that replaces the tag. `None` keeps the tag for a
    /// later pass and is only meaningful during pre-compile.
    fn call(&self, ctx: &FunctionContext<'_>) -> Option<String>;

    /// Whether the function may run during pre-compile.
    fn pre_aware(&self) -> bool {
        false
    }
}

impl<F> TagFunction for F
where
    F: Fn(&FunctionContext<'_>) -> String + Send + Sync,
{
    fn call(&self, ctx: &FunctionContext<'_>) -> Option<String> {
        Some(self(ctx))
    }
}

/// Built-in and host-registered tag functions.
#[derive(Clone)]
pub struct FunctionRegistry {
    builtins: HashMap<String, Arc<dyn TagFunction>>,
    user: Arc<RwLock<HashMap<String, Arc<dyn TagFunction>>>>,
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.builtins.keys().collect();
        names.sort();
        f.debug_struct("FunctionRegistry")
            .field("builtins", &names)
            .finish_non_exhaustive()
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalizes a tag name (`_Json` → `json`).
pub fn function_name(tag: &str) -> String {
    tag.trim_start_matches('_').to_ascii_lowercase()
}

impl FunctionRegistry {
    /// Creates a registry with the built-in functions.
    pub fn new() -> Self {
        let mut builtins: HashMap<String, Arc<dyn TagFunction>> = HashMap::new();
        builtins.insert("json".into(), Arc::new(json::Json));
        builtins.insert("lorem".into(), Arc::new(lorem::Lorem));
        let yt: Arc<dyn TagFunction> = Arc::new(youtube::YouTube);
        builtins.insert("youtube".into(), yt.clone());
        builtins.insert("yt".into(), yt);
        Self {
            builtins,
            user: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Registers a host function.
    ///
    /// # Errors
    ///
    /// Returns [`TurbxError::ReservedFunction`] for `if`, `elif`, `else` and
    /// `each`.
    pub fn register(&self, name: &str, function: Arc<dyn TagFunction>) -> Result<()> {
        let name = function_name(name);
        if RESERVED.contains(&name.as_str()) {
            return Err(TurbxError::ReservedFunction(name));
        }
        if self.builtins.contains_key(&name) {
            tracing::warn!("Function '{}' is shadowed by a built-in", name);
        }
        self.user
            .write()
            .map_err(|_| TurbxError::Cache("Failed to acquire function lock".to_string()))?
            .insert(name, function);
        Ok(())
    }

    /// Looks up a function: built-ins first, then host functions.
    pub fn get(&self, name: &str) -> Option<Arc<dyn TagFunction>> {
        let name = function_name(name);
        if let Some(f) = self.builtins.get(&name) {
            return Some(f.clone());
        }
        self.user.read().ok()?.get(&name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::StringEntry;
    use crate::value::Scope;

    fn ctx<'a>(attrs: &'a AttrSet, resolver: Resolver<'a>) -> FunctionContext<'a> {
        FunctionContext {
            name: "test",
            attrs,
            content: None,
            resolver,
            assets: "/assets",
            oembed: None,
        }
    }

    fn shout(ctx: &FunctionContext<'_>) -> String {
        ctx.arg("0").unwrap_or_default().to_uppercase()
    }

    fn nothing(_: &FunctionContext<'_>) -> String {
        String::new()
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = FunctionRegistry::new();
        registry.register("_Shout", Arc::new(shout)).unwrap();
        assert!(registry.get("shout").is_some());
        assert!(registry.get("_json").is_some());
        assert!(registry.get("yt").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_reserved_names() {
        let registry = FunctionRegistry::new();
        for name in ["if", "_each", "Else", "elif"] {
            let err = registry.register(name, Arc::new(nothing)).unwrap_err();
            assert!(matches!(err, TurbxError::ReservedFunction(_)));
        }
    }

    #[test]
    fn test_context_values() {
        let mut scope = Scope::new();
        scope.insert("user".into(), Value::from("ada"));
        let strings = vec![StringEntry { body: "quoted".into(), quote: '"' }];
        let mut attrs = AttrSet::new();
        attrs.insert("0", "user");
        attrs.insert("type", "p");
        attrs.insert("label", "%!0!%");
        attrs.insert("who", "{{user}}");

        let r = Resolver::new(&scope, &strings, false);
        let c = ctx(&attrs, r);
        assert_eq!(c.value("0"), Lookup::Found(Value::from("ada")));
        assert_eq!(c.word("type"), Some(Some("p".into())));
        assert_eq!(c.word("label"), Some(Some("quoted".into())));
        assert_eq!(c.word("who"), Some(Some("ada".into())));
        assert_eq!(c.word("missing"), Some(None));
        assert!(!c.is_static());

        let empty = Scope::new();
        let pre = Resolver::new(&empty, &strings, true);
        let c = ctx(&attrs, pre);
        assert_eq!(c.word("who"), None);
        assert_eq!(c.value("0"), Lookup::Unknown);
    }
}
