// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The turbx engine handle.
//!
//! This module provides the [`Engine`] type that owns everything shared
//! between renders: the resolver, the file cache, the option store and the
//! function registry.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use turbx::{Engine, FileSystemResolver};
//!
//! let engine = Engine::with_memory_cache(FileSystemResolver::new(), 1024);
//! engine.set_option("root", "./views");
//!
//! let html = engine.compile_json("index", serde_json::json!({ "name": "World" }))?;
//! ```
//!
//! # Pipeline
//!
//! Pre-compiling a file runs the source-to-source passes once and caches
//! the result under the file's key:
//!
//! 1. encoding escape and string extraction
//! 2. script sink
//! 3. tag normalization
//! 4. hole preservation
//! 5. optional markdown pass
//! 6. static pre-functions (`lorem`, `youtube`)
//!
//! When a request carries constant data (a `const` map or `$`-prefixed
//! keys), the record is additionally folded against it and cached under the
//! `.pre` twin key. Compile renders the best available record.

use crate::cache::{fingerprint, pre_key, Cache, MemoryCache, TemplateFile};
use crate::compiler::{self, Env, FileSource, SourceKind};
use crate::error::Result;
use crate::extensions::{FunctionContext, FunctionRegistry, OEmbedProvider, TagFunction};
use crate::holes;
use crate::lexer::{decode_strings, encode_escapes, extract, Decode};
use crate::markdown;
use crate::options::{self, EngineOptions};
use crate::resolver::ResourceResolver;
use crate::script::{sink, AssetHooks, NoopHooks};
use crate::tags::normalize;
use crate::value::{scope_from_json, Scope, Value};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Main turbx engine.
///
/// The engine is generic over the resource resolver type `R`, allowing
/// different template loading strategies (filesystem, memory, ...).
///
/// # Examples
///
/// ```rust,ignore
/// use turbx::{Engine, MemoryResourceResolver, MemoryCache};
///
/// let resolver = MemoryResourceResolver::new();
/// resolver.add_template("hello.xhtml", "<h1>Hello, {{name}}!</h1>");
///
/// let engine = Engine::new(resolver, Box::new(MemoryCache::new(100)));
/// ```
pub struct Engine<R: ResourceResolver> {
    resolver: R,
    cache: Box<dyn Cache>,
    options: RwLock<HashMap<String, String>>,
    functions: FunctionRegistry,
    hooks: Box<dyn AssetHooks>,
    oembed: Option<Box<dyn OEmbedProvider>>,
}

impl<R: ResourceResolver + std::fmt::Debug> std::fmt::Debug for Engine<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("resolver", &self.resolver)
            .field("cache", &self.cache)
            .field("functions", &self.functions)
            .finish_non_exhaustive()
    }
}

/// Collects the constant scope of a request: the `const` map and every
/// `$`-prefixed key.
pub fn constant_scope(scope: &Scope) -> Scope {
    let mut constants = Scope::new();
    if let Some(Value::Map(map)) = scope.get("const") {
        constants.extend(map.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    constants.extend(
        scope
            .iter()
            .filter(|(k, _)| k.starts_with('$'))
            .map(|(k, v)| (k.clone(), v.clone())),
    );
    constants
}

impl<R: ResourceResolver> Engine<R> {
    /// Creates a new engine with the given resolver and cache.
    pub fn new(resolver: R, cache: Box<dyn Cache>) -> Self {
        Self {
            resolver,
            cache,
            options: RwLock::new(HashMap::new()),
            functions: FunctionRegistry::new(),
            hooks: Box::new(NoopHooks),
            oembed: None,
        }
    }

    /// Creates a new engine with an in-memory LRU cache.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let engine = Engine::with_memory_cache(FileSystemResolver::new(), 1024);
    /// ```
    pub fn with_memory_cache(resolver: R, capacity: usize) -> Self {
        Self::new(resolver, Box::new(MemoryCache::new(capacity)))
    }

    /// Returns a reference to the resolver used by this engine.
    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Sets an engine option.
    ///
    /// `cache` changes the TTL of records stored from now on. Changing `root`
    /// or `ext` drops every cached record.
    pub fn set_option(&self, key: &str, value: &str) {
        let key = key.trim();
        let value = value.trim();
        if key == options::CACHE {
            match options::parse_ttl(value) {
                Some(ttl) => self.cache.set_ttl(ttl),
                None => tracing::warn!("Ignoring invalid cache TTL '{}'", value),
            }
        }
        let previous = match self.options.write() {
            Ok(mut options) => options.insert(key.to_string(), value.to_string()),
            Err(_) => {
                tracing::warn!("Option store is poisoned; '{}' not set", key);
                return;
            }
        };
        if matches!(key, options::ROOT | options::EXT | options::MARKDOWN)
            && previous.as_deref() != Some(value)
        {
            if let Err(e) = self.cache.clear() {
                tracing::warn!("Failed to clear cache: {}", e);
            }
        }
        tracing::debug!("Option {} = {}", key, value);
    }

    /// Returns the raw value of an option.
    pub fn option(&self, key: &str) -> Option<String> {
        self.options.read().ok()?.get(key).cloned()
    }

    /// Takes a typed snapshot of the options.
    pub fn options(&self) -> EngineOptions {
        match self.options.read() {
            Ok(map) => EngineOptions::from_map(&map),
            Err(_) => EngineOptions::default(),
        }
    }

    /// Replaces the script and style hooks.
    pub fn set_hooks(&mut self, hooks: impl AssetHooks + 'static) {
        self.hooks = Box::new(hooks);
    }

    /// Sets the oEmbed provider used by `<_youtube>`. Without one, embeds are
    /// rendered as client-side placeholders.
    pub fn set_oembed(&mut self, provider: impl OEmbedProvider + 'static) {
        self.oembed = Some(Box::new(provider));
    }

    /// Registers a user tag function.
    ///
    /// # Errors
    ///
    /// Fails for the reserved names `if`, `elif`, `else` and `each`.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// engine.register_function("upper", |ctx: &FunctionContext<'_>| {
    ///     ctx.value("0").into_value().to_string().to_uppercase()
    /// })?;
    /// ```
    pub fn register_function<F>(&self, name: &str, function: F) -> Result<()>
    where
        F: Fn(&FunctionContext<'_>) -> String + Send + Sync + 'static,
    {
        self.functions.register(name, Arc::new(function))
    }

    /// Registers a user tag function implementing [`TagFunction`] directly,
    /// which allows it to be pre-aware.
    pub fn register_tag_function(&self, name: &str, function: Arc<dyn TagFunction>) -> Result<()> {
        self.functions.register(name, function)
    }

    /// Normalizes a template path into its cache key: forward slashes, no
    /// leading slash, no extension.
    pub fn cache_key(&self, path: &str) -> String {
        key_for(path, &self.options().ext)
    }

    fn env<'a>(&'a self, assets: &'a str) -> Env<'a> {
        Env {
            source: self,
            functions: &self.functions,
            hooks: &*self.hooks,
            oembed: self.oembed.as_deref(),
            assets,
        }
    }

    fn build(&self, key: &str, source: &str, opts: &EngineOptions) -> TemplateFile {
        let encoded = encode_escapes(source);
        let (text, strings) = extract(&encoded);
        let (text, scripts) = sink(&text, &strings);
        let normalized = normalize(&text, &strings);
        let mut html = holes::preserve(&normalized.html, &strings);
        if opts.markdown {
            html = markdown::render(&html);
        }
        let html = decode_strings(&html, &strings, Decode::Requote);
        let html = compiler::expand_static_functions(self.env(&opts.assets), &html, &normalized.attrs, &strings);

        let mut file = TemplateFile::new(key, html, normalized.attrs, strings, scripts);
        file.fingerprint = fingerprint(source);
        file
    }

    /// Pre-compiles a template and caches its intermediate form.
    ///
    /// # Errors
    ///
    /// Returns [`TurbxError::NotFound`](crate::TurbxError::NotFound) or
    /// [`TurbxError::PathLeak`](crate::TurbxError::PathLeak) when the file
    /// cannot be located, and I/O errors from reading it.
    pub fn precompile(&self, path: &str) -> Result<Arc<TemplateFile>> {
        let opts = self.options();
        let key = key_for(path, &opts.ext);
        if let Some(file) = self.cache.get(&key)? {
            return Ok(file);
        }
        let name = format!("{}.{}", key, opts.ext);
        let resolved = self.resolver.resolve(&opts.root, &name)?;
        let file = Arc::new(self.build(&key, &resolved.source, &opts));
        tracing::debug!("Pre-compiled {} ({} attribute sets)", key, file.attrs.len());
        self.cache.set(&key, file.clone())?;
        Ok(file)
    }

    /// Returns true when the intermediate form of `path` is cached.
    pub fn has_precompiled(&self, path: &str) -> bool {
        self.cache.contains_key(&self.cache_key(path))
    }

    /// Folds a record against constant data, reusing the cached `.pre` twin
    /// while neither the source nor the constants changed.
    fn folded(&self, base: &Arc<TemplateFile>, constants: &Scope, opts: &EngineOptions) -> Result<Arc<TemplateFile>> {
        let key = pre_key(&base.path);
        let constants_json = serde_json::to_string(constants)?;
        let fp = fingerprint(&format!("{}{}", base.fingerprint, constants_json));
        if let Some(file) = self.cache.get(&key)? {
            if file.fingerprint == fp {
                return Ok(file);
            }
        }
        let (html, attrs) = compiler::fold(self.env(&opts.assets), base, constants);
        let file = Arc::new(TemplateFile {
            path: base.path.clone(),
            html,
            attrs,
            strings: base.strings.clone(),
            scripts: base.scripts.clone(),
            fingerprint: fp,
        });
        self.cache.set(&key, file.clone())?;
        Ok(file)
    }

    /// Compiles a template against a scope.
    ///
    /// The layout comes from the scope's `template` entry, else from the
    /// `template` option. Entries of the scope's `const` map are visible as
    /// top-level names.
    ///
    /// # Errors
    ///
    /// Fails when the page itself cannot be loaded. Missing components and
    /// layouts render empty.
    pub fn compile(&self, path: &str, scope: &Scope) -> Result<String> {
        let opts = self.options();
        let base = self.precompile(path)?;
        let constants = constant_scope(scope);
        let file = if constants.is_empty() {
            base
        } else {
            self.folded(&base, &constants, &opts)?
        };
        let mut scope = scope.clone();
        let shared = scope.get("const").cloned();
        if let Some(Value::Map(map)) = shared {
            scope.extend(map);
        }
        Ok(self.render_with(&file, &scope, &opts))
    }

    /// Compiles a template against a JSON object.
    pub fn compile_json(&self, path: &str, data: serde_json::Value) -> Result<String> {
        self.compile(path, &scope_from_json(data))
    }

    /// Renders an already pre-compiled record.
    pub fn render(&self, file: &TemplateFile, scope: &Scope) -> String {
        self.render_with(file, scope, &self.options())
    }

    fn render_with(&self, file: &TemplateFile, scope: &Scope, opts: &EngineOptions) -> String {
        let layout = match scope.get(options::TEMPLATE) {
            Some(Value::Str(name)) => Some(name.clone()),
            _ => opts.template.clone(),
        };
        compiler::compile(self.env(&opts.assets), file, scope, layout.as_deref())
    }

    /// Evicts a template and its `.pre` twin.
    pub fn invalidate(&self, path: &str) -> Result<()> {
        let key = self.cache_key(path);
        tracing::debug!("Invalidating {}", key);
        self.cache.remove(&key)?;
        self.cache.remove(&pre_key(&key))
    }

    /// Clears every cached record.
    pub fn clear_cache(&self) -> Result<()> {
        self.cache.clear()
    }
}

/// Normalizes `path` into a cache key for extension `ext`.
pub fn key_for(path: &str, ext: &str) -> String {
    let path = path.trim().replace('\\', "/");
    let path = path.trim_start_matches('/');
    let suffix = format!(".{}", ext);
    path.strip_suffix(&suffix).unwrap_or(path).to_string()
}

impl<R: ResourceResolver> FileSource for Engine<R> {
    fn load(&self, kind: SourceKind, name: &str) -> Option<Arc<TemplateFile>> {
        let candidates = match kind {
            SourceKind::Component => {
                let name = name.replace('.', "/");
                let components = self.options().components;
                if components.is_empty() {
                    vec![name]
                } else {
                    vec![format!("{}/{}", components, name), name]
                }
            }
            SourceKind::Import | SourceKind::Layout => vec![name.to_string()],
        };
        for candidate in candidates {
            match self.precompile(&candidate) {
                Ok(file) => return Some(file),
                Err(e) if e.is_not_found() => continue,
                Err(e) => {
                    tracing::warn!("Failed to load {:?} {}: {}", kind, candidate, e);
                    return None;
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryResourceResolver;

    #[test]
    fn test_key_for() {
        assert_eq!(key_for("/pages/index.xhtml", "xhtml"), "pages/index");
        assert_eq!(key_for("pages\\about", "xhtml"), "pages/about");
        assert_eq!(key_for(" index.html ", "xhtml"), "index.html");
    }

    #[test]
    fn test_constant_scope() {
        let scope = scope_from_json(serde_json::json!({
            "const": {"site": "x"},
            "$lang": "en",
            "user": "ada"
        }));
        let constants = constant_scope(&scope);
        assert_eq!(constants.len(), 2);
        assert_eq!(constants.get("site"), Some(&Value::from("x")));
        assert_eq!(constants.get("$lang"), Some(&Value::from("en")));
    }

    #[test]
    fn test_options_round_trip() {
        let engine = Engine::with_memory_cache(MemoryResourceResolver::new(), 8);
        engine.set_option("ext", "html");
        engine.set_option("template", "layout");
        assert_eq!(engine.option("ext").as_deref(), Some("html"));
        let options = engine.options();
        assert_eq!(options.ext, "html");
        assert_eq!(options.template.as_deref(), Some("layout"));
        assert_eq!(engine.cache_key("a/b.html"), "a/b");
    }
}
