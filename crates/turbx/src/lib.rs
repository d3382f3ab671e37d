// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]

//! # turbx
//!
//! Two-phase XHTML template engine with components, layouts and an inline
//! markdown compiler.
//!
//! Templates are rewritten source-to-source into an intermediate form once
//! (pre-compile), cached, and rendered against request data as often as
//! needed (compile).
//!
//! ## Features
//!
//! - `{{hole}}` / `{{{raw}}}` interpolation with fallback chains
//! - `<_if>`/`<_elif>`/`<_else>`, `<_each>`, `<_set>`, `<_rand>`, `<_json>`
//! - Components (`<Card title="x">body</Card>`), imports and layouts
//! - Constant folding against `const` data with residual conditions
//! - `<markdown>` blocks and an optional whole-template markdown pass
//! - `<_lorem>` and `<_youtube>` pre-functions
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use turbx::{Engine, FileSystemResolver};
//!
//! let engine = Engine::with_memory_cache(FileSystemResolver::new(), 1024);
//! engine.set_option("root", "./views");
//! engine.set_option("template", "layout");
//!
//! let html = engine.compile_json("index", serde_json::json!({ "name": "World" }))?;
//! ```

/// Error types.
pub mod error;
/// Tagged runtime values and scopes.
pub mod value;
/// Encoding escape, comment removal and string extraction.
pub mod lexer;
/// HTML and attribute escaping.
pub mod escape;
/// Script, style and markdown block capture.
pub mod script;
/// Function and component tag normalization.
pub mod tags;
/// Interpolation holes.
pub mod holes;
/// Variable resolution.
pub mod vars;
/// Condition expressions with partial evaluation.
pub mod expr;
/// Markdown sub-compiler.
pub mod markdown;
/// Tag functions.
pub mod extensions;
/// Render and fold passes.
pub mod compiler;
/// Layout merge and head injection.
pub mod layout;
/// Engine options.
pub mod options;
/// Pre-compiled record caching.
pub mod cache;
/// gzip + base64 payloads.
pub mod codec;
/// Resource resolution (filesystem).
pub mod resolver;
/// In-memory resource resolver for tests and embedding.
pub mod memory_resolver;
/// The engine handle.
pub mod engine;

pub use cache::{Cache, MemoryCache, NoOpCache, TemplateFile};
pub use engine::Engine;
pub use error::{Result, TurbxError};
pub use extensions::{FunctionContext, FunctionRegistry, OEmbed, OEmbedProvider, TagFunction};
pub use memory_resolver::MemoryResourceResolver;
pub use options::EngineOptions;
pub use resolver::{ResolvedResource, ResourceResolver};
pub use script::{AssetHooks, NoopHooks};
pub use value::{scope_from_json, Scope, Value};

#[cfg(feature = "filesystem")]
pub use resolver::FileSystemResolver;

#[cfg(test)]
mod tests;
