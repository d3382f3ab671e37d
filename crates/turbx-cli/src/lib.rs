// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]

//! turbx CLI library.
//!
//! This crate provides the line-oriented compile server for the turbx
//! template engine. A host process writes commands to standard input and
//! reads responses from standard output, one per line.
//!
//! # Protocol
//!
//! ```text
//! ping                          -> pong
//! set:root=/srv/views           (no response)
//! pre:7:index                   -> 7:success | 7:error
//! has:8:index                   -> 8:true | 8:false
//! 9:<gzip+base64 json>:index    -> 9:<gzip+base64 html> | 9:error
//! stop                          (exits)
//! ```
//!
//! # Configuration
//!
//! Defaults can be given in `turbx.toml`; see [`config`].

/// Memory admission gate.
pub mod admission;
/// Command parsing and execution.
pub mod commands;
/// Server configuration from `turbx.toml`.
pub mod config;
/// HTTP oEmbed lookups for the YouTube embed.
pub mod oembed;
/// The stdin/stdout command loop.
pub mod server;
/// Template directory watching for cache invalidation.
pub mod watcher;
