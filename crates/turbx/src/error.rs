// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Error types for the turbx template engine.
//!
//! This module defines [`TurbxError`], the main error enum used by every
//! fallible operation of the engine.
//!
//! # Error Categories
//!
//! - **Resolution errors**: template missing or resolving outside the root
//! - **I/O errors**: reading template sources
//! - **Cache errors**: lock failures in the shared file cache
//! - **Codec errors**: gzip/base64 payloads that fail to decode
//!
//! Malformed template constructs are not errors. They are emitted verbatim
//! and logged, and evaluation failures resolve to empty output.

use thiserror::Error;

/// Main error type for the turbx engine.
#[derive(Error, Debug)]
pub enum TurbxError {
    /// The requested template does not exist.
    #[error("Template not found: {0}")]
    NotFound(String),

    /// The requested path escapes the configured root directory.
    #[error("Path escapes template root: {0}")]
    PathLeak(String),

    /// No `root` option has been configured.
    #[error("Template root is not configured")]
    MissingRoot,

    /// Underlying I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Cache operation failed.
    #[error("Cache error: {0}")]
    Cache(String),

    /// Compressed payload could not be encoded or decoded.
    #[error("Codec error: {0}")]
    Codec(String),

    /// Attempt to register a user function under a reserved name.
    #[error("Function name is reserved: {0}")]
    ReservedFunction(String),
}

impl TurbxError {
    /// Returns true when the error means the template could not be located.
    pub fn is_not_found(&self) -> bool {
        matches!(self, TurbxError::NotFound(_) | TurbxError::PathLeak(_))
    }
}

/// Result type alias for turbx operations.
pub type Result<T> = std::result::Result<T, TurbxError>;
