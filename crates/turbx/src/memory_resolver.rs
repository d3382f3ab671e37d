// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use crate::error::{Result, TurbxError};
use crate::resolver::{join_under_root, ResolvedResource, ResourceResolver};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Memory-based resource resolver that stores templates in memory.
///
/// The root handed in by the engine is ignored; names are looked up as
/// written, with `..` and `.` segments collapsed.
#[derive(Debug, Clone, Default)]
pub struct MemoryResourceResolver {
    templates: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryResourceResolver {
    /// Create a new memory resource resolver
    pub fn new() -> Self {
        Self::default()
    }

    fn templates(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.templates
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add a template under `path` (extension included, e.g. `index.xhtml`)
    pub fn add_template(&self, path: &str, content: impl Into<String>) {
        self.templates()
            .insert(normalize(path), content.into());
    }

    /// Remove a template
    pub fn remove_template(&self, path: &str) {
        self.templates().remove(&normalize(path));
    }

    /// Clear all templates
    pub fn clear(&self) {
        self.templates().clear();
    }
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim_start_matches('/');
    match join_under_root(Path::new(""), trimmed) {
        Ok(joined) => crate::resolver::path_to_string(joined),
        Err(_) => trimmed.to_string(),
    }
}

impl ResourceResolver for MemoryResourceResolver {
    fn resolve(&self, _root: &str, name: &str) -> Result<ResolvedResource> {
        join_under_root(Path::new(""), name)?;
        let path = normalize(name);
        match self.templates().get(&path) {
            Some(source) => Ok(ResolvedResource {
                path,
                source: source.clone(),
            }),
            None => Err(TurbxError::NotFound(path)),
        }
    }
}
