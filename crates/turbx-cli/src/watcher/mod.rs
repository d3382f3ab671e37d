// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Template directory watching.
//!
//! `TemplateWatcher` reports changed template files relative to the root so
//! that their cache records can be evicted.

use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, Debouncer, RecommendedCache};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Watches a template root for changes to files with one extension.
pub struct TemplateWatcher {
    _debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
    root: PathBuf,
}

impl std::fmt::Debug for TemplateWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateWatcher").field("root", &self.root).finish()
    }
}

/// Changed paths with extension `ext`, relative to `root`.
pub fn relevant_paths<'p>(
    paths: impl IntoIterator<Item = &'p PathBuf>,
    root: &Path,
    ext: &str,
) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = paths
        .into_iter()
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some(ext))
        .map(|p| p.strip_prefix(root).unwrap_or(p).to_path_buf())
        .collect();
    out.sort();
    out.dedup();
    out
}

impl TemplateWatcher {
    /// Starts watching `root` recursively.
    ///
    /// `on_change` receives the changed `.ext` files relative to the root,
    /// after `debounce` has passed without further events.
    pub fn new<F>(root: &Path, ext: &str, debounce: Duration, on_change: F) -> anyhow::Result<Self>
    where
        F: Fn(Vec<PathBuf>) + Send + 'static,
    {
        let base = root.to_path_buf();
        let ext = ext.to_string();
        let mut debouncer = new_debouncer(debounce, None, move |result: DebounceEventResult| match result {
            Ok(events) => {
                let changed = relevant_paths(events.iter().flat_map(|e| e.paths.iter()), &base, &ext);
                if !changed.is_empty() {
                    on_change(changed);
                }
            }
            Err(errors) => {
                for e in errors {
                    tracing::warn!("Watch error: {}", e);
                }
            }
        })?;

        debouncer.watch(root, RecursiveMode::Recursive)?;
        tracing::info!("Watching {}", root.display());

        Ok(Self {
            _debouncer: debouncer,
            root: root.to_path_buf(),
        })
    }

    /// The watched root.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relevant_paths() {
        let root = Path::new("/srv/views");
        let paths = [
            PathBuf::from("/srv/views/index.xhtml"),
            PathBuf::from("/srv/views/components/Nav.xhtml"),
            PathBuf::from("/srv/views/style.css"),
            PathBuf::from("/srv/views/index.xhtml"),
        ];
        assert_eq!(
            relevant_paths(paths.iter(), root, "xhtml"),
            vec![PathBuf::from("components/Nav.xhtml"), PathBuf::from("index.xhtml")]
        );
    }
}
