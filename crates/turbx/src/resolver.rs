// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Template resource resolution.
//!
//! This module provides the [`ResourceResolver`] trait and the filesystem
//! implementation used in production.
//!
//! # Resolver Implementations
//!
//! - [`FileSystemResolver`]: Loads templates below the configured root directory
//! - [`MemoryResourceResolver`](crate::MemoryResourceResolver): In-memory storage (tests, embedding)
//!
//! # Resolution
//!
//! The engine passes the template root (its `root` option) and a relative
//! file name that already carries the extension, e.g. `components/Nav.xhtml`.
//! A name that escapes the root through `..` is rejected with
//! [`TurbxError::PathLeak`].

use crate::error::{Result, TurbxError};
use std::path::{Component, Path, PathBuf};

/// Converts a path to a string with forward slashes.
#[inline]
pub fn path_to_string<P: AsRef<Path>>(path: P) -> String {
    #[cfg(windows)]
    {
        path.as_ref().to_string_lossy().replace('\\', "/")
    }
    #[cfg(not(windows))]
    {
        path.as_ref().to_string_lossy().to_string()
    }
}

/// A resolved template with its path and source.
#[derive(Debug, Clone)]
pub struct ResolvedResource {
    /// Full path of the template.
    pub path: String,
    /// The template source.
    pub source: String,
}

/// Trait for locating and loading template sources.
///
/// Implementations are shared between concurrent renders.
pub trait ResourceResolver: Send + Sync + 'static {
    /// Loads `name` (relative, extension included) below `root`.
    fn resolve(&self, root: &str, name: &str) -> Result<ResolvedResource>;

    /// Returns true when `name` exists below `root`.
    fn exists(&self, root: &str, name: &str) -> bool {
        self.resolve(root, name).is_ok()
    }
}

/// Joins `name` under `root`, rejecting names that climb out of it.
pub fn join_under_root(root: &Path, name: &str) -> Result<PathBuf> {
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir | Component::RootDir => {}
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(TurbxError::PathLeak(name.to_string()));
                }
            }
            Component::Prefix(_) => return Err(TurbxError::PathLeak(name.to_string())),
        }
    }
    let mut path = root.to_path_buf();
    path.extend(parts);
    Ok(path)
}

/// Filesystem-based resource resolver.
///
/// Only available with the `filesystem` feature.
///
/// # Examples
///
/// ```rust,ignore
/// use turbx::FileSystemResolver;
///
/// let resolver = FileSystemResolver::new();
/// let resource = resolver.resolve("./templates", "index.xhtml")?;
/// ```
#[cfg(feature = "filesystem")]
#[derive(Debug, Clone, Default)]
pub struct FileSystemResolver;

#[cfg(feature = "filesystem")]
impl FileSystemResolver {
    /// Creates a new filesystem resolver.
    pub fn new() -> Self {
        Self
    }

    fn locate(&self, root: &str, name: &str) -> Result<PathBuf> {
        if root.is_empty() {
            return Err(TurbxError::MissingRoot);
        }
        let root_path = Path::new(root);
        let path = join_under_root(root_path, name)?;

        // symlinks may still point outside of the root
        if let (Ok(real), Ok(real_root)) = (path.canonicalize(), root_path.canonicalize()) {
            if !real.starts_with(&real_root) {
                return Err(TurbxError::PathLeak(name.to_string()));
            }
        }
        Ok(path)
    }
}

#[cfg(feature = "filesystem")]
impl ResourceResolver for FileSystemResolver {
    fn resolve(&self, root: &str, name: &str) -> Result<ResolvedResource> {
        let path = self.locate(root, name)?;
        if !path.is_file() {
            return Err(TurbxError::NotFound(path_to_string(&path)));
        }
        let source = std::fs::read_to_string(&path)?;
        tracing::debug!("Resolved template '{}' to {}", name, path.display());
        Ok(ResolvedResource {
            path: path_to_string(&path),
            source,
        })
    }

    fn exists(&self, root: &str, name: &str) -> bool {
        self.locate(root, name).is_ok_and(|path| path.is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_under_root() {
        let root = Path::new("/srv/views");
        assert_eq!(
            join_under_root(root, "components/Nav.xhtml").unwrap(),
            PathBuf::from("/srv/views/components/Nav.xhtml")
        );
        assert_eq!(
            join_under_root(root, "/a/../b.xhtml").unwrap(),
            PathBuf::from("/srv/views/b.xhtml")
        );
        assert!(matches!(
            join_under_root(root, "../secret.xhtml"),
            Err(TurbxError::PathLeak(_))
        ));
        assert!(matches!(
            join_under_root(root, "a/../../etc/passwd"),
            Err(TurbxError::PathLeak(_))
        ));
    }

    #[cfg(feature = "filesystem")]
    #[test]
    fn test_filesystem_resolver() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("components")).unwrap();
        std::fs::write(temp.path().join("index.xhtml"), "<p>home</p>").unwrap();
        std::fs::write(temp.path().join("components/Nav.xhtml"), "<nav/>").unwrap();
        let root = path_to_string(temp.path());

        let resolver = FileSystemResolver::new();
        let resolved = resolver.resolve(&root, "index.xhtml").unwrap();
        assert_eq!(resolved.source, "<p>home</p>");
        assert!(resolved.path.ends_with("index.xhtml"));

        assert!(resolver.exists(&root, "components/Nav.xhtml"));
        assert!(!resolver.exists(&root, "components/Missing.xhtml"));
        assert!(resolver.resolve(&root, "missing.xhtml").unwrap_err().is_not_found());
        assert!(matches!(
            resolver.resolve(&root, "../index.xhtml"),
            Err(TurbxError::PathLeak(_))
        ));
        assert!(matches!(
            resolver.resolve("", "index.xhtml"),
            Err(TurbxError::MissingRoot)
        ));
    }
}
