// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! turbx server configuration.
//!
//! Configuration is loaded from `turbx.toml` (or the file named by
//! `--config`). Every value is optional; `set:` commands override the
//! engine section at runtime.
//!
//! # Example Configuration
//!
//! ```toml
//! [engine]
//! root = "templates"
//! components = "components"
//! ext = "xhtml"
//! template = "layout"
//! cache = 7200000
//! capacity = 1024
//! markdown = false
//!
//! [server]
//! memory_floor_mb = 10
//! debounce_ms = 100
//! ```

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use turbx::options;

/// Default configuration file name.
pub const CONFIG_FILE: &str = "turbx.toml";

/// Main configuration structure loaded from `turbx.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Engine defaults.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Server settings.
    #[serde(default)]
    pub server: ServerConfig,
}

/// Engine defaults, applied as options at startup.
#[derive(Debug, Deserialize)]
pub struct EngineConfig {
    /// Template root directory.
    pub root: Option<String>,
    /// Components directory below the root.
    pub components: Option<String>,
    /// Template file extension.
    pub ext: Option<String>,
    /// Default layout.
    pub template: Option<String>,
    /// Cache TTL in milliseconds.
    pub cache: Option<u64>,
    /// Maximum number of cached records (default: 1024).
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Markdown pass over whole templates.
    #[serde(default)]
    pub markdown: bool,
}

/// Command server settings.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Free memory floor in MiB (default: 10).
    #[serde(default = "default_memory_floor")]
    pub memory_floor_mb: u64,
    /// Watcher debounce in milliseconds (default: 100).
    #[serde(default = "default_debounce")]
    pub debounce_ms: u64,
}

fn default_capacity() -> usize {
    turbx::cache::DEFAULT_CAPACITY
}

fn default_memory_floor() -> u64 {
    10
}

fn default_debounce() -> u64 {
    100
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            root: None,
            components: None,
            ext: None,
            template: None,
            cache: None,
            capacity: default_capacity(),
            markdown: false,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            memory_floor_mb: default_memory_floor(),
            debounce_ms: default_debounce(),
        }
    }
}

impl ServerConfig {
    /// The watcher debounce as a duration.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl EngineConfig {
    /// The configured values as `(option, value)` pairs, in the order they
    /// should be applied.
    pub fn options(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        let pairs = [
            (options::COMPONENTS, &self.components),
            (options::EXT, &self.ext),
            (options::TEMPLATE, &self.template),
        ];
        for (key, value) in pairs {
            if let Some(value) = value {
                out.push((key, value.clone()));
            }
        }
        if let Some(ttl) = self.cache {
            out.push((options::CACHE, ttl.to_string()));
        }
        if self.markdown {
            out.push((options::MARKDOWN, "true".to_string()));
        }
        if let Some(root) = &self.root {
            out.push((options::ROOT, root.clone()));
        }
        out
    }
}

impl Config {
    /// Parses configuration text.
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Loads configuration.
    ///
    /// An explicit `path` must exist. Without one, `turbx.toml` in the current
    /// directory is used when present, otherwise the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config_path = match path {
            Some(path) => path,
            None => {
                let default = Path::new(CONFIG_FILE);
                if !default.exists() {
                    return Ok(Config::default());
                }
                default
            }
        };
        let content = fs::read_to_string(config_path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", config_path.display(), e))?;
        Self::parse(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.engine.capacity, 1024);
        assert_eq!(config.server.memory_floor_mb, 10);
        assert_eq!(config.server.debounce(), Duration::from_millis(100));
        assert!(config.engine.options().is_empty());
    }

    #[test]
    fn test_engine_options_root_last() {
        let config = Config::parse(
            "[engine]\nroot = \"views\"\next = \"html\"\ncache = 500\nmarkdown = true\n",
        )
        .unwrap();
        let options = config.engine.options();
        assert_eq!(
            options,
            vec![
                ("ext", "html".to_string()),
                ("cache", "500".to_string()),
                ("markdown", "true".to_string()),
                ("root", "views".to_string()),
            ]
        );
    }

    #[test]
    fn test_missing_explicit_file() {
        assert!(Config::load(Some(Path::new("/nonexistent/turbx.toml"))).is_err());
    }
}
