// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Engine options.
//!
//! Options are plain `key=value` strings, the shape they arrive in over the
//! command channel. [`EngineOptions`] is a typed snapshot taken once per
//! render so that a concurrent `set:` never changes a render halfway through.
//!
//! | key          | meaning                                  | default        |
//! |--------------|------------------------------------------|----------------|
//! | `root`       | template root directory                  | (none)         |
//! | `components` | components directory below the root      | `components`   |
//! | `ext`        | template file extension                  | `xhtml`        |
//! | `template`   | default layout                           | (none)         |
//! | `cache`      | cache TTL in milliseconds                | 2 hours        |
//! | `assets`     | base URL of the static assets            | CDN            |
//! | `markdown`   | run templates through the markdown pass  | `false`        |

use std::collections::HashMap;
use std::time::Duration;

/// Template root directory.
pub const ROOT: &str = "root";
/// Components directory below the root.
pub const COMPONENTS: &str = "components";
/// Template file extension.
pub const EXT: &str = "ext";
/// Default layout name.
pub const TEMPLATE: &str = "template";
/// Cache TTL in milliseconds.
pub const CACHE: &str = "cache";
/// Static asset base URL.
pub const ASSETS: &str = "assets";
/// Markdown pass over whole templates.
pub const MARKDOWN: &str = "markdown";

/// Where the static assets are served from unless configured.
pub const DEFAULT_ASSETS: &str = "https://cdn.jsdelivr.net/npm/turbx/assets";

/// Asset base used in debug mode.
pub const LOCAL_ASSETS: &str = "/assets";

/// A typed snapshot of the engine options.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    /// Template root directory.
    pub root: String,
    /// Components directory below the root.
    pub components: String,
    /// File extension without the dot.
    pub ext: String,
    /// Default layout.
    pub template: Option<String>,
    /// Cache TTL.
    pub cache_ttl: Option<Duration>,
    /// Static asset base URL.
    pub assets: String,
    /// Markdown pass over whole templates.
    pub markdown: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            root: String::new(),
            components: "components".to_string(),
            ext: "xhtml".to_string(),
            template: None,
            cache_ttl: None,
            assets: DEFAULT_ASSETS.to_string(),
            markdown: false,
        }
    }
}

/// Parses a boolean option value.
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Parses a TTL given in milliseconds.
pub fn parse_ttl(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_millis)
}

impl EngineOptions {
    /// Builds a snapshot from raw option strings. Empty values keep the default.
    pub fn from_map(map: &HashMap<String, String>) -> Self {
        let mut options = Self::default();
        let get = |key: &str| map.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());
        if let Some(root) = get(ROOT) {
            options.root = root.to_string();
        }
        if let Some(components) = get(COMPONENTS) {
            options.components = components.trim_matches('/').to_string();
        }
        if let Some(ext) = get(EXT) {
            options.ext = ext.trim_start_matches('.').to_string();
        }
        options.template = get(TEMPLATE).map(String::from);
        options.cache_ttl = get(CACHE).and_then(parse_ttl);
        if let Some(assets) = get(ASSETS) {
            options.assets = assets.to_string();
        }
        options.markdown = get(MARKDOWN).is_some_and(parse_flag);
        options
    }
}
