// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! HTTP oEmbed lookups.
//!
//! Renders run on blocking worker threads, so the lookup uses the blocking
//! reqwest client. A failed lookup falls back to the client-side embed.

use std::time::Duration;
use turbx::{OEmbed, OEmbedProvider};

/// YouTube's oEmbed endpoint.
pub const YOUTUBE_ENDPOINT: &str = "https://www.youtube.com/oembed";

/// Fetches oEmbed metadata over HTTP.
#[derive(Debug, Clone)]
pub struct HttpOEmbed {
    endpoint: String,
    timeout: Duration,
}

impl Default for HttpOEmbed {
    fn default() -> Self {
        Self::new(YOUTUBE_ENDPOINT)
    }
}

impl HttpOEmbed {
    /// Creates a provider for the given endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout: Duration::from_secs(5),
        }
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn lookup(&self, url: &str) -> Result<OEmbed, reqwest::Error> {
        let client = reqwest::blocking::Client::builder().timeout(self.timeout).build()?;
        client
            .get(&self.endpoint)
            .query(&[("url", url), ("format", "json")])
            .send()?
            .error_for_status()?
            .json::<OEmbed>()
    }
}

impl OEmbedProvider for HttpOEmbed {
    fn fetch(&self, url: &str) -> Option<OEmbed> {
        match self.lookup(url) {
            Ok(meta) => Some(meta),
            Err(e) => {
                tracing::debug!("oEmbed lookup for {} failed: {}", url, e);
                None
            }
        }
    }
}
