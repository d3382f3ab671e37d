// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! `<_youtube url/>` (alias `<_yt/>`) video and playlist embeds.
//!
//! Without an [`OEmbedProvider`] the tag renders a lazy placeholder that the
//! client script fills in the browser. With a provider the metadata is fetched
//! while compiling and the embed is rendered complete.

use super::{FunctionContext, TagFunction};
use crate::escape::escape_attr;
use crate::escape::escape_html;

/// Class the client script looks for.
pub const CLIENT_CLASS: &str = "youtube-embed-client";

/// Client script path under the asset base.
pub const CLIENT_SCRIPT: &str = "youtube-embed.min.js";

/// Client stylesheet path under the asset base.
pub const CLIENT_STYLE: &str = "youtube-embed.min.css";

const PLAY_BUTTON: &str = "youtube-play-btn.svg";

/// oEmbed metadata for a video or playlist.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct OEmbed {
    /// Video or playlist title.
    #[serde(default)]
    pub title: Option<String>,
    /// Thumbnail image URL.
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    /// Player width.
    #[serde(default)]
    pub width: Option<u32>,
    /// Player height.
    #[serde(default)]
    pub height: Option<u32>,
}

impl OEmbed {
    /// `w:h` when both dimensions are known.
    pub fn ratio(&self) -> Option<String> {
        match (self.width, self.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some(format!("{}:{}", w, h)),
            _ => None,
        }
    }
}

/// Source of oEmbed metadata.
pub trait OEmbedProvider: Send + Sync {
    /// Fetches metadata for a page URL. `None` when the lookup fails.
    fn fetch(&self, url: &str) -> Option<OEmbed>;
}

/// What a YouTube reference points to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum YouTubeRef {
    /// A single video id.
    Video(String),
    /// A playlist id (`PL…`, `PU…`, `UU…`; channel ids become uploads lists).
    Playlist(String),
}

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn take_id(s: &str) -> Option<&str> {
    let end = s.find(|c: char| !is_id_char(c)).unwrap_or(s.len());
    (end > 0).then(|| &s[..end])
}

fn query_param<'a>(url: &'a str, key: &str) -> Option<&'a str> {
    let query = url.split_once('?')?.1;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .and_then(|(_, v)| take_id(v))
}

impl YouTubeRef {
    /// Parses a URL or a bare id.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if let Some(list) = query_param(input, "list") {
            if query_param(input, "v").is_none() {
                return Some(Self::playlist(list));
            }
        }
        if let Some(v) = query_param(input, "v") {
            return Some(YouTubeRef::Video(v.to_string()));
        }
        for marker in ["youtu.be/", "/embed/", "/shorts/", "/v/"] {
            if let Some(idx) = input.find(marker) {
                return take_id(&input[idx + marker.len()..]).map(|id| YouTubeRef::Video(id.to_string()));
            }
        }
        if input.contains('/') || input.contains('.') {
            return None;
        }
        let id = take_id(input).filter(|id| id.len() == input.len())?;
        if ["PL", "PU", "UU", "UC"].iter().any(|p| id.starts_with(p)) && id.len() > 12 {
            return Some(Self::playlist(id));
        }
        Some(YouTubeRef::Video(id.to_string()))
    }

    fn playlist(id: &str) -> Self {
        match id.strip_prefix("UC") {
            Some(channel) => YouTubeRef::Playlist(format!("UU{}", channel)),
            None => YouTubeRef::Playlist(id.to_string()),
        }
    }

    /// The id as written into the client placeholder.
    pub fn id(&self) -> &str {
        match self {
            YouTubeRef::Video(id) | YouTubeRef::Playlist(id) => id,
        }
    }

    /// Player URL.
    pub fn embed_url(&self) -> String {
        match self {
            YouTubeRef::Video(id) => format!("https://www.youtube.com/embed/{}", id),
            YouTubeRef::Playlist(id) => format!("https://www.youtube.com/embed/?list={}", id),
        }
    }

    /// Page URL handed to oEmbed.
    pub fn page_url(&self) -> String {
        match self {
            YouTubeRef::Video(id) => format!("https://www.youtube.com/watch?v={}", id),
            YouTubeRef::Playlist(id) => format!("https://www.youtube.com/playlist?list={}", id),
        }
    }
}

/// Placeholder completed by the client script.
pub fn client_embed(video: &YouTubeRef, assets: &str) -> String {
    format!(
        "<a class=\"youtube-embed {}\" src=\"{}\" href=\"{}\"><img class=\"youtube-embed-play-btn\" src=\"{}/{}\" alt=\"Play\"/></a>",
        CLIENT_CLASS,
        escape_attr(video.id()),
        escape_attr(&video.page_url()),
        assets.trim_end_matches('/'),
        PLAY_BUTTON
    )
}

/// Embed rendered from fetched metadata.
pub fn server_embed(video: &YouTubeRef, meta: &OEmbed, assets: &str) -> String {
    let mut html = format!("<a class=\"youtube-embed\" href=\"{}\"", escape_attr(&video.embed_url()));
    if let Some(ratio) = meta.ratio() {
        html.push_str(&format!(" ratio=\"{}\"", ratio));
    }
    html.push('>');
    if let Some(thumb) = &meta.thumbnail_url {
        html.push_str(&format!("<img src=\"{}\" alt=\"YouTube Embed\"/>", escape_attr(thumb)));
    }
    if let Some(title) = &meta.title {
        html.push_str(&format!("<h1>{}</h1>", escape_html(title)));
    }
    html.push_str(&format!(
        "<img class=\"youtube-embed-play-btn\" src=\"{}/{}\" alt=\"Play\"/></a>",
        assets.trim_end_matches('/'),
        PLAY_BUTTON
    ));
    html
}

/// The `youtube` / `yt` tag function.
#[derive(Debug, Clone, Copy, Default)]
pub struct YouTube;

impl TagFunction for YouTube {
    fn call(&self, ctx: &FunctionContext<'_>) -> Option<String> {
        let url = match ctx.word("url")? {
            Some(url) => Some(url),
            None => match ctx.word("src")? {
                Some(src) => Some(src),
                None => ctx.word("0")?,
            },
        };
        let Some(video) = url.as_deref().and_then(YouTubeRef::parse) else {
            tracing::debug!("youtube: no usable video reference in {:?}", url);
            return Some(String::new());
        };
        let fetched = ctx.oembed.and_then(|p| p.fetch(&video.page_url()));
        Some(match fetched {
            Some(meta) => server_embed(&video, &meta, ctx.assets),
            None => client_embed(&video, ctx.assets),
        })
    }

    fn pre_aware(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::AttrSet;
    use crate::value::Scope;
    use crate::vars::Resolver;

    struct Fixed;

    impl OEmbedProvider for Fixed {
        fn fetch(&self, url: &str) -> Option<OEmbed> {
            url.contains("dQw4w9WgXcQ").then(|| OEmbed {
                title: Some("Never <Gonna>".into()),
                thumbnail_url: Some("https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg".into()),
                width: Some(200),
                height: Some(113),
            })
        }
    }

    #[test]
    fn test_parse_urls() {
        let video = YouTubeRef::Video("dQw4w9WgXcQ".into());
        for url in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=PLx0sYbCqOb8TBPRdmBHs5Iftvv9TPboYG",
            "https://youtu.be/dQw4w9WgXcQ?t=42",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "https://youtube.com/shorts/dQw4w9WgXcQ",
            "dQw4w9WgXcQ",
        ] {
            assert_eq!(YouTubeRef::parse(url), Some(video.clone()), "{}", url);
        }
        assert_eq!(
            YouTubeRef::parse("https://www.youtube.com/playlist?list=PLx0sYbCqOb8TBPRdmBHs5Iftvv9TPboYG"),
            Some(YouTubeRef::Playlist("PLx0sYbCqOb8TBPRdmBHs5Iftvv9TPboYG".into()))
        );
        assert_eq!(
            YouTubeRef::parse("UCuAXFkgsw1L7xaCfnd5JJOw"),
            Some(YouTubeRef::Playlist("UUuAXFkgsw1L7xaCfnd5JJOw".into()))
        );
        assert_eq!(YouTubeRef::parse("https://example.com/video"), None);
    }

    #[test]
    fn test_urls() {
        let list = YouTubeRef::Playlist("PL123".into());
        assert_eq!(list.embed_url(), "https://www.youtube.com/embed/?list=PL123");
        assert_eq!(list.page_url(), "https://www.youtube.com/playlist?list=PL123");
    }

    fn call(attrs: AttrSet, provider: Option<&dyn OEmbedProvider>) -> Option<String> {
        let scope = Scope::new();
        let ctx = FunctionContext {
            name: "yt",
            attrs: &attrs,
            content: None,
            resolver: Resolver::new(&scope, &[], true),
            assets: "/assets/",
            oembed: provider,
        };
        YouTube.call(&ctx)
    }

    #[test]
    fn test_fast_mode() {
        let html = call(AttrSet::positional(["dQw4w9WgXcQ"]), None).unwrap();
        assert_eq!(
            html,
            "<a class=\"youtube-embed youtube-embed-client\" src=\"dQw4w9WgXcQ\" \
             href=\"https://www.youtube.com/watch?v=dQw4w9WgXcQ\">\
             <img class=\"youtube-embed-play-btn\" src=\"/assets/youtube-play-btn.svg\" alt=\"Play\"/></a>"
        );
    }

    #[test]
    fn test_provider_mode() {
        let mut attrs = AttrSet::new();
        attrs.insert("url", "dQw4w9WgXcQ");
        let html = call(attrs, Some(&Fixed)).unwrap();
        assert!(html.starts_with(
            "<a class=\"youtube-embed\" href=\"https://www.youtube.com/embed/dQw4w9WgXcQ\" ratio=\"200:113\">"
        ));
        assert!(html.contains("<img src=\"https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg\" alt=\"YouTube Embed\"/>"));
        assert!(html.contains("<h1>Never &lt;Gonna&gt;</h1>"));
        assert!(!html.contains(CLIENT_CLASS));
    }

    #[test]
    fn test_deferred_and_invalid() {
        let mut attrs = AttrSet::new();
        attrs.insert("url", "{{video}}");
        assert_eq!(call(attrs, None), None);
        assert_eq!(call(AttrSet::positional(["https://example.com/x"]), None), Some(String::new()));
    }
}
