//! Request classification: which cache-resolution rule applies.

/// The three request classes, checked in order. First match wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// Non-GET or excluded URL: forward untouched, no caching, no fallback.
    PassThrough,
    /// Large media: cache-only-if-present against the media namespace.
    Media,
    /// Everything else: cache-first against the static namespace.
    Static,
}

#[derive(Debug, Clone)]
pub struct InterceptPolicy {
    media_extensions: Vec<String>,
    excluded_patterns: Vec<String>,
}

impl InterceptPolicy {
    pub fn new(media_extensions: Vec<String>, excluded_patterns: Vec<String>) -> Self {
        Self {
            media_extensions: media_extensions
                .into_iter()
                .map(|e| e.to_ascii_lowercase())
                .collect(),
            excluded_patterns: excluded_patterns
                .into_iter()
                .map(|p| p.to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn classify(&self, method: &str, url: &str) -> RequestClass {
        if !method.eq_ignore_ascii_case("GET") {
            return RequestClass::PassThrough;
        }

        let url = url.to_ascii_lowercase();
        if self.excluded_patterns.iter().any(|p| url.contains(p)) {
            return RequestClass::PassThrough;
        }

        if self.media_extensions.iter().any(|ext| url.contains(ext)) {
            return RequestClass::Media;
        }

        RequestClass::Static
    }
}

impl Default for InterceptPolicy {
    fn default() -> Self {
        Self::new(
            vec![".mp4".to_string()],
            vec!["browserlink".to_string(), "chrome-extension".to_string()],
        )
    }
}
