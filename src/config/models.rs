use crate::humanize::ByteSize;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub downloads: DownloadsConfig,
}

/// Gateway process configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Root directory for the fjall keyspaces and cached bodies
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,
    /// Upstream origin that intercepted relative paths resolve against
    #[serde(default = "default_origin")]
    pub origin: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            data_path: default_data_path(),
            origin: default_origin(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    "0.0.0.0:8080".parse().unwrap()
}

fn default_data_path() -> PathBuf {
    PathBuf::from("data/medialocker")
}

fn default_origin() -> String {
    "https://localhost:8080".to_string()
}

/// Cache layout and interception policy
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Versioned namespace for static responses; bumping the version part
    /// triggers eviction of the previous namespace at activation
    #[serde(default = "default_static_namespace")]
    pub static_namespace: String,
    /// Path of the offline fallback document, relative to the origin
    #[serde(default = "default_offline_doc")]
    pub offline_doc: String,
    /// Paths pre-cached at install time, relative to the origin
    #[serde(default = "default_core_assets")]
    pub core_assets: Vec<String>,
    /// URL fragments that mark a request as downloadable media
    #[serde(default = "default_media_extensions")]
    pub media_extensions: Vec<String>,
    /// URL fragments that bypass interception entirely
    #[serde(default = "default_excluded_patterns")]
    pub excluded_patterns: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            static_namespace: default_static_namespace(),
            offline_doc: default_offline_doc(),
            core_assets: default_core_assets(),
            media_extensions: default_media_extensions(),
            excluded_patterns: default_excluded_patterns(),
        }
    }
}

fn default_static_namespace() -> String {
    "static-v2".to_string()
}

fn default_offline_doc() -> String {
    "/offline.html".to_string()
}

fn default_core_assets() -> Vec<String> {
    vec!["/offline.html".to_string()]
}

fn default_media_extensions() -> Vec<String> {
    vec![".mp4".to_string()]
}

fn default_excluded_patterns() -> Vec<String> {
    vec![
        "browserlink".to_string(),
        "chrome-extension".to_string(),
    ]
}

/// The media asset offered for offline use
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaConfig {
    #[serde(default = "default_asset_id")]
    pub asset_id: String,
    #[serde(default = "default_title")]
    pub title: String,
    /// Source URLs fetched sequentially into one download
    #[serde(default)]
    pub source_urls: Vec<String>,
    /// Declared total used for progress percentages; zero means unknown
    #[serde(default)]
    pub expected_total_bytes: ByteSize,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            asset_id: default_asset_id(),
            title: default_title(),
            source_urls: vec![],
            expected_total_bytes: ByteSize(0),
        }
    }
}

fn default_asset_id() -> String {
    "bbb".to_string()
}

fn default_title() -> String {
    "Big Buck Bunny".to_string()
}

/// Download transfer tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadsConfig {
    /// Progress poll fallback cadence
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl DownloadsConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    3600
}

fn default_user_agent() -> String {
    format!("medialocker/{}", env!("CARGO_PKG_VERSION"))
}

impl Config {
    /// Resolve a configured path against the gateway origin. Absolute URLs
    /// pass through unchanged.
    pub fn resolve_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.gateway.origin.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn offline_doc_url(&self) -> String {
        self.resolve_url(&self.cache.offline_doc)
    }

    pub fn core_asset_urls(&self) -> Vec<String> {
        self.cache
            .core_assets
            .iter()
            .map(|path| self.resolve_url(path))
            .collect()
    }
}
