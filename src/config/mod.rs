//! Layered configuration
//!
//! Settings come from three sources, lowest to highest priority:
//! 1. Default values embedded in the structs
//! 2. TOML configuration file (default: `config/medialocker.toml`,
//!    overridable with `MEDIALOCKER_CONFIG`)
//! 3. Environment variables shaped `MEDIALOCKER__<section>__<key>`, e.g.
//!    `MEDIALOCKER__GATEWAY__BIND_ADDR=0.0.0.0:9000`

mod models;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{CacheConfig, Config, DownloadsConfig, GatewayConfig, MediaConfig};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment).
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path. Useful for testing.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn load_full_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[gateway]
bind_addr = "0.0.0.0:8080"
data_path = "data/medialocker"
origin = "https://example.com"

[cache]
static_namespace = "static-v2"
offline_doc = "/offline.html"
core_assets = ["/offline.html"]
media_extensions = [".mp4"]
excluded_patterns = ["browserlink", "chrome-extension"]

[media]
asset_id = "bbb"
title = "Big Buck Bunny"
source_urls = ["https://cdn.example.com/bbb.mp4"]
expected_total_bytes = "276MB"

[downloads]
poll_interval_ms = 1000
connect_timeout_secs = 10
request_timeout_secs = 3600
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.cache.static_namespace, "static-v2");
        assert_eq!(
            config.offline_doc_url(),
            "https://example.com/offline.html"
        );
        assert_eq!(config.core_asset_urls().len(), 1);
        assert_eq!(config.media.title, "Big Buck Bunny");
    }

    #[test]
    fn validation_runs_on_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        // Media with no source URLs is unusable
        fs::write(
            &config_path,
            r#"
[media]
asset_id = "bbb"
source_urls = []
            "#,
        )
        .unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result,
            Err(ConfigError::ValidationError(ValidationError::NoSourceUrls))
        ));
    }
}
