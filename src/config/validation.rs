use super::models::Config;
use crate::cache::MEDIA_NAMESPACE;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("cache.static_namespace must not be empty")]
    EmptyStaticNamespace,

    #[error("static namespace '{0}' collides with the media namespace")]
    StaticNamespaceCollision(String),

    #[error("gateway.origin '{0}' must start with http:// or https://")]
    InvalidOrigin(String),

    #[error("media.source_urls must list at least one URL")]
    NoSourceUrls,

    #[error("media.asset_id must not be empty")]
    EmptyAssetId,

    #[error("downloads.poll_interval_ms must be positive")]
    ZeroPollInterval,

    #[error("cache.offline_doc '{0}' must be listed in cache.core_assets")]
    OfflineDocNotPrecached(String),
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_cache(config)?;
    validate_gateway(config)?;
    validate_media(config)?;
    validate_downloads(config)?;
    Ok(())
}

fn validate_cache(config: &Config) -> Result<(), ValidationError> {
    if config.cache.static_namespace.is_empty() {
        return Err(ValidationError::EmptyStaticNamespace);
    }
    let namespace = config.cache.static_namespace.clone();
    if namespace == MEDIA_NAMESPACE {
        return Err(ValidationError::StaticNamespaceCollision(namespace));
    }
    // The offline document can only be substituted if install pre-cached it
    if !config.cache.core_assets.contains(&config.cache.offline_doc) {
        return Err(ValidationError::OfflineDocNotPrecached(
            config.cache.offline_doc.clone(),
        ));
    }
    Ok(())
}

fn validate_gateway(config: &Config) -> Result<(), ValidationError> {
    let origin = &config.gateway.origin;
    if !origin.starts_with("http://") && !origin.starts_with("https://") {
        return Err(ValidationError::InvalidOrigin(origin.clone()));
    }
    Ok(())
}

fn validate_media(config: &Config) -> Result<(), ValidationError> {
    if config.media.asset_id.is_empty() {
        return Err(ValidationError::EmptyAssetId);
    }
    if config.media.source_urls.is_empty() {
        return Err(ValidationError::NoSourceUrls);
    }
    Ok(())
}

fn validate_downloads(config: &Config) -> Result<(), ValidationError> {
    if config.downloads.poll_interval_ms == 0 {
        return Err(ValidationError::ZeroPollInterval);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.media.source_urls = vec!["https://cdn.example.com/bbb.mp4".to_string()];
        config
    }

    #[test]
    fn accepts_valid_config() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn rejects_missing_source_urls() {
        let mut config = valid_config();
        config.media.source_urls.clear();
        assert!(matches!(
            validate(&config),
            Err(ValidationError::NoSourceUrls)
        ));
    }

    #[test]
    fn rejects_origin_without_scheme() {
        let mut config = valid_config();
        config.gateway.origin = "example.com".to_string();
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidOrigin(_))
        ));
    }

    #[test]
    fn rejects_static_namespace_named_media() {
        let mut config = valid_config();
        config.cache.static_namespace = "media".to_string();
        assert!(matches!(
            validate(&config),
            Err(ValidationError::StaticNamespaceCollision(_))
        ));
    }

    #[test]
    fn rejects_zero_poll_interval() {
        let mut config = valid_config();
        config.downloads.poll_interval_ms = 0;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::ZeroPollInterval)
        ));
    }

    #[test]
    fn rejects_offline_doc_missing_from_core_assets() {
        let mut config = valid_config();
        config.cache.offline_doc = "/elsewhere.html".to_string();
        assert!(matches!(
            validate(&config),
            Err(ValidationError::OfflineDocNotPrecached(_))
        ));
    }
}
