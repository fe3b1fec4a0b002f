//! Install/activate lifecycle
//!
//! The coordinator pre-populates the current static namespace at install
//! time and evicts stale namespaces at activate time. Both transitions are
//! all-or-nothing: any failure propagates and the host must abort the
//! transition rather than continue in an ambiguous state. A successful
//! install makes the new version immediately eligible for activation (no
//! waiting for open pages to close), and activation takes effect for all
//! pages at once.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::cache::{CacheError, CacheStore, MEDIA_NAMESPACE, request_key};
use crate::intercept::{InterceptError, InterceptedRequest, NetworkFetcher};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to fetch core asset {url}: {source}")]
    CoreAssetFetch {
        url: String,
        #[source]
        source: InterceptError,
    },

    #[error("core asset {url} returned HTTP {status}")]
    CoreAssetStatus { url: String, status: u16 },

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
}

pub type Result<T> = std::result::Result<T, LifecycleError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Installing,
    Installed,
    Activating,
    Active,
}

pub struct LifecycleCoordinator {
    cache: CacheStore,
    fetcher: Arc<dyn NetworkFetcher>,
    static_namespace: String,
    core_assets: Vec<String>,
    phase: LifecyclePhase,
}

impl LifecycleCoordinator {
    pub fn new(
        cache: CacheStore,
        fetcher: Arc<dyn NetworkFetcher>,
        static_namespace: String,
        core_assets: Vec<String>,
    ) -> Self {
        Self {
            cache,
            fetcher,
            static_namespace,
            core_assets,
            phase: LifecyclePhase::Installing,
        }
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    /// Pre-populate the current static namespace with every core asset
    /// (the offline document at minimum). Any failure aborts the install.
    /// Success skips the usual wait: the version is immediately eligible
    /// for activation.
    pub async fn install(&mut self) -> Result<()> {
        self.phase = LifecyclePhase::Installing;
        info!(namespace = %self.static_namespace, assets = self.core_assets.len(), "Installing");

        for url in &self.core_assets {
            let request = InterceptedRequest::get(url.clone());
            let response = self.fetcher.fetch(&request).await.map_err(|source| {
                LifecycleError::CoreAssetFetch {
                    url: url.clone(),
                    source,
                }
            })?;
            if !(200..300).contains(&response.status) {
                return Err(LifecycleError::CoreAssetStatus {
                    url: url.clone(),
                    status: response.status,
                });
            }
            self.cache
                .put(&self.static_namespace, &request_key(url), response)
                .await?;
            info!(url, "Core asset cached");
        }

        self.phase = LifecyclePhase::Installed;
        info!("Install complete, skipping waiting");
        Ok(())
    }

    /// Evict every namespace except the current static version and the
    /// media namespace, then take control of all open pages.
    pub async fn activate(&mut self) -> Result<()> {
        self.phase = LifecyclePhase::Activating;
        info!(namespace = %self.static_namespace, "Activating");

        for namespace in self.cache.list_namespaces()? {
            if namespace == self.static_namespace || namespace == MEDIA_NAMESPACE {
                continue;
            }
            warn!(namespace, "Deleting stale cache namespace");
            self.cache.delete_namespace(&namespace).await?;
        }

        self.phase = LifecyclePhase::Active;
        info!("Activation complete, claiming controlled pages");
        Ok(())
    }
}
