use std::sync::Arc;

use crate::cache::CacheStore;
use crate::config::Config;
use crate::controller::DownloadController;
use crate::downloads::DownloadManager;
use crate::intercept::{Interceptor, NetworkFetcher};
use crate::notify::Notifier;
use crate::observability::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub cache: CacheStore,
    pub manager: DownloadManager,
    pub controller: DownloadController,
    pub interceptor: Arc<Interceptor>,
    pub proxy: Arc<dyn NetworkFetcher>,
    pub notifier: Notifier,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        cache: CacheStore,
        manager: DownloadManager,
        controller: DownloadController,
        interceptor: Interceptor,
        proxy: Arc<dyn NetworkFetcher>,
        notifier: Notifier,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            cache,
            manager,
            controller,
            interceptor: Arc::new(interceptor),
            proxy,
            notifier,
            metrics,
        }
    }
}
