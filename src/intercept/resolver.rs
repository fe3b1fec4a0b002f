use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::{CacheStore, CachedResponse, MEDIA_NAMESPACE, request_key};
use crate::observability::Metrics;

use super::policy::{InterceptPolicy, RequestClass};
use super::substitute;

#[derive(Debug, Error)]
pub enum InterceptError {
    #[error("network fetch failed: {0}")]
    Network(String),
}

pub type Result<T> = std::result::Result<T, InterceptError>;

/// One intercepted outgoing request. The full header map rides along so
/// pass-through traffic can be replayed upstream unmodified.
#[derive(Debug, Clone)]
pub struct InterceptedRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl InterceptedRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            url: url.into(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.headers.push(("accept".to_string(), accept.into()));
        self
    }

    /// Accept header value, if the request carried one.
    pub fn accept(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("accept"))
            .map(|(_, value)| value.as_str())
    }
}

/// Exactly one of these per intercepted request.
#[derive(Debug)]
pub enum Resolution {
    /// Serve this response to the page.
    Respond(CachedResponse),
    /// Forward to the network untouched; no caching, no fallback.
    PassThrough,
}

/// Network seam for the interceptor. The production implementation proxies
/// over reqwest; tests script responses and count calls.
#[async_trait]
pub trait NetworkFetcher: Send + Sync {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<CachedResponse>;
}

/// Applies the cache-resolution policy to every intercepted request.
pub struct Interceptor {
    policy: InterceptPolicy,
    cache: CacheStore,
    fetcher: Arc<dyn NetworkFetcher>,
    static_namespace: String,
    offline_doc_url: String,
    metrics: Arc<Metrics>,
}

impl Interceptor {
    pub fn new(
        policy: InterceptPolicy,
        cache: CacheStore,
        fetcher: Arc<dyn NetworkFetcher>,
        static_namespace: String,
        offline_doc_url: String,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            policy,
            cache,
            fetcher,
            static_namespace,
            offline_doc_url,
            metrics,
        }
    }

    pub async fn resolve(&self, request: &InterceptedRequest) -> Result<Resolution> {
        match self.policy.classify(&request.method, &request.url) {
            RequestClass::PassThrough => {
                self.metrics.pass_through();
                debug!(url = %request.url, "Pass-through");
                Ok(Resolution::PassThrough)
            }
            RequestClass::Media => self.resolve_media(request).await,
            RequestClass::Static => self.resolve_static(request).await,
        }
    }

    /// Cache-only-if-present. Media is never cached here: the download
    /// completion handler is the sole writer of the media namespace, which
    /// rules out partial or duplicate copies.
    async fn resolve_media(&self, request: &InterceptedRequest) -> Result<Resolution> {
        let key = request_key(&request.url);
        if let Some(cached) = self.cache_lookup(MEDIA_NAMESPACE, &key).await {
            self.metrics.media_cache_hit();
            debug!(url = %request.url, "Media served from cache");
            return Ok(Resolution::Respond(cached));
        }

        let live = self
            .fetcher
            .fetch(request)
            .await?;
        Ok(Resolution::Respond(live))
    }

    /// Cache-first with network fallback and offline substitution.
    async fn resolve_static(&self, request: &InterceptedRequest) -> Result<Resolution> {
        let key = request_key(&request.url);
        if let Some(cached) = self.cache_lookup(&self.static_namespace, &key).await {
            self.metrics.static_cache_hit();
            debug!(url = %request.url, "Served from static cache");
            return Ok(Resolution::Respond(cached));
        }
        self.metrics.static_cache_miss();

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if (200..300).contains(&response.status) {
                    // Best effort: a write failure must never fail the
                    // in-flight response
                    if let Err(e) = self
                        .cache
                        .put(&self.static_namespace, &key, response.clone())
                        .await
                    {
                        warn!(url = %request.url, error = %e, "Static cache write failed");
                    }
                }
                Ok(Resolution::Respond(response))
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "Network failed, substituting");
                self.metrics.offline_substitute();
                Ok(Resolution::Respond(self.offline_substitute(request).await))
            }
        }
    }

    async fn offline_substitute(&self, request: &InterceptedRequest) -> CachedResponse {
        let accept = request.accept();
        if substitute::accepts_html(accept) {
            let key = request_key(&self.offline_doc_url);
            if let Some(doc) = self.cache_lookup(&self.static_namespace, &key).await {
                return doc;
            }
            // Offline document missing from the cache; nothing better than
            // the generic answer
            return substitute::generic_failure();
        }
        if substitute::accepts_image(accept) {
            return substitute::placeholder_image();
        }
        substitute::generic_failure()
    }

    /// Cache read failures are logged and treated as a miss.
    async fn cache_lookup(&self, namespace: &str, key: &str) -> Option<CachedResponse> {
        match self.cache.match_key(namespace, key).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!(namespace, key, error = %e, "Cache read failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::BodyStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    const STATIC_NS: &str = "static-v1";
    const OFFLINE_URL: &str = "https://example.com/offline.html";

    /// Scripted network: either always succeeds with a fixed body, or is
    /// entirely unreachable. Counts calls either way.
    struct ScriptedNetwork {
        online: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl NetworkFetcher for ScriptedNetwork {
        async fn fetch(&self, request: &InterceptedRequest) -> Result<CachedResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.online {
                Ok(CachedResponse::with_content_type(
                    200,
                    "text/plain",
                    Bytes::from(format!("live: {}", request.url)),
                ))
            } else {
                Err(InterceptError::Network("connection refused".to_string()))
            }
        }
    }

    fn build_interceptor(online: bool) -> (Interceptor, Arc<ScriptedNetwork>, CacheStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let cache =
            CacheStore::open(temp_dir.path().join("cache"), BodyStore::in_memory()).unwrap();
        let network = Arc::new(ScriptedNetwork {
            online,
            calls: AtomicUsize::new(0),
        });
        let interceptor = Interceptor::new(
            InterceptPolicy::default(),
            cache.clone(),
            network.clone(),
            STATIC_NS.to_string(),
            OFFLINE_URL.to_string(),
            Arc::new(Metrics::new()),
        );
        (interceptor, network, cache, temp_dir)
    }

    fn expect_response(resolution: Resolution) -> CachedResponse {
        match resolution {
            Resolution::Respond(response) => response,
            Resolution::PassThrough => panic!("expected a response, got pass-through"),
        }
    }

    #[tokio::test]
    async fn non_get_and_excluded_pass_through() {
        let (interceptor, network, _cache, _temp) = build_interceptor(true);

        let mut post = InterceptedRequest::get("https://example.com/api");
        post.method = "POST".to_string();
        assert!(matches!(
            interceptor.resolve(&post).await.unwrap(),
            Resolution::PassThrough
        ));

        let excluded = InterceptedRequest::get("https://example.com/__browserLink/x");
        assert!(matches!(
            interceptor.resolve(&excluded).await.unwrap(),
            Resolution::PassThrough
        ));

        // Pass-through decisions never touch the network here
        assert_eq!(network.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cache_first_fetches_once_and_writes_once() {
        let (interceptor, network, cache, _temp) = build_interceptor(true);
        let request = InterceptedRequest::get("https://example.com/app.css");

        // Miss: one network call, one cache write
        let first = expect_response(interceptor.resolve(&request).await.unwrap());
        assert_eq!(first.status, 200);
        assert_eq!(network.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.list_keys(STATIC_NS).unwrap().len(), 1);

        // Hit: served from cache, no second network call
        let second = expect_response(interceptor.resolve(&request).await.unwrap());
        assert_eq!(second.body, first.body);
        assert_eq!(network.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_2xx_responses_are_served_but_not_cached() {
        let temp_dir = TempDir::new().unwrap();
        let cache =
            CacheStore::open(temp_dir.path().join("cache"), BodyStore::in_memory()).unwrap();

        struct NotFoundNetwork;
        #[async_trait]
        impl NetworkFetcher for NotFoundNetwork {
            async fn fetch(&self, _request: &InterceptedRequest) -> Result<CachedResponse> {
                Ok(CachedResponse::with_content_type(
                    404,
                    "text/plain",
                    Bytes::from_static(b"nope"),
                ))
            }
        }

        let interceptor = Interceptor::new(
            InterceptPolicy::default(),
            cache.clone(),
            Arc::new(NotFoundNetwork),
            STATIC_NS.to_string(),
            OFFLINE_URL.to_string(),
            Arc::new(Metrics::new()),
        );

        let request = InterceptedRequest::get("https://example.com/missing");
        let response = expect_response(interceptor.resolve(&request).await.unwrap());
        assert_eq!(response.status, 404);
        assert!(cache.list_keys(STATIC_NS).unwrap().is_empty());
    }

    #[tokio::test]
    async fn media_is_cache_only_if_present() {
        let (interceptor, network, cache, _temp) = build_interceptor(true);
        let url = "https://example.com/movies/bbb.mp4";
        let request = InterceptedRequest::get(url);

        // Not downloaded yet: live network response, nothing cached
        let live = expect_response(interceptor.resolve(&request).await.unwrap());
        assert!(std::str::from_utf8(&live.body).unwrap().starts_with("live"));
        assert_eq!(network.calls.load(Ordering::SeqCst), 1);
        assert!(cache.list_keys(MEDIA_NAMESPACE).unwrap().is_empty());

        // Materialized by the download subsystem: served from cache
        cache
            .put(
                MEDIA_NAMESPACE,
                &request_key(url),
                CachedResponse::with_content_type(200, "video/mp4", Bytes::from_static(b"movie")),
            )
            .await
            .unwrap();
        let cached = expect_response(interceptor.resolve(&request).await.unwrap());
        assert_eq!(&cached.body[..], b"movie");
        assert_eq!(network.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn offline_html_request_gets_offline_document() {
        let (interceptor, _network, cache, _temp) = build_interceptor(false);
        cache
            .put(
                STATIC_NS,
                &request_key(OFFLINE_URL),
                CachedResponse::with_content_type(
                    200,
                    "text/html",
                    Bytes::from_static(b"<h1>You are offline</h1>"),
                ),
            )
            .await
            .unwrap();

        let request =
            InterceptedRequest::get("https://example.com/page").with_accept("text/html,*/*;q=0.8");
        let response = expect_response(interceptor.resolve(&request).await.unwrap());
        assert_eq!(&response.body[..], b"<h1>You are offline</h1>");
    }

    #[tokio::test]
    async fn offline_image_request_gets_placeholder() {
        let (interceptor, _network, _cache, _temp) = build_interceptor(false);
        let request = InterceptedRequest::get("https://example.com/hero.jpg")
            .with_accept("image/avif,image/webp");
        let response = expect_response(interceptor.resolve(&request).await.unwrap());
        assert_eq!(response.status, 200);
        assert_eq!(
            response.headers[0].1,
            "image/svg+xml".to_string()
        );
    }

    #[tokio::test]
    async fn offline_other_request_gets_generic_failure() {
        let (interceptor, _network, _cache, _temp) = build_interceptor(false);
        let request =
            InterceptedRequest::get("https://example.com/data.json").with_accept("application/json");
        let response = expect_response(interceptor.resolve(&request).await.unwrap());
        assert_eq!(response.status, 503);
    }

    #[tokio::test]
    async fn media_miss_offline_surfaces_network_error() {
        let (interceptor, _network, _cache, _temp) = build_interceptor(false);
        let request = InterceptedRequest::get("https://example.com/bbb.mp4");
        assert!(interceptor.resolve(&request).await.is_err());
    }
}
