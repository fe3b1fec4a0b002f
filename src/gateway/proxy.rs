//! Live network access for intercepted traffic.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::cache::CachedResponse;
use crate::config::DownloadsConfig;
use crate::intercept::{InterceptError, InterceptedRequest, NetworkFetcher, Result};

/// Hop-by-hop headers, never replayed in either direction. `host` and
/// `content-length` are also dropped upstream: reqwest derives both from
/// the URL and the body.
const STRIPPED_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "transfer-encoding",
    "content-length",
    "te",
    "trailer",
    "upgrade",
];

fn replayable(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    !STRIPPED_HEADERS.contains(&name.as_str()) && name != "host"
}

/// Forwards intercepted requests upstream over reqwest and buffers the
/// response into a [`CachedResponse`] so it can be served or cached.
pub struct ProxyNetworkFetcher {
    client: Client,
}

impl ProxyNetworkFetcher {
    pub fn new(config: &DownloadsConfig) -> std::result::Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl NetworkFetcher for ProxyNetworkFetcher {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<CachedResponse> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| InterceptError::Network(e.to_string()))?;

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            if replayable(name) {
                builder = builder.header(name, value);
            }
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| InterceptError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter(|(name, _)| !STRIPPED_HEADERS.contains(&name.as_str()))
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| InterceptError::Network(e.to_string()))?;

        Ok(CachedResponse::new(status, headers, body))
    }
}
