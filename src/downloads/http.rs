//! Streaming HTTP client for background downloads

use std::time::Duration;

use bytes::Bytes;
use reqwest::Client;
use tracing::debug;

use super::error::FetchError;

pub type Result<T> = std::result::Result<T, FetchError>;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(3600),
            user_agent: "medialocker/0.1.0".to_string(),
        }
    }
}

/// A response being streamed in. Status and headers are captured up front;
/// the body is consumed chunk by chunk so progress can be reported while
/// the transfer runs.
pub struct StreamingResponse {
    status: u16,
    headers: Vec<(String, String)>,
    inner: reqwest::Response,
}

impl StreamingResponse {
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Next body chunk, or `None` once the transfer is complete.
    pub async fn chunk(&mut self) -> Result<Option<Bytes>> {
        self.inner.chunk().await.map_err(map_reqwest_error)
    }
}

/// Thin wrapper around reqwest with download-appropriate timeouts.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| FetchError::RequestFailed(e.to_string()))?;

        Ok(Self { client })
    }

    /// Issue a GET and hand back the response for streaming consumption.
    /// Non-2xx statuses are an error here: a background download either
    /// materializes the real asset or fails.
    pub async fn fetch(&self, url: &str) -> Result<StreamingResponse> {
        debug!(url, "Starting streamed fetch");

        let response = self.client.get(url).send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::BadStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        Ok(StreamingResponse {
            status: status.as_u16(),
            headers,
            inner: response,
        })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else if e.is_redirect() {
        FetchError::TooManyRedirects
    } else {
        FetchError::RequestFailed(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = HttpConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(3600));
        assert_eq!(config.user_agent, "medialocker/0.1.0");
    }
}
