//! Fetch seam for background downloads.
//!
//! The runner consumes assets through [`AssetFetcher`] so tests can script
//! transfers chunk by chunk without a network.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use super::error::FetchError;
use super::http::{HttpClient, HttpConfig};

/// One asset transfer in flight: status and headers up front, body as a
/// sequence of chunks.
pub struct AssetStream {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    rx: mpsc::Receiver<Result<Bytes, FetchError>>,
}

impl AssetStream {
    pub fn new(
        status: u16,
        headers: Vec<(String, String)>,
        rx: mpsc::Receiver<Result<Bytes, FetchError>>,
    ) -> Self {
        Self {
            status,
            headers,
            rx,
        }
    }

    /// Build a stream from pre-materialized chunks (scripted transfers).
    pub fn from_chunks(status: u16, headers: Vec<(String, String)>, chunks: Vec<Bytes>) -> Self {
        let (tx, rx) = mpsc::channel(chunks.len().max(1));
        for chunk in chunks {
            // Capacity covers every chunk, so try_send cannot fail here
            let _ = tx.try_send(Ok(chunk));
        }
        Self::new(status, headers, rx)
    }

    pub async fn chunk(&mut self) -> Result<Option<Bytes>, FetchError> {
        match self.rx.recv().await {
            Some(result) => result.map(Some),
            None => Ok(None),
        }
    }
}

#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<AssetStream, FetchError>;
}

/// Production fetcher: streams over HTTP via reqwest.
pub struct HttpAssetFetcher {
    client: HttpClient,
}

impl HttpAssetFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self, FetchError> {
        Ok(Self {
            client: HttpClient::new(config)?,
        })
    }
}

#[async_trait]
impl AssetFetcher for HttpAssetFetcher {
    async fn fetch(&self, url: &str) -> Result<AssetStream, FetchError> {
        let mut response = self.client.fetch(url).await?;
        let status = response.status();
        let headers = response.headers().to_vec();

        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(async move {
            loop {
                match response.chunk().await {
                    Ok(Some(bytes)) => {
                        if tx.send(Ok(bytes)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        break;
                    }
                }
            }
        });

        Ok(AssetStream::new(status, headers, rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_stream_yields_chunks_in_order() {
        let mut stream = AssetStream::from_chunks(
            200,
            vec![("content-type".to_string(), "video/mp4".to_string())],
            vec![Bytes::from_static(b"aa"), Bytes::from_static(b"bbb")],
        );

        assert_eq!(stream.status, 200);
        assert_eq!(stream.chunk().await.unwrap().unwrap(), &b"aa"[..]);
        assert_eq!(stream.chunk().await.unwrap().unwrap(), &b"bbb"[..]);
        assert!(stream.chunk().await.unwrap().is_none());
    }
}
