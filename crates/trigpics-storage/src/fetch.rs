//! Download of published photos through their public URL.

use crate::traits::{FetchError, PhotoFetcher};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::time::Duration;

/// [`PhotoFetcher`] backed by a shared reqwest client.
///
/// Bodies larger than `max_bytes` are rejected with [`FetchError::TooLarge`],
/// either up front from `Content-Length` or once the streamed body passes
/// the limit.
#[derive(Clone)]
pub struct HttpPhotoFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl HttpPhotoFetcher {
    pub fn new(timeout: Duration, max_bytes: usize) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Transport {
                url: String::new(),
                message: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self { client, max_bytes })
    }
}

#[async_trait]
impl PhotoFetcher for HttpPhotoFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        let start = std::time::Instant::now();
        let to_error = |e: reqwest::Error| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                }
            } else {
                FetchError::Transport {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        };

        let mut response = self.client.get(url).send().await.map_err(to_error)?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(url = %url, status = status.as_u16(), "Photo download rejected");
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let too_large = || FetchError::TooLarge {
            url: url.to_string(),
            limit: self.max_bytes,
        };
        if response
            .content_length()
            .is_some_and(|len| len > self.max_bytes as u64)
        {
            tracing::warn!(url = %url, limit = self.max_bytes, "Photo download too large");
            return Err(too_large());
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = response.chunk().await.map_err(to_error)? {
            if body.len() + chunk.len() > self.max_bytes {
                tracing::warn!(url = %url, limit = self.max_bytes, "Photo download too large");
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }
        let bytes = body.freeze();

        tracing::debug!(
            url = %url,
            size_bytes = bytes.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Photo downloaded"
        );

        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one raw HTTP response on a local port and return its URL.
    async fn serve_once(response: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            let _ = socket.write_all(&response).await;
            let _ = socket.shutdown().await;
        });
        format!("http://{}/000/P00001.jpg", addr)
    }

    fn fetcher(max_bytes: usize) -> HttpPhotoFetcher {
        HttpPhotoFetcher::new(Duration::from_secs(5), max_bytes).unwrap()
    }

    fn with_length(body: &[u8]) -> Vec<u8> {
        let mut response = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        )
        .into_bytes();
        response.extend_from_slice(body);
        response
    }

    fn chunked(body: &[u8]) -> Vec<u8> {
        let mut response =
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n"
                .to_vec();
        for part in body.chunks(16) {
            response.extend_from_slice(format!("{:x}\r\n", part.len()).as_bytes());
            response.extend_from_slice(part);
            response.extend_from_slice(b"\r\n");
        }
        response.extend_from_slice(b"0\r\n\r\n");
        response
    }

    #[tokio::test]
    async fn body_within_limit_is_returned() {
        let url = serve_once(with_length(&[7u8; 64])).await;

        let bytes = fetcher(64).fetch(&url).await.unwrap();

        assert_eq!(bytes.len(), 64);
    }

    #[tokio::test]
    async fn declared_length_over_limit_is_rejected() {
        let url = serve_once(with_length(&[7u8; 65])).await;

        let err = fetcher(64).fetch(&url).await.unwrap_err();

        assert!(matches!(err, FetchError::TooLarge { limit: 64, .. }));
    }

    #[tokio::test]
    async fn undeclared_length_is_capped_while_reading() {
        let url = serve_once(chunked(&[7u8; 100])).await;

        let err = fetcher(64).fetch(&url).await.unwrap_err();

        assert!(matches!(err, FetchError::TooLarge { limit: 64, .. }));
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let url = serve_once(
            b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_vec(),
        )
        .await;

        let err = fetcher(64).fetch(&url).await.unwrap_err();

        assert!(matches!(err, FetchError::Status { status: 404, .. }));
    }
}
