use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};
use url::Url;

use crate::application::ports::ImageSourcePort;
use crate::domain::errors::{DomainError, DomainResult};

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Downloads images named by `source_type: url` requests.
pub struct HttpImageSource {
    client: reqwest::Client,
    max_bytes: usize,
}

impl HttpImageSource {
    pub fn new(max_bytes: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, max_bytes }
    }
}

#[async_trait]
impl ImageSourcePort for HttpImageSource {
    async fn fetch(&self, url: &Url) -> DomainResult<Vec<u8>> {
        let fail = |msg: String| {
            warn!(%url, error = %msg, "image fetch failed");
            DomainError::Inference(format!("could not fetch image from {url}: {msg}"))
        };

        let res = self.client.get(url.clone()).send().await.map_err(|e| fail(e.to_string()))?;
        let status = res.status();
        if !status.is_success() {
            return Err(fail(format!("HTTP {status}")));
        }
        if res.content_length().is_some_and(|len| len as usize > self.max_bytes) {
            return Err(fail(format!("image larger than {} bytes", self.max_bytes)));
        }

        // Chunked bodies carry no length up front; stop reading once over the cap.
        let mut res = res;
        let mut bytes = Vec::new();
        while let Some(chunk) = res.chunk().await.map_err(|e| fail(e.to_string()))? {
            if bytes.len() + chunk.len() > self.max_bytes {
                return Err(fail(format!("image larger than {} bytes", self.max_bytes)));
            }
            bytes.extend_from_slice(&chunk);
        }

        info!(%url, bytes = bytes.len(), "image fetched");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one canned HTTP response per connection and returns the base URL.
    async fn serve(response: Vec<u8>) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let response = response.clone();
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    let _ = socket.read(&mut buf).await;
                    let _ = socket.write_all(&response).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        Url::parse(&format!("http://{addr}/image.jpg")).unwrap()
    }

    fn chunked(chunks: &[&[u8]]) -> Vec<u8> {
        let mut out = b"HTTP/1.1 200 OK\r\nContent-Type: image/jpeg\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n".to_vec();
        for chunk in chunks {
            out.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
            out.extend_from_slice(chunk);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"0\r\n\r\n");
        out
    }

    #[tokio::test]
    async fn chunked_body_over_the_cap_is_rejected() {
        let block = [7u8; 600];
        let url = serve(chunked(&[&block, &block, &block])).await;

        let err = HttpImageSource::new(1000).fetch(&url).await.unwrap_err();
        assert!(matches!(err, DomainError::Inference(ref msg) if msg.contains("larger than 1000 bytes")), "{err}");
    }

    #[tokio::test]
    async fn chunked_body_under_the_cap_is_returned() {
        let url = serve(chunked(&[b"abc", b"defg"])).await;
        let bytes = HttpImageSource::new(1000).fetch(&url).await.unwrap();
        assert_eq!(bytes, b"abcdefg");
    }

    #[tokio::test]
    async fn declared_length_over_the_cap_is_rejected() {
        let mut response = b"HTTP/1.1 200 OK\r\nContent-Length: 5000\r\nConnection: close\r\n\r\n".to_vec();
        response.extend_from_slice(&[1u8; 5000]);
        let url = serve(response).await;

        let err = HttpImageSource::new(1000).fetch(&url).await.unwrap_err();
        assert!(matches!(err, DomainError::Inference(ref msg) if msg.contains("larger than")), "{err}");
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let url = serve(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_vec()).await;

        let err = HttpImageSource::new(1000).fetch(&url).await.unwrap_err();
        assert!(matches!(err, DomainError::Inference(ref msg) if msg.contains("404")), "{err}");
    }
}
