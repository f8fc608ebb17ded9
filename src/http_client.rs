use futures::TryStreamExt;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::error::{Result, TransformError};

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout in seconds; `None` waits until the transport completes or fails
    pub timeout_seconds: Option<u64>,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: None,
            user_agent: format!("from-xml/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Async HTTP client for fetching remote schemas
///
/// A single GET per location. Failures are reported, never retried.
pub struct AsyncHttpClient {
    client: Client,
    config: HttpClientConfig,
}

impl AsyncHttpClient {
    /// Create a new async HTTP client with the given configuration
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(&config.user_agent)
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(10);
        if let Some(seconds) = config.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(seconds));
        }
        let client = builder.build().map_err(TransformError::from)?;

        Ok(Self { client, config })
    }

    /// Download a schema document, streaming the body into memory
    pub async fn download_schema(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| unavailable(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(unavailable(
                url,
                format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown")
                ),
            ));
        }

        let expected = response.content_length();
        let mut buffer = Vec::with_capacity(expected.unwrap_or(0) as usize);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = TryStreamExt::try_next(&mut stream)
            .await
            .map_err(|e| unavailable(url, e.to_string()))?
        {
            buffer.extend_from_slice(&chunk);
        }

        debug!(location = url, bytes = buffer.len(), ?expected, "downloaded schema");
        Ok(buffer)
    }

    /// Get the underlying reqwest client (for advanced usage)
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Get the client configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }
}

fn unavailable(url: &str, reason: String) -> TransformError {
    TransformError::SchemaUnavailable {
        location: url.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response on a local port
    async fn serve_once(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{}/order.xsd", address)
    }

    #[tokio::test]
    async fn test_http_client_creation() {
        let config = HttpClientConfig::default();
        let client = AsyncHttpClient::new(config);
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_default_config_has_no_timeout() {
        let config = HttpClientConfig::default();
        assert!(config.timeout_seconds.is_none());
        assert!(config.user_agent.starts_with("from-xml/"));

        let client = AsyncHttpClient::new(HttpClientConfig {
            timeout_seconds: Some(5),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(client.config().timeout_seconds, Some(5));
    }

    #[tokio::test]
    async fn test_download_success() {
        let url = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Length: 11\r\nConnection: close\r\n\r\n<xs:schema>",
        )
        .await;
        let client = AsyncHttpClient::new(HttpClientConfig::default()).unwrap();

        let body = client.download_schema(&url).await.unwrap();
        assert_eq!(body, b"<xs:schema>");
    }

    #[tokio::test]
    async fn test_download_error_status_is_not_retried() {
        let url = serve_once(
            "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;
        let client = AsyncHttpClient::new(HttpClientConfig::default()).unwrap();

        match client.download_schema(&url).await {
            Err(TransformError::SchemaUnavailable { location, reason }) => {
                assert_eq!(location, url);
                assert!(reason.contains("503"));
            }
            other => panic!("Expected SchemaUnavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connection_refused() {
        // Bind and drop to get a port nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        drop(listener);

        let client = AsyncHttpClient::new(HttpClientConfig::default()).unwrap();
        let result = client
            .download_schema(&format!("http://{}/missing.xsd", address))
            .await;
        assert!(matches!(
            result,
            Err(TransformError::SchemaUnavailable { .. })
        ));
    }
}
