//! HTTP client abstraction for testability

use std::future::Future;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::layer::SourceError;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const DEFAULT_USER_AGENT: &str = concat!("tilestream/", env!("CARGO_PKG_VERSION"));

/// Async HTTP GET used by the network-backed layer sources.
pub trait AsyncHttpClient: Send + Sync + 'static {
    fn get(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, SourceError>> + Send;
}

/// [`AsyncHttpClient`] backed by a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct AsyncReqwestClient {
    client: reqwest::Client,
}

impl AsyncReqwestClient {
    pub fn new() -> Result<Self, SourceError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| SourceError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl AsyncHttpClient for AsyncReqwestClient {
    async fn get(&self, url: &str) -> Result<Vec<u8>, SourceError> {
        trace!(url, "HTTP GET");

        let response = self.client.get(url).send().await.map_err(|e| {
            warn!(
                url,
                error = %e,
                is_connect = e.is_connect(),
                is_timeout = e.is_timeout(),
                "HTTP request failed"
            );
            SourceError::Http(format!("Request failed: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Http(format!("HTTP {} from {}", status, url)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SourceError::InvalidResponse(format!("Failed to read body: {}", e)))?;
        debug!(url, bytes = body.len(), "HTTP response");
        Ok(body.to_vec())
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use parking_lot::Mutex;

    /// Returns a fixed response and records requested URLs.
    pub(crate) struct MockHttpClient {
        pub response: Result<Vec<u8>, SourceError>,
        pub requests: Mutex<Vec<String>>,
    }

    impl MockHttpClient {
        pub(crate) fn ok(body: Vec<u8>) -> Self {
            Self {
                response: Ok(body),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn failing(message: &str) -> Self {
            Self {
                response: Err(SourceError::Http(message.to_string())),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn urls(&self) -> Vec<String> {
            self.requests.lock().clone()
        }
    }

    impl AsyncHttpClient for MockHttpClient {
        async fn get(&self, url: &str) -> Result<Vec<u8>, SourceError> {
            self.requests.lock().push(url.to_string());
            self.response.clone()
        }
    }

    #[tokio::test]
    async fn test_mock_client_records_urls() {
        let mock = MockHttpClient::ok(vec![1, 2, 3]);
        assert_eq!(mock.get("http://a/1").await.unwrap(), vec![1, 2, 3]);
        assert!(MockHttpClient::failing("nope").get("http://a/2").await.is_err());
        assert_eq!(mock.urls(), vec!["http://a/1".to_string()]);
    }
}
