//! HTTP transport for provider calls
//!
//! The [`ProviderTransport`] trait is the seam between vendor adapters and the
//! network; [`HttpTransport`] is the reqwest implementation.

use async_trait::async_trait;
use std::time::Duration;

use super::{ProviderError, VendorRequest};

const USER_AGENT: &str = concat!("GeoTest/", env!("CARGO_PKG_VERSION"), " (+https://geotest.ai)");

/// Maximum characters of an error body kept in `ProviderError::Http`
const ERROR_BODY_LIMIT: usize = 300;

/// Sends one vendor request and returns the decoded JSON body
#[async_trait]
pub trait ProviderTransport: Send + Sync {
    async fn post_json(
        &self,
        request: &VendorRequest,
        timeout: Duration,
    ) -> Result<serde_json::Value, ProviderError>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    http_client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, ProviderError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(Self { http_client })
    }

    pub fn with_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl ProviderTransport for HttpTransport {
    async fn post_json(
        &self,
        request: &VendorRequest,
        timeout: Duration,
    ) -> Result<serde_json::Value, ProviderError> {
        let mut builder = self
            .http_client
            .post(&request.endpoint)
            .timeout(timeout)
            .json(&request.body);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(timeout.as_millis() as u64)
            } else {
                ProviderError::Network(e.to_string())
            }
        })?;

        let status = response.status();

        if !status.is_success() {
            let error_text: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(ERROR_BODY_LIMIT)
                .collect();
            return Err(ProviderError::Http(status.as_u16(), error_text));
        }

        response.json::<serde_json::Value>().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(timeout.as_millis() as u64)
            } else {
                ProviderError::Malformed(format!("Response body is not JSON: {}", e))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_creation() {
        assert!(HttpTransport::new().is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let transport = HttpTransport::new().unwrap();
        let request = VendorRequest {
            endpoint: "http://127.0.0.1:9/unreachable".to_string(),
            headers: vec![],
            body: serde_json::json!({}),
        };

        let err = transport
            .post_json(&request, Duration::from_secs(2))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ProviderError::Network(_) | ProviderError::Timeout(_)
        ));
    }
}
