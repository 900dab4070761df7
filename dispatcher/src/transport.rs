use crate::errors::TransportError;
use async_trait::async_trait;
use http::{HeaderMap, StatusCode};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub struct TransportResponse {
    pub status: StatusCode,
    /// URL of the final response after redirects.
    pub final_url: String,
}

/// Outbound HTTP client used by the dispatcher. Always issues a GET.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, headers: &HeaderMap)
    -> Result<TransportResponse, TransportError>;
}

/// `reqwest`-backed transport. The timeout covers the whole request.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(ReqwestTransport { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        headers: &HeaderMap,
    ) -> Result<TransportResponse, TransportError> {
        let parsed = reqwest::Url::parse(url).map_err(|e| TransportError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let response = self
            .client
            .get(parsed)
            .headers(headers.clone())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout(url.to_string())
                } else {
                    TransportError::RequestFailed(url.to_string(), e.to_string())
                }
            })?;

        Ok(TransportResponse {
            status: response.status(),
            final_url: response.url().to_string(),
        })
    }
}
