use crate::config::{Config, RawConfig};
use crate::errors::TransportError;
use crate::transport::{Transport, TransportResponse};
use crate::types::{Secret, Strategy};
use async_trait::async_trait;
use http::{HeaderMap, StatusCode};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

pub const TEST_BASE_URL: &str = "https://probe.example.com";
pub const TEST_SECRET: &str = "s3cret";

pub fn raw_config(endpoints: &[&str], strategy: Strategy) -> RawConfig {
    RawConfig {
        schedule: Some("*/5 * * * *".into()),
        base_url: Some(TEST_BASE_URL.into()),
        endpoints: endpoints.iter().map(|e| e.to_string()).collect(),
        strategy,
        auth_token: Some(Secret::new(TEST_SECRET)),
        ..Default::default()
    }
}

pub fn config_with(endpoints: &[&str], strategy: Strategy) -> Arc<Config> {
    Arc::new(raw_config(endpoints, strategy).validate().unwrap())
}

/// In-memory transport that records every call.
pub struct MockTransport {
    status: StatusCode,
    delay: Duration,
    fail_on: Vec<String>,
    panic_on: Vec<String>,
    calls: Mutex<Vec<(String, HeaderMap)>>,
}

impl MockTransport {
    pub fn new() -> Self {
        MockTransport {
            status: StatusCode::OK,
            delay: Duration::ZERO,
            fail_on: Vec::new(),
            panic_on: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = StatusCode::from_u16(status).unwrap();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Calls whose URL ends with `suffix` fail at the transport level.
    pub fn fail_on(mut self, suffix: &str) -> Self {
        self.fail_on.push(suffix.to_string());
        self
    }

    /// Calls whose URL ends with `suffix` panic.
    pub fn panic_on(mut self, suffix: &str) -> Self {
        self.panic_on.push(suffix.to_string());
        self
    }

    pub fn calls(&self) -> Vec<(String, HeaderMap)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(
        &self,
        url: &str,
        headers: &HeaderMap,
    ) -> Result<TransportResponse, TransportError> {
        self.calls.lock().push((url.to_string(), headers.clone()));
        tokio::time::sleep(self.delay).await;

        if self.panic_on.iter().any(|s| url.ends_with(s.as_str())) {
            panic!("mock transport asked to panic for {url}");
        }
        if self.fail_on.iter().any(|s| url.ends_with(s.as_str())) {
            return Err(TransportError::RequestFailed(
                url.to_string(),
                "connection refused".into(),
            ));
        }

        Ok(TransportResponse {
            status: self.status,
            final_url: url.to_string(),
        })
    }
}
