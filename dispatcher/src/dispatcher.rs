use crate::config::Config;
use crate::metrics_defs::{DISPATCH_CYCLES, DISPATCH_CYCLES_INFLIGHT, PROBE_DURATION, PROBE_REQUESTS};
use crate::request::build_url;
use crate::selection::select;
use crate::transport::Transport;
use crate::types::{DispatchOutcome, OutcomeBatch, Trigger};
use chrono::Utc;
use http::HeaderMap;
use parking_lot::RwLock;
use shared::{counter, gauge, histogram};
use std::sync::Arc;
use std::time::Instant;

struct DispatcherInner {
    config: Arc<Config>,
    transport: Arc<dyn Transport>,
    // Replaced wholesale when a cycle completes; readers never see a partial batch.
    latest: RwLock<Option<Arc<OutcomeBatch>>>,
}

/// Runs dispatch cycles and keeps the most recent outcome batch.
///
/// Cycles may overlap (a manual trigger during a scheduled tick). They share
/// nothing but the read-only config; whichever finishes last becomes the
/// latest batch.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

impl Dispatcher {
    pub fn new(config: Arc<Config>, transport: Arc<dyn Transport>) -> Self {
        Dispatcher {
            inner: Arc::new(DispatcherInner {
                config,
                transport,
                latest: RwLock::new(None),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// The batch of the most recently completed cycle, if any.
    pub fn latest(&self) -> Option<Arc<OutcomeBatch>> {
        self.inner.latest.read().clone()
    }

    /// Selects targets, calls them all concurrently and waits for every call
    /// to settle. Never fails: per-call problems are recorded in the batch.
    ///
    /// The cycle runs on its own task. Dropping the returned future (a
    /// `/trigger` caller disconnecting) does not cancel it, and its batch still
    /// becomes the latest.
    pub async fn run_cycle(&self, trigger: Trigger) -> Arc<OutcomeBatch> {
        let dispatcher = self.clone();
        let started_at = Utc::now();

        match tokio::spawn(async move { dispatcher.execute_cycle(trigger).await }).await {
            Ok(batch) => batch,
            Err(e) => {
                tracing::error!(trigger = trigger.as_str(), "Dispatch cycle task failed: {e}");
                Arc::new(OutcomeBatch {
                    trigger,
                    started_at,
                    completed_at: Utc::now(),
                    outcomes: Vec::new(),
                })
            }
        }
    }

    async fn execute_cycle(&self, trigger: Trigger) -> Arc<OutcomeBatch> {
        let config = self.config();
        let started_at = Utc::now();
        gauge!(DISPATCH_CYCLES_INFLIGHT).increment(1.0);

        let selections = {
            let mut rng = rand::rng();
            select(
                config.strategy,
                &config.endpoints,
                &config.query_params,
                &mut rng,
            )
        };

        let urls: Vec<String> = selections
            .iter()
            .map(|s| build_url(&config.base_url, &s.endpoint, &s.params))
            .collect();

        if urls.is_empty() {
            tracing::info!(
                trigger = trigger.as_str(),
                "No endpoints configured, nothing to dispatch"
            );
        }

        let outcomes = self.execute_parallel(urls).await;

        let batch = Arc::new(OutcomeBatch {
            trigger,
            started_at,
            completed_at: Utc::now(),
            outcomes,
        });

        tracing::info!(
            trigger = trigger.as_str(),
            calls = batch.outcomes.len(),
            succeeded = batch.succeeded(),
            failed = batch.failed(),
            "Dispatch cycle completed"
        );
        counter!(DISPATCH_CYCLES, "trigger" => trigger.as_str()).increment(1);
        gauge!(DISPATCH_CYCLES_INFLIGHT).decrement(1.0);

        *self.inner.latest.write() = Some(batch.clone());
        batch
    }

    /// Spawns one task per URL and collects the outcomes in input order.
    async fn execute_parallel(&self, urls: Vec<String>) -> Vec<DispatchOutcome> {
        let handles: Vec<_> = urls
            .iter()
            .map(|url| {
                let transport = self.inner.transport.clone();
                let config = self.inner.config.clone();
                let url = url.clone();
                tokio::spawn(
                    async move { send_probe(transport.as_ref(), url, &config.headers).await },
                )
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (url, handle) in urls.into_iter().zip(handles) {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(url = %url, "Probe task panicked: {e}");
                    DispatchOutcome {
                        url,
                        final_url: None,
                        status: None,
                        success: false,
                        error: Some(format!("probe task failed: {e}")),
                        duration_ms: 0,
                    }
                }
            };
            outcomes.push(outcome);
        }

        outcomes
    }
}

/// Issues one GET and turns whatever happens into an outcome.
async fn send_probe(transport: &dyn Transport, url: String, headers: &HeaderMap) -> DispatchOutcome {
    let start = Instant::now();
    let result = transport.get(&url, headers).await;
    let elapsed = start.elapsed();
    histogram!(PROBE_DURATION).record(elapsed.as_secs_f64());
    let duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);

    match result {
        Ok(response) => {
            let success = response.status.is_success();
            let final_url = (response.final_url != url).then_some(response.final_url);

            let error = if success {
                tracing::info!(url = %url, status = response.status.as_u16(), duration_ms, "Probe succeeded");
                counter!(PROBE_REQUESTS, "outcome" => "success").increment(1);
                None
            } else {
                tracing::warn!(url = %url, status = response.status.as_u16(), duration_ms, "Probe returned non-success status");
                counter!(PROBE_REQUESTS, "outcome" => "http_error").increment(1);
                Some(format!("unexpected status {}", response.status))
            };

            DispatchOutcome {
                url,
                final_url,
                status: Some(response.status.as_u16()),
                success,
                error,
                duration_ms,
            }
        }
        Err(e) => {
            tracing::error!(url = %url, duration_ms, "Probe failed: {e}");
            counter!(PROBE_REQUESTS, "outcome" => "transport_error").increment(1);

            DispatchOutcome {
                url,
                final_url: None,
                status: None,
                success: false,
                error: Some(e.to_string()),
                duration_ms,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::{MockTransport, config_with};
    use crate::types::Strategy;
    use std::time::Duration;

    #[tokio::test]
    async fn test_empty_endpoint_set_is_noop() {
        let transport = Arc::new(MockTransport::new());
        let dispatcher = Dispatcher::new(config_with(&[], Strategy::SingleRandom), transport.clone());

        let batch = dispatcher.run_cycle(Trigger::Schedule).await;

        assert!(batch.is_noop());
        assert_eq!(batch.failed(), 0);
        assert!(transport.calls().is_empty());
        assert!(dispatcher.latest().is_some());
    }

    #[tokio::test]
    async fn test_one_failure_does_not_stop_siblings() {
        let transport = Arc::new(
            MockTransport::new()
                .fail_on("b")
                .with_delay(Duration::from_millis(50)),
        );
        let dispatcher = Dispatcher::new(
            config_with(&["a", "b", "c"], Strategy::BroadcastAll),
            transport.clone(),
        );

        let batch = dispatcher.run_cycle(Trigger::Manual).await;

        assert_eq!(batch.outcomes.len(), 3);
        let urls: Vec<&str> = batch.outcomes.iter().map(|o| o.url.as_str()).collect();
        assert_eq!(
            urls,
            [
                "https://probe.example.com/a",
                "https://probe.example.com/b",
                "https://probe.example.com/c"
            ]
        );
        assert!(batch.outcomes[0].success);
        assert!(!batch.outcomes[1].success);
        assert_eq!(batch.outcomes[1].status, None);
        assert!(batch.outcomes[1].error.is_some());
        assert!(batch.outcomes[2].success);
        assert_eq!(batch.succeeded(), 2);
        assert_eq!(transport.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_calls_run_concurrently() {
        let transport = Arc::new(MockTransport::new().with_delay(Duration::from_millis(300)));
        let dispatcher = Dispatcher::new(
            config_with(&["a", "b", "c", "d"], Strategy::BroadcastAll),
            transport,
        );

        let start = Instant::now();
        let batch = dispatcher.run_cycle(Trigger::Manual).await;

        assert_eq!(batch.succeeded(), 4);
        assert!(start.elapsed() < Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_panicking_call_is_recorded() {
        let transport = Arc::new(MockTransport::new().panic_on("boom"));
        let dispatcher = Dispatcher::new(
            config_with(&["ok", "boom"], Strategy::BroadcastAll),
            transport,
        );

        let batch = dispatcher.run_cycle(Trigger::Manual).await;

        assert_eq!(batch.outcomes.len(), 2);
        assert!(batch.outcomes[0].success);
        assert!(!batch.outcomes[1].success);
        assert!(
            batch.outcomes[1]
                .error
                .as_deref()
                .unwrap()
                .starts_with("probe task failed")
        );
    }

    #[tokio::test]
    async fn test_non_success_status_is_a_failed_outcome() {
        let transport = Arc::new(MockTransport::new().with_status(503));
        let dispatcher = Dispatcher::new(config_with(&["a"], Strategy::SingleRandom), transport);

        let batch = dispatcher.run_cycle(Trigger::Schedule).await;

        assert_eq!(batch.outcomes.len(), 1);
        let outcome = &batch.outcomes[0];
        assert_eq!(outcome.status, Some(503));
        assert!(!outcome.success);
        assert_eq!(
            outcome.error.as_deref(),
            Some("unexpected status 503 Service Unavailable")
        );
    }

    #[tokio::test]
    async fn test_single_random_calls_once_with_headers() {
        let transport = Arc::new(MockTransport::new());
        let dispatcher = Dispatcher::new(
            config_with(&["a", "b", "c"], Strategy::SingleRandom),
            transport.clone(),
        );

        dispatcher.run_cycle(Trigger::Schedule).await;

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].0.starts_with("https://probe.example.com/"));
        assert!(calls[0].1.contains_key(http::header::USER_AGENT));
    }

    #[tokio::test]
    async fn test_latest_batch_is_replaced() {
        let transport = Arc::new(MockTransport::new());
        let dispatcher = Dispatcher::new(config_with(&["a"], Strategy::SingleRandom), transport);
        assert!(dispatcher.latest().is_none());

        let first = dispatcher.run_cycle(Trigger::Schedule).await;
        let second = dispatcher.run_cycle(Trigger::Manual).await;

        let latest = dispatcher.latest().unwrap();
        assert!(Arc::ptr_eq(&latest, &second));
        assert!(!Arc::ptr_eq(&latest, &first));
        assert_eq!(latest.trigger, Trigger::Manual);
    }

    #[tokio::test]
    async fn test_abandoned_cycle_still_completes() {
        let transport = Arc::new(MockTransport::new().with_delay(Duration::from_millis(200)));
        let dispatcher = Dispatcher::new(
            config_with(&["a", "b", "c"], Strategy::BroadcastAll),
            transport.clone(),
        );

        let abandoned =
            tokio::time::timeout(Duration::from_millis(50), dispatcher.run_cycle(Trigger::Manual))
                .await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(transport.calls().len(), 3);
        let latest = dispatcher.latest().expect("abandoned cycle records its batch");
        assert_eq!(latest.trigger, Trigger::Manual);
        assert_eq!(latest.outcomes.len(), 3);
        assert_eq!(latest.succeeded(), 3);
    }
}
