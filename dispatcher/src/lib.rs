pub mod api;
pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod metrics_defs;
pub mod request;
pub mod scheduler;
pub mod selection;
pub mod transport;
pub mod types;

#[cfg(test)]
mod testutils;

use config::Config;
use dispatcher::Dispatcher;
use errors::Result;
use scheduler::CronScheduler;
use std::future::Future;
use std::sync::Arc;
use transport::ReqwestTransport;
use types::Trigger;

/// Builds a dispatcher backed by the real HTTP transport.
pub fn build_dispatcher(config: Arc<Config>) -> Result<Dispatcher> {
    let transport = ReqwestTransport::new(config.request_timeout)?;
    Ok(Dispatcher::new(config, Arc::new(transport)))
}

/// Fires a dispatch cycle at every tick of the configured schedule.
pub async fn run_scheduler(dispatcher: Dispatcher) {
    let scheduler = CronScheduler::new(dispatcher.config().schedule.clone());
    tracing::info!(
        schedule = dispatcher.config().schedule.expression(),
        strategy = dispatcher.config().strategy.as_str(),
        endpoints = dispatcher.config().endpoints.len(),
        "Scheduler registered"
    );

    scheduler
        .run(move || {
            let dispatcher = dispatcher.clone();
            async move {
                dispatcher.run_cycle(Trigger::Schedule).await;
            }
        })
        .await;
}

/// Runs the scheduler, plus the control surface when `serve_control` is set,
/// until `shutdown` resolves.
pub async fn run<F>(config: Arc<Config>, serve_control: bool, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let dispatcher = build_dispatcher(config)?;
    let scheduler = tokio::spawn(run_scheduler(dispatcher.clone()));

    let result = if serve_control {
        api::serve(dispatcher, shutdown).await
    } else {
        shutdown.await;
        Ok(())
    };

    scheduler.abort();
    tracing::info!("Dispatcher stopped");
    result
}
