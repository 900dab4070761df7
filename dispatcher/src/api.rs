//! Control surface: liveness, manual trigger and status.

use crate::dispatcher::Dispatcher;
use crate::errors::DispatcherError;
use crate::metrics_defs::CONTROL_AUTH_REJECTED;
use crate::types::{DispatchOutcome, OutcomeBatch, Secret, Strategy, Trigger};
use axum::{
    Json, Router,
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::counter;
use shared::http::{make_error_response, run_http_service};
use std::future::Future;

#[derive(Clone)]
struct AppState {
    dispatcher: Dispatcher,
}

/// Builds the control surface router.
///
/// `/trigger` and `/status` are only mounted when an inbound secret is
/// configured; without one they answer 404 like any unknown path.
pub fn router(dispatcher: Dispatcher) -> Router {
    let state = AppState { dispatcher };
    let mut app = Router::new().route("/health", get(health));

    if state.dispatcher.config().credentials.inbound.is_some() {
        let protected = Router::new()
            .route("/trigger", post(trigger))
            .route("/status", get(status))
            .route_layer(middleware::from_fn_with_state(state.clone(), require_token));
        app = app.merge(protected);
    } else {
        tracing::warn!("No inbound secret configured, /trigger and /status are disabled");
    }

    app.fallback(not_found).with_state(state)
}

/// Serves the control surface on the configured listener until `shutdown`
/// resolves.
pub async fn serve<F>(dispatcher: Dispatcher, shutdown: F) -> Result<(), DispatcherError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = dispatcher.config().listener.clone();
    run_http_service(&listener.host, listener.port, router(dispatcher), shutdown).await?;
    Ok(())
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingCredential,
    #[error("Invalid token")]
    InvalidCredential,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::MissingCredential => StatusCode::UNAUTHORIZED,
            AuthError::InvalidCredential => StatusCode::FORBIDDEN,
        };
        make_error_response(status, &self.to_string())
    }
}

/// Checks the `Authorization` header against the inbound secret. A leading
/// `Bearer ` is optional.
///
/// This is a plain string comparison. It is not constant-time and there is
/// no rotation.
pub fn authorize(headers: &HeaderMap, secret: &Secret) -> Result<(), AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingCredential)?;
    let value = value.to_str().map_err(|_| AuthError::InvalidCredential)?;
    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();

    if token == secret.expose() {
        Ok(())
    } else {
        Err(AuthError::InvalidCredential)
    }
}

async fn require_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    // Unreachable in practice: `router` only mounts this layer when a secret
    // is configured. Without one the protected routes answer 404.
    let Some(secret) = state.dispatcher.config().credentials.inbound.as_ref() else {
        return Err(AuthError::InvalidCredential);
    };

    if let Err(e) = authorize(request.headers(), secret) {
        let reason = match e {
            AuthError::MissingCredential => "missing",
            AuthError::InvalidCredential => "invalid",
        };
        tracing::warn!(path = request.uri().path(), reason, "Rejected control request");
        counter!(CONTROL_AUTH_REJECTED, "reason" => reason).increment(1);
        return Err(e);
    }

    Ok(next.run(request).await)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: DateTime<Utc>,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now(),
    })
}

#[derive(Serialize)]
struct TriggerResponse {
    message: &'static str,
    result: Vec<DispatchOutcome>,
    timestamp: DateTime<Utc>,
}

async fn trigger(State(state): State<AppState>) -> Json<TriggerResponse> {
    tracing::info!("Manual dispatch requested");
    let batch = state.dispatcher.run_cycle(Trigger::Manual).await;

    let message = if batch.is_noop() {
        "No endpoints configured, nothing dispatched"
    } else {
        "Dispatch completed"
    };

    Json(TriggerResponse {
        message,
        result: batch.outcomes.clone(),
        timestamp: Utc::now(),
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchSummary {
    trigger: Trigger,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    total: usize,
    succeeded: usize,
    failed: usize,
}

impl From<&OutcomeBatch> for BatchSummary {
    fn from(batch: &OutcomeBatch) -> Self {
        BatchSummary {
            trigger: batch.trigger,
            started_at: batch.started_at,
            completed_at: batch.completed_at,
            total: batch.outcomes.len(),
            succeeded: batch.succeeded(),
            failed: batch.failed(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    schedule: String,
    #[serde(rename = "baseURL")]
    base_url: String,
    endpoints_count: usize,
    query_params_count: usize,
    has_outbound_auth: bool,
    strategy: Strategy,
    next_run: Option<DateTime<Utc>>,
    last_dispatch: Option<BatchSummary>,
    timestamp: DateTime<Utc>,
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let config = state.dispatcher.config();
    let now = Utc::now();

    Json(StatusResponse {
        schedule: config.schedule.expression().to_string(),
        base_url: config.base_url.clone(),
        endpoints_count: config.endpoints.len(),
        query_params_count: config.query_params.len(),
        has_outbound_auth: config.credentials.outbound.is_some(),
        strategy: config.strategy,
        next_run: config.schedule.next_after(now),
        last_dispatch: state.dispatcher.latest().as_deref().map(BatchSummary::from),
        timestamp: now,
    })
}

async fn not_found() -> Response {
    make_error_response(StatusCode::NOT_FOUND, "Not found")
}
