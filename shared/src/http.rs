use axum::Json;
use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::future::Future;
use tokio::net::TcpListener;

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

/// Builds a JSON error response of the form `{"error": "..."}`.
pub fn make_error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(ErrorBody { error: message })).into_response()
}

/// Binds `host:port` and serves `app` until `shutdown` resolves.
///
/// In-flight requests are allowed to finish once shutdown has been signalled.
pub async fn run_http_service<F>(
    host: &str,
    port: u16,
    app: Router,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(format!("{host}:{port}")).await?;
    tracing::info!(address = %listener.local_addr()?, "http listener bound");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
