use crate::registry::Registry;
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::Extension,
    http::{uri::PathAndQuery, HeaderName, HeaderValue, Request, StatusCode, Uri},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use std::{future::IntoFuture, net::SocketAddr, sync::Arc};
use tokio::{net::TcpListener, sync::watch};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer, request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{debug_span, info, warn, Span};
use ulid::Ulid;

pub mod handlers;
pub mod lifecycle;
pub mod openapi;

/// Build the application router with every route and the shared layers.
///
/// Paths are matched case-insensitively: the outer router lowercases the
/// path before the inner one routes it.
pub fn router(registry: Arc<Registry>) -> Router {
    let routes = Router::new()
        .route("/", get(handlers::root))
        .route("/knock", get(handlers::knock).post(handlers::knock))
        .route("/handler", post(handlers::handler))
        .route("/health", get(handlers::health).options(handlers::health))
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(CatchPanicLayer::new())
                .layer(Extension(registry)),
        );

    Router::new()
        .fallback_service(routes)
        .layer(middleware::map_request(lowercase_path))
}

// only the path, the query keeps its case
async fn lowercase_path(mut request: Request<Body>) -> Request<Body> {
    let path = request.uri().path();
    if !path.bytes().any(|b| b.is_ascii_uppercase()) {
        return request;
    }

    let lowered = match request.uri().query() {
        Some(query) => format!("{}?{query}", path.to_ascii_lowercase()),
        None => path.to_ascii_lowercase(),
    };

    let mut parts = request.uri().clone().into_parts();
    parts.path_and_query = PathAndQuery::try_from(lowered).ok();
    if let Ok(uri) = Uri::from_parts(parts) {
        *request.uri_mut() = uri;
    }

    request
}

/// Serve until SIGTERM/SIGINT, then give in-flight requests
/// [`lifecycle::SHUTDOWN_GRACE`] to finish.
///
/// # Errors
/// Returns an error if the listener can't be bound or the server fails
pub async fn new(bind: &str, registry: Arc<Registry>) -> Result<()> {
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;

    info!("Listening on {}", listener.local_addr()?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let signals = lifecycle::spawn_signals(registry.clone(), shutdown_tx)?;
    let sweeper = lifecycle::spawn_sweeper(
        registry.clone(),
        lifecycle::SWEEP_INTERVAL,
        shutdown_rx.clone(),
    );

    let app = router(registry);

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(lifecycle::wait_for_shutdown(shutdown_rx.clone()))
    .into_future();

    tokio::select! {
        result = server => {
            result.context("HTTP server error")?;
            info!("Gracefully shutdown");
        }
        () = lifecycle::shutdown_deadline(shutdown_rx, lifecycle::SHUTDOWN_GRACE) => {
            warn!(
                "In-flight requests still running after {:?}, abandoning them",
                lifecycle::SHUTDOWN_GRACE
            );
        }
    }

    sweeper.abort();
    signals.abort();

    Ok(())
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not Found")
}

// span
fn make_span(request: &Request<Body>) -> Span {
    let headers = request.headers();
    let method = request.method();
    let path = request.uri().path();
    let request_id = headers
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    debug_span!("http-request", %method, path, request_id)
}
