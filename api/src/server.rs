//! Router assembly and serving.

use axum::error_handling::HandleErrorLayer;
use axum::routing::{get, post, put};
use axum::{BoxError, Router};
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::timeout::error::Elapsed;
use tower::timeout::TimeoutLayer;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::handlers;
use crate::{ApiError, AppState};

/// HTTP-level settings.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Requests still running after this long are answered with 408.
    pub request_timeout: Duration,
    /// Mount `/metrics`.
    pub metrics_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            metrics_enabled: true,
        }
    }
}

/// Build the full router: REST endpoints, `/ws`, and the middleware stack.
pub fn router(state: AppState, config: &ApiConfig) -> Router {
    let mut api = Router::new()
        .route(
            "/api/proposals",
            post(handlers::create_proposal).get(handlers::list_proposals),
        )
        .route("/api/proposals/:id", get(handlers::get_proposal))
        .route("/api/proposals/:id/vote", put(handlers::cast_vote))
        .route(
            "/api/proposals/:id/votes/:wallet",
            get(handlers::get_receipt),
        )
        .route(
            "/api/wallets/:wallet/balance",
            get(handlers::wallet_balance),
        )
        .route("/health", get(handlers::health))
        .route("/chain/health", get(handlers::chain_health));
    if config.metrics_enabled {
        api = api.route("/metrics", get(handlers::metrics));
    }

    let realtime = agora_websocket::router(state.broadcaster.clone());

    api.with_state(state)
        .merge(realtime)
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(middleware_error))
                .layer(TimeoutLayer::new(config.request_timeout)),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Errors raised by the middleware stack, answered with the usual JSON body.
async fn middleware_error(err: BoxError) -> ApiError {
    if err.is::<Elapsed>() {
        ApiError::Timeout("request timed out".into())
    } else {
        ApiError::Internal(format!("unhandled middleware error: {err}"))
    }
}

/// Serve `router` on `listener` until `shutdown` resolves, then drain
/// in-flight requests.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!(%addr, "HTTP API listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}
