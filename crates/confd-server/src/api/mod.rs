//! HTTP surface consumed by the SIP proxy
//!
//! The proxy-facing endpoints are served at the root and, for existing proxy
//! configurations, under `/kamailio` and `/1.0/kamailio`.

pub mod error;
pub mod handlers;
pub mod invalidation;

use std::sync::Arc;
use std::time::Duration;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use confd_core::auth::AuthResolver;
use confd_core::cache::DecisionCache;
use confd_core::cdr::CdrRecorder;
use confd_core::routing::RoutingEngine;
use confd_core::store::{CdrStore, ConfigAccessor};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use invalidation::invalidate_on_write;

/// Shared state of the HTTP handlers
#[derive(Clone)]
pub struct ApiState {
    pub routing: RoutingEngine,
    pub auth: AuthResolver,
    pub cdr: CdrRecorder,
    pub cache: DecisionCache,
    pub config: Arc<dyn ConfigAccessor>,
}

impl ApiState {
    pub fn new<S>(store: Arc<S>, cache: DecisionCache) -> Self
    where
        S: ConfigAccessor + CdrStore + 'static,
    {
        let config: Arc<dyn ConfigAccessor> = store.clone();
        let cdrs: Arc<dyn CdrStore> = store;
        Self {
            routing: RoutingEngine::new(config.clone()),
            auth: AuthResolver::new(config.clone()),
            cdr: CdrRecorder::new(config.clone(), cdrs),
            cache,
            config,
        }
    }
}

fn proxy_routes() -> Router<ApiState> {
    Router::new()
        .route("/routing", post(handlers::routing))
        .route("/auth", post(handlers::auth))
        .route("/cdr", post(handlers::cdr))
        .route("/dbtext/uacreg", get(handlers::dbtext_uacreg))
}

/// Create the control-plane router
pub fn create_router(state: ApiState, request_timeout: Option<Duration>) -> Router {
    let router = Router::new()
        .route("/health", get(handlers::health))
        .merge(proxy_routes())
        .nest("/kamailio", proxy_routes())
        .nest("/1.0/kamailio", proxy_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    match request_timeout {
        Some(timeout) => router.layer(TimeoutLayer::new(timeout)),
        None => router,
    }
}

/// Mount an administrative router whose successful writes flush the
/// decision cache. The proxy-facing routes of `router` are left untouched.
pub fn with_admin_routes(router: Router, admin: Router, cache: DecisionCache) -> Router {
    router.merge(admin.layer(middleware::from_fn_with_state(cache, invalidate_on_write)))
}
