//! Handlers of the proxy-facing endpoints

use axum::extract::State;
use axum::Json;
use confd_core::auth::{AuthRequest, AuthResult};
use confd_core::cache::{auth_key, routing_key};
use confd_core::cdr::{CdrRequest, CdrResponse};
use confd_core::routing::{RoutingRequest, RoutingResponse};
use confd_core::uacreg::uacreg_content;
use serde::Serialize;
use tracing::debug;

use super::error::ApiError;
use super::ApiState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
pub struct DbtextResponse {
    content: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn routing(
    State(state): State<ApiState>,
    Json(request): Json<RoutingRequest>,
) -> Result<Json<RoutingResponse>, ApiError> {
    let key = routing_key(&request);
    let response = state
        .cache
        .get_or_compute(&key, || state.routing.decide(&request))
        .await?;
    Ok(Json(response))
}

pub async fn auth(
    State(state): State<ApiState>,
    Json(request): Json<AuthRequest>,
) -> Result<Json<AuthResult>, ApiError> {
    // the outcome depends on a secret that is not part of the key
    if request.password.is_some() {
        debug!("Password supplied, bypassing decision cache");
        return Ok(Json(state.auth.resolve(&request).await?));
    }

    let key = auth_key(&request);
    let result = state
        .cache
        .get_or_compute(&key, || state.auth.resolve(&request))
        .await?;
    Ok(Json(result))
}

pub async fn cdr(
    State(state): State<ApiState>,
    Json(request): Json<CdrRequest>,
) -> Result<Json<CdrResponse>, ApiError> {
    Ok(Json(state.cdr.record(request).await?))
}

pub async fn dbtext_uacreg(State(state): State<ApiState>) -> Result<Json<DbtextResponse>, ApiError> {
    let content = uacreg_content(state.config.as_ref()).await?;
    Ok(Json(DbtextResponse { content }))
}
