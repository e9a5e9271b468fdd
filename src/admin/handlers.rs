use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::error::PoolError;
use crate::pool::{DynamicProxyPool, EndpointSnapshot};

#[derive(Clone, Debug)]
pub struct AdminState {
    pub pool: Arc<DynamicProxyPool>,
    pub api_key: Arc<str>,
}

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub endpoints: usize,
    pub eligible_endpoints: usize,
    pub outstanding_leases: usize,
    pub sticky_bindings: usize,
}

#[derive(Serialize)]
pub struct DrainResult {
    pub endpoint: String,
    pub expired_leases: usize,
}

/// JSON error body with a status mapped from [`PoolError`].
pub struct AdminError(PoolError);

impl From<PoolError> for AdminError {
    fn from(e: PoolError) -> Self {
        Self(e)
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            PoolError::NotFound(_) => StatusCode::NOT_FOUND,
            PoolError::InUse { .. } | PoolError::DuplicateId(_) => StatusCode::CONFLICT,
            PoolError::InvalidEndpoint(_) => StatusCode::BAD_REQUEST,
            PoolError::NoEligibleEndpoint | PoolError::PoolExhausted => StatusCode::SERVICE_UNAVAILABLE,
        };
        let body = serde_json::json!({
            "error": self.0.kind(),
            "message": self.0.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let endpoints = state.pool.registry().list();
    let eligible = endpoints.iter().filter(|e| state.pool.is_eligible(&e.id)).count();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: if eligible > 0 { "operational" } else { "degraded" },
        endpoints: endpoints.len(),
        eligible_endpoints: eligible,
        outstanding_leases: state.pool.outstanding_leases(),
        sticky_bindings: state.pool.sticky_bindings(),
    })
}

pub async fn get_endpoints(State(state): State<AdminState>) -> Json<Vec<EndpointSnapshot>> {
    Json(state.pool.snapshot())
}

pub async fn deregister_endpoint(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AdminError> {
    state.pool.deregister_endpoint(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn drain_endpoint(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<Json<DrainResult>, AdminError> {
    let expired_leases = state.pool.force_expire(&id)?;
    Ok(Json(DrainResult {
        endpoint: id,
        expired_leases,
    }))
}
