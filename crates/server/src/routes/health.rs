//! Liveness check for load balancers and the frontend.

use axum::{Router, extract::State, response::Json as ResponseJson, routing::get};
use deployment::Deployment;
use serde::Serialize;
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::DeploymentImpl;

#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    /// Whether chat and LLM recipe generation are configured.
    pub ai_available: bool,
}

/// GET /api/health
pub async fn health_check(
    State(deployment): State<DeploymentImpl>,
) -> ResponseJson<ApiResponse<HealthStatus>> {
    ResponseJson(ApiResponse::success(HealthStatus {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        ai_available: deployment.chat().is_available(),
    }))
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new().route("/health", get(health_check))
}
