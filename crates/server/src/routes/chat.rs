//! Routes for the cooking assistant chat.

use axum::{Router, extract::State, response::Json as ResponseJson, routing::post};
use axum_extra::extract::WithRejection;
use deployment::Deployment;
use serde::Serialize;
use services::services::chat::ChatRequest;
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Serialize, TS)]
pub struct ChatReply {
    pub reply: String,
}

/// POST /api/chat
pub async fn chat(
    State(deployment): State<DeploymentImpl>,
    WithRejection(axum::Json(payload), _): WithRejection<axum::Json<ChatRequest>, ApiError>,
) -> Result<ResponseJson<ApiResponse<ChatReply>>, ApiError> {
    let reply = deployment.chat().chat(&payload.messages).await?;
    Ok(ResponseJson(ApiResponse::success(ChatReply { reply })))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().route("/chat", post(chat))
}
