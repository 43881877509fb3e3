//! Routes for recipe comments.

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::get,
};
use axum_extra::extract::WithRejection;
use deployment::Deployment;
use services::services::{recipes::CommentView, validation::CommentForm};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    DeploymentImpl,
    error::ApiError,
    extract::{Authenticated, FormData},
};

/// GET /api/recipes/{id}/comments
pub async fn list_comments(
    State(deployment): State<DeploymentImpl>,
    WithRejection(Path(recipe_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<ResponseJson<ApiResponse<Vec<CommentView>>>, ApiError> {
    let comments = deployment.recipes().list_comments(recipe_id).await?;
    Ok(ResponseJson(ApiResponse::success(comments)))
}

/// POST /api/recipes/{id}/comments
pub async fn add_comment(
    State(deployment): State<DeploymentImpl>,
    Authenticated(user): Authenticated,
    WithRejection(Path(recipe_id), _): WithRejection<Path<Uuid>, ApiError>,
    mut form: FormData,
) -> Result<(StatusCode, ResponseJson<ApiResponse<CommentView>>), ApiError> {
    let form = CommentForm {
        text: form.text("text"),
        image: form.take_file("image"),
    };
    let comment = deployment.recipes().add_comment(&user, recipe_id, form).await?;
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(comment))))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().route(
        "/recipes/{id}/comments",
        get(list_comments).post(add_comment),
    )
}
