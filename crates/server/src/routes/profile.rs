//! Routes for the caller's profile, picture and points.

use axum::{
    Router,
    extract::State,
    response::Json as ResponseJson,
    routing::{get, post},
};
use axum_extra::extract::WithRejection;
use deployment::Deployment;
use services::services::{
    profile::{ProfileStats, ProfileView, UpdateProfile},
    recipes::RecipeView,
};
use utils::response::ApiResponse;

use crate::{
    DeploymentImpl,
    error::ApiError,
    extract::{Authenticated, FormData},
};

/// GET /api/profile
pub async fn get_profile(
    State(deployment): State<DeploymentImpl>,
    Authenticated(user): Authenticated,
) -> Result<ResponseJson<ApiResponse<ProfileView>>, ApiError> {
    let profile = deployment.profiles().get_profile(&user).await?;
    Ok(ResponseJson(ApiResponse::success(profile)))
}

/// PATCH /api/profile
pub async fn update_profile(
    State(deployment): State<DeploymentImpl>,
    Authenticated(user): Authenticated,
    WithRejection(axum::Json(payload), _): WithRejection<axum::Json<UpdateProfile>, ApiError>,
) -> Result<ResponseJson<ApiResponse<ProfileView>>, ApiError> {
    let profile = deployment.profiles().update_profile(&user, payload).await?;
    Ok(ResponseJson(ApiResponse::success(profile)))
}

/// POST /api/profile/picture
pub async fn upload_profile_picture(
    State(deployment): State<DeploymentImpl>,
    Authenticated(user): Authenticated,
    mut form: FormData,
) -> Result<ResponseJson<ApiResponse<ProfileView>>, ApiError> {
    let image = form.take_file("profilePicture");
    let profile = deployment
        .profiles()
        .upload_profile_picture(&user, image)
        .await?;
    Ok(ResponseJson(ApiResponse::success_with_message(
        profile,
        "Profile picture updated successfully",
    )))
}

/// GET /api/profile/stats
pub async fn profile_stats(
    State(deployment): State<DeploymentImpl>,
    Authenticated(user): Authenticated,
) -> Result<ResponseJson<ApiResponse<ProfileStats>>, ApiError> {
    let stats = deployment.profiles().profile_stats(&user).await?;
    Ok(ResponseJson(ApiResponse::success(stats)))
}

/// GET /api/profile/recipes
pub async fn profile_recipes(
    State(deployment): State<DeploymentImpl>,
    Authenticated(user): Authenticated,
) -> Result<ResponseJson<ApiResponse<Vec<RecipeView>>>, ApiError> {
    let recipes = deployment.profiles().user_recipes(&user).await?;
    Ok(ResponseJson(ApiResponse::success(recipes)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/profile", get(get_profile).patch(update_profile))
        .route("/profile/picture", post(upload_profile_picture))
        .route("/profile/stats", get(profile_stats))
        .route("/profile/recipes", get(profile_recipes))
}
