//! Routes for the recipe feed, uploads and likes.

use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{get, post},
};
use axum_extra::extract::WithRejection;
use deployment::Deployment;
use serde::Deserialize;
use services::services::{
    recipes::{LikeResult, ListParams, RecipePage, RecipeView},
    validation::RecipeUploadForm,
};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    DeploymentImpl,
    error::ApiError,
    extract::{Authenticated, FormData},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRecipesQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub user_id: Option<String>,
    pub search: Option<String>,
}

/// GET /api/recipes
pub async fn list_recipes(
    State(deployment): State<DeploymentImpl>,
    WithRejection(Query(query), _): WithRejection<Query<ListRecipesQuery>, ApiError>,
) -> Result<ResponseJson<ApiResponse<RecipePage>>, ApiError> {
    let page = deployment
        .recipes()
        .list_recipes(ListParams {
            limit: query.limit,
            offset: query.offset,
            user_id: query.user_id,
            search: query.search,
        })
        .await?;
    Ok(ResponseJson(ApiResponse::success(page)))
}

/// POST /api/recipes
/// Direct upload: every field including the final recipe text comes from the client.
pub async fn upload_recipe(
    State(deployment): State<DeploymentImpl>,
    Authenticated(user): Authenticated,
    mut form: FormData,
) -> Result<(StatusCode, ResponseJson<ApiResponse<RecipeView>>), ApiError> {
    let form = RecipeUploadForm {
        recipe_name: form.text("recipeName"),
        brief_ingredients: form.text("briefIngredients"),
        full_recipe: form.text("fullRecipe"),
        ingredients: form.text("ingredients"),
        recipe_image: form.take_file("recipeImage"),
    };
    let recipe = deployment.recipes().upload_recipe(&user, form).await?;
    Ok((
        StatusCode::CREATED,
        ResponseJson(ApiResponse::success_with_message(
            recipe,
            "Recipe uploaded successfully",
        )),
    ))
}

/// GET /api/recipes/{id}
pub async fn get_recipe(
    State(deployment): State<DeploymentImpl>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<ResponseJson<ApiResponse<RecipeView>>, ApiError> {
    let recipe = deployment.recipes().get_recipe(id).await?;
    Ok(ResponseJson(ApiResponse::success(recipe)))
}

/// DELETE /api/recipes/{id}
pub async fn delete_recipe(
    State(deployment): State<DeploymentImpl>,
    Authenticated(user): Authenticated,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    deployment.recipes().delete_recipe(id, &user).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

/// POST /api/recipes/{id}/like
pub async fn like_recipe(
    State(deployment): State<DeploymentImpl>,
    Authenticated(user): Authenticated,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<ResponseJson<ApiResponse<LikeResult>>, ApiError> {
    let result = deployment.recipes().like(id, &user).await?;
    Ok(ResponseJson(ApiResponse::success(result)))
}

/// DELETE /api/recipes/{id}/like
pub async fn unlike_recipe(
    State(deployment): State<DeploymentImpl>,
    Authenticated(user): Authenticated,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<ResponseJson<ApiResponse<LikeResult>>, ApiError> {
    let result = deployment.recipes().unlike(id, &user).await?;
    Ok(ResponseJson(ApiResponse::success(result)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/recipes", get(list_recipes).post(upload_recipe))
        .route("/recipes/{id}", get(get_recipe).delete(delete_recipe))
        .route("/recipes/{id}/like", post(like_recipe).delete(unlike_recipe))
}
