//! Routes for the two-step draft flow (generate, then submit).

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::post,
};
use axum_extra::extract::WithRejection;
use deployment::Deployment;
use services::services::{
    drafts::DraftView,
    recipes::RecipeView,
    validation::{DraftGenerateForm, DraftSubmitForm},
};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    DeploymentImpl,
    error::ApiError,
    extract::{Authenticated, FormData},
};

/// POST /api/drafts
/// Generate a recipe and ingredient list for review before submitting.
pub async fn generate_draft(
    State(deployment): State<DeploymentImpl>,
    Authenticated(user): Authenticated,
    mut form: FormData,
) -> Result<ResponseJson<ApiResponse<DraftView>>, ApiError> {
    let form = DraftGenerateForm {
        name: form.text("name"),
        brief_description: form.text("briefDescription"),
        recipe_image: form.take_file("recipeImage"),
    };
    let draft = deployment.drafts().generate_draft(&user, form).await?;
    Ok(ResponseJson(ApiResponse::success(draft)))
}

/// POST /api/drafts/{id}/submit
pub async fn submit_draft(
    State(deployment): State<DeploymentImpl>,
    Authenticated(user): Authenticated,
    WithRejection(Path(draft_id), _): WithRejection<Path<Uuid>, ApiError>,
    form: FormData,
) -> Result<(StatusCode, ResponseJson<ApiResponse<RecipeView>>), ApiError> {
    let form = DraftSubmitForm {
        recipe_name: form.text("recipeName"),
        brief_ingredients: form.text("briefIngredients"),
        full_recipe: form.text("fullRecipe"),
        ingredients: form.text("ingredients"),
    };
    let recipe = deployment.drafts().submit_draft(&user, draft_id, form).await?;
    Ok((
        StatusCode::CREATED,
        ResponseJson(ApiResponse::success_with_message(
            recipe,
            "Recipe uploaded successfully",
        )),
    ))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/drafts", post(generate_draft))
        .route("/drafts/{id}/submit", post(submit_draft))
}
