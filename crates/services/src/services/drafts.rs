//! Two-step recipe creation: generate a draft, then submit it as a recipe.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use db::models::{
    recipe::{CreateRecipe, Difficulty, Recipe},
    recipe_draft::{CreateRecipeDraft, ExtractedIngredient, RecipeDraft},
    store_product::StoreProduct,
};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{error, info, warn};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    identity::AuthUser,
    object_store::{ObjectStore, ObjectStoreError, keys},
    recipe_generator::RecipeGenerator,
    recipes::{RecipeService, RecipeServiceError, RecipeView},
    validation::{self, DraftGenerateForm, DraftSubmitForm, ValidationErrors},
};

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct DraftView {
    pub draft_id: Uuid,
    pub recipe_name: String,
    pub brief_description: String,
    pub generated_recipe: String,
    pub extracted_ingredients: Vec<ExtractedIngredient>,
    pub image_url: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct DraftService {
    pool: SqlitePool,
    storage: Arc<dyn ObjectStore>,
    generator: Arc<dyn RecipeGenerator>,
    recipes: RecipeService,
    draft_ttl: chrono::Duration,
    signed_url_ttl: Duration,
    max_image_bytes: usize,
}

impl DraftService {
    pub fn new(
        pool: SqlitePool,
        storage: Arc<dyn ObjectStore>,
        generator: Arc<dyn RecipeGenerator>,
        draft_ttl: chrono::Duration,
        signed_url_ttl: Duration,
        max_image_bytes: usize,
    ) -> Self {
        let recipes = RecipeService::new(
            pool.clone(),
            storage.clone(),
            signed_url_ttl,
            max_image_bytes,
        );
        Self {
            pool,
            storage,
            generator,
            recipes,
            draft_ttl,
            signed_url_ttl,
            max_image_bytes,
        }
    }

    /// Generate a recipe from a name and free-text ingredients and park it as a draft.
    pub async fn generate_draft(
        &self,
        user: &AuthUser,
        form: DraftGenerateForm,
    ) -> Result<DraftView, RecipeServiceError> {
        let request = validation::validate_draft_request(form, self.max_image_bytes)?;

        let catalog = StoreProduct::find_all(&self.pool).await?;
        let generated = self
            .generator
            .generate(&request.name, &request.brief_description, &catalog)
            .await?;

        let draft_id = Uuid::new_v4();
        let image_key = keys::draft_image(&user.uid, draft_id, &request.recipe_image.file_name);
        self.storage
            .put(
                &image_key,
                request.recipe_image.bytes.clone(),
                &request.recipe_image.content_type,
            )
            .await?;

        let data = CreateRecipeDraft {
            user_id: user.uid.clone(),
            user_name: user.display_name.clone(),
            recipe_name: request.name,
            brief_description: request.brief_description,
            generated_recipe: generated.full_recipe,
            extracted_ingredients: generated.ingredients,
            image_key: image_key.clone(),
            expires_at: Utc::now() + self.draft_ttl,
        };
        let draft = match RecipeDraft::create(&self.pool, draft_id, &data).await {
            Ok(draft) => draft,
            Err(e) => {
                error!(draft_id = %draft_id, error = %e, "Draft insert failed, removing uploaded image");
                RecipeService::discard_object(self.storage.as_ref(), &image_key).await;
                return Err(e.into());
            }
        };

        info!(
            draft_id = %draft.id,
            user_id = %user.uid,
            ingredients = draft.extracted_ingredients.len(),
            "Draft generated"
        );

        let image_url = self
            .storage
            .signed_url(&draft.image_key, self.signed_url_ttl)
            .await?;
        Ok(DraftView {
            draft_id: draft.id,
            recipe_name: draft.recipe_name,
            brief_description: draft.brief_description,
            generated_recipe: draft.generated_recipe,
            extracted_ingredients: draft.extracted_ingredients,
            image_url,
            expires_at: draft.expires_at,
        })
    }

    /// Promote a draft owned by `user` to a permanent recipe.
    pub async fn submit_draft(
        &self,
        user: &AuthUser,
        draft_id: Uuid,
        form: DraftSubmitForm,
    ) -> Result<RecipeView, RecipeServiceError> {
        let missing: Vec<&'static str> = [
            ("recipeName", &form.recipe_name),
            ("briefIngredients", &form.brief_ingredients),
            ("fullRecipe", &form.full_recipe),
            ("ingredients", &form.ingredients),
        ]
        .into_iter()
        .filter(|(_, value)| value.as_deref().is_none_or(|v| v.trim().is_empty()))
        .map(|(field, _)| field)
        .collect();
        if !missing.is_empty() {
            return Err(RecipeServiceError::MissingFields(missing));
        }

        let draft = RecipeDraft::find_active_by_id(&self.pool, draft_id, Utc::now())
            .await?
            .ok_or(RecipeServiceError::DraftNotFound)?;
        if draft.user_id != user.uid {
            warn!(draft_id = %draft_id, user_id = %user.uid, "Rejected submit of another user's draft");
            return Err(RecipeServiceError::DraftForbidden);
        }

        let ingredients = validation::parse_ingredients(form.ingredients.as_deref())
            .map_err(RecipeServiceError::InvalidIngredients)?;
        let mut errors = Vec::new();
        let recipe_name = validation::validate_recipe_name(form.recipe_name.as_deref())
            .map_err(|e| errors.push(e))
            .ok();
        let brief_ingredients =
            validation::validate_brief_ingredients(form.brief_ingredients.as_deref())
                .map_err(|e| errors.push(e))
                .ok();
        let full_recipe = validation::validate_full_recipe(form.full_recipe.as_deref())
            .map_err(|e| errors.push(e))
            .ok();
        let (Some(recipe_name), Some(brief_ingredients), Some(full_recipe)) =
            (recipe_name, brief_ingredients, full_recipe)
        else {
            return Err(ValidationErrors(errors).into());
        };

        let image_key = keys::final_recipe_image(&user.uid, &recipe_name, &draft.image_key);
        // the draft image disappears once a concurrent submit has claimed the draft
        match self.storage.copy(&draft.image_key, &image_key).await {
            Ok(()) => {}
            Err(ObjectStoreError::NotFound(_)) => return Err(RecipeServiceError::DraftNotFound),
            Err(e) => return Err(e.into()),
        }

        let data = CreateRecipe {
            user_id: user.uid.clone(),
            user_name: user.display_name.clone(),
            recipe_name,
            brief_ingredients,
            full_recipe,
            ingredients,
            image_key: image_key.clone(),
            tags: Vec::new(),
            difficulty: Difficulty::default(),
            original_draft_id: Some(draft.id),
        };
        let recipe = match self.promote(user, draft_id, &data).await {
            Ok(recipe) => recipe,
            Err(e) => {
                warn!(draft_id = %draft_id, error = %e, "Draft submit failed, removing copied image");
                RecipeService::discard_object(self.storage.as_ref(), &image_key).await;
                return Err(e);
            }
        };
        RecipeService::discard_object(self.storage.as_ref(), &draft.image_key).await;

        info!(recipe_id = %recipe.id, draft_id = %draft_id, user_id = %user.uid, "Draft submitted");
        self.recipes.view(recipe).await
    }

    /// Claim the draft and insert the recipe in one transaction.
    async fn promote(
        &self,
        user: &AuthUser,
        draft_id: Uuid,
        data: &CreateRecipe,
    ) -> Result<Recipe, RecipeServiceError> {
        let mut tx = self.pool.begin().await?;
        if RecipeDraft::claim(&mut *tx, draft_id, &user.uid, Utc::now())
            .await?
            .is_none()
        {
            return Err(RecipeServiceError::DraftNotFound);
        }
        let recipe = Recipe::create(&mut *tx, Uuid::new_v4(), data).await?;
        tx.commit().await?;
        Ok(recipe)
    }

    /// Delete every draft expired at `now` with its image. Returns how many were removed.
    pub async fn cleanup_expired_drafts(&self, now: DateTime<Utc>) -> Result<usize, sqlx::Error> {
        let expired = RecipeDraft::find_expired(&self.pool, now).await?;
        let mut removed = 0;
        for draft in expired {
            RecipeDraft::delete(&self.pool, draft.id).await?;
            RecipeService::discard_object(self.storage.as_ref(), &draft.image_key).await;
            removed += 1;
        }
        if removed > 0 {
            info!(removed, "Removed expired drafts");
        }
        Ok(removed)
    }
}
