use std::{sync::Arc, time::Duration};

use db::models::{
    comment::{Comment, CreateComment},
    recipe::{CreateRecipe, Difficulty, Recipe, RecipeQuery},
    recipe_like::RecipeLike,
};
use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    identity::AuthUser,
    object_store::{ObjectStore, ObjectStoreError, keys},
    recipe_generator::GeneratorError,
    validation::{
        self, COMMENT_IMAGE, CommentForm, FieldError, RecipeUploadForm, ValidationErrors,
    },
};

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Error)]
pub enum RecipeServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Storage(#[from] ObjectStoreError),
    #[error(transparent)]
    Generation(#[from] GeneratorError),
    #[error("recipe not found")]
    NotFound,
    #[error("draft not found or expired")]
    DraftNotFound,
    #[error("draft belongs to another user")]
    DraftForbidden,
    #[error("only the author can do that")]
    Forbidden,
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("{}", .0.message)]
    MissingData(FieldError),
    #[error("invalid ingredients: {}", .0.message)]
    InvalidIngredients(FieldError),
}

/// A recipe plus a fetchable URL for its image.
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct RecipeView {
    #[serde(flatten)]
    pub recipe: Recipe,
    pub image_url: String,
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub has_more: bool,
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct RecipePage {
    pub recipes: Vec<RecipeView>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, TS)]
pub struct LikeResult {
    pub likes: i64,
}

/// Feed filters as received from the client; `None` means default.
#[derive(Debug, Clone, Default)]
pub struct ListParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub user_id: Option<String>,
    pub search: Option<String>,
}

impl ListParams {
    fn into_query(self) -> RecipeQuery {
        RecipeQuery {
            limit: self
                .limit
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
            offset: self.offset.unwrap_or(0).max(0),
            user_id: self.user_id.filter(|u| !u.trim().is_empty()),
            search: self.search,
        }
    }
}

/// Direct upload, feed, likes and comments.
#[derive(Clone)]
pub struct RecipeService {
    pool: SqlitePool,
    storage: Arc<dyn ObjectStore>,
    signed_url_ttl: Duration,
    max_image_bytes: usize,
}

impl RecipeService {
    pub fn new(
        pool: SqlitePool,
        storage: Arc<dyn ObjectStore>,
        signed_url_ttl: Duration,
        max_image_bytes: usize,
    ) -> Self {
        Self {
            pool,
            storage,
            signed_url_ttl,
            max_image_bytes,
        }
    }

    pub(crate) async fn view(&self, recipe: Recipe) -> Result<RecipeView, RecipeServiceError> {
        let image_url = self
            .storage
            .signed_url(&recipe.image_key, self.signed_url_ttl)
            .await?;
        Ok(RecipeView { recipe, image_url })
    }

    async fn views(&self, recipes: Vec<Recipe>) -> Result<Vec<RecipeView>, RecipeServiceError> {
        let mut views = Vec::with_capacity(recipes.len());
        for recipe in recipes {
            views.push(self.view(recipe).await?);
        }
        Ok(views)
    }

    /// Remove an object, logging instead of failing.
    pub(crate) async fn discard_object(storage: &dyn ObjectStore, key: &str) {
        if let Err(e) = storage.delete(key).await {
            warn!(key = %key, error = %e, "Failed to delete orphaned object");
        }
    }

    pub async fn upload_recipe(
        &self,
        user: &AuthUser,
        form: RecipeUploadForm,
    ) -> Result<RecipeView, RecipeServiceError> {
        let validated = validation::validate_upload(form, self.max_image_bytes).inspect_err(|e| {
            debug!(user_id = %user.uid, codes = ?e.codes(), "Rejected recipe upload");
        })?;

        let image_key = keys::recipe_image(&user.uid, &validated.recipe_image.file_name);
        self.storage
            .put(
                &image_key,
                validated.recipe_image.bytes.clone(),
                &validated.recipe_image.content_type,
            )
            .await?;

        let data = CreateRecipe {
            user_id: user.uid.clone(),
            user_name: user.display_name.clone(),
            recipe_name: validated.recipe_name,
            brief_ingredients: validated.brief_ingredients,
            full_recipe: validated.full_recipe,
            ingredients: validated.ingredients,
            image_key: image_key.clone(),
            tags: Vec::new(),
            difficulty: Difficulty::default(),
            original_draft_id: None,
        };

        let recipe = match Recipe::create(&self.pool, Uuid::new_v4(), &data).await {
            Ok(recipe) => recipe,
            Err(e) => {
                error!(user_id = %user.uid, error = %e, "Recipe insert failed, removing uploaded image");
                Self::discard_object(self.storage.as_ref(), &image_key).await;
                return Err(e.into());
            }
        };

        info!(recipe_id = %recipe.id, user_id = %user.uid, "Recipe uploaded");
        self.view(recipe).await
    }

    pub async fn list_recipes(&self, params: ListParams) -> Result<RecipePage, RecipeServiceError> {
        let query = params.into_query();
        let total = Recipe::count(&self.pool, &query).await?;
        let recipes = Recipe::list(&self.pool, &query).await?;
        let has_more = query.offset + (recipes.len() as i64) < total;

        Ok(RecipePage {
            recipes: self.views(recipes).await?,
            pagination: Pagination {
                total,
                limit: query.limit,
                offset: query.offset,
                has_more,
            },
        })
    }

    pub async fn get_recipe(&self, id: Uuid) -> Result<RecipeView, RecipeServiceError> {
        let recipe = self.find(id).await?;
        self.view(recipe).await
    }

    async fn find(&self, id: Uuid) -> Result<Recipe, RecipeServiceError> {
        Recipe::find_by_id(&self.pool, id)
            .await?
            .ok_or(RecipeServiceError::NotFound)
    }

    pub async fn like(&self, id: Uuid, user: &AuthUser) -> Result<LikeResult, RecipeServiceError> {
        self.find(id).await?;
        let likes = RecipeLike::like(&self.pool, id, &user.uid).await?;
        Ok(LikeResult { likes })
    }

    pub async fn unlike(&self, id: Uuid, user: &AuthUser) -> Result<LikeResult, RecipeServiceError> {
        self.find(id).await?;
        let likes = RecipeLike::unlike(&self.pool, id, &user.uid).await?;
        Ok(LikeResult { likes })
    }

    /// Delete a recipe owned by `user`, then its image and comment images.
    pub async fn delete_recipe(&self, id: Uuid, user: &AuthUser) -> Result<(), RecipeServiceError> {
        let recipe = self.find(id).await?;
        if recipe.user_id != user.uid {
            return Err(RecipeServiceError::Forbidden);
        }

        let comment_images = Comment::image_keys_for_recipe(&self.pool, id).await?;
        Recipe::delete(&self.pool, id).await?;

        Self::discard_object(self.storage.as_ref(), &recipe.image_key).await;
        for key in &comment_images {
            Self::discard_object(self.storage.as_ref(), key).await;
        }
        info!(recipe_id = %id, user_id = %user.uid, "Recipe deleted");
        Ok(())
    }

    pub async fn recipes_by_author(&self, user_id: &str) -> Result<Vec<RecipeView>, RecipeServiceError> {
        let recipes = Recipe::find_by_user_id(&self.pool, user_id).await?;
        self.views(recipes).await
    }

    pub async fn list_comments(&self, recipe_id: Uuid) -> Result<Vec<CommentView>, RecipeServiceError> {
        self.find(recipe_id).await?;
        let comments = Comment::find_by_recipe_id(&self.pool, recipe_id).await?;
        let mut views = Vec::with_capacity(comments.len());
        for comment in comments {
            views.push(self.comment_view(comment).await?);
        }
        Ok(views)
    }

    async fn comment_view(&self, comment: Comment) -> Result<CommentView, RecipeServiceError> {
        let image_url = match &comment.image_key {
            Some(key) => Some(self.storage.signed_url(key, self.signed_url_ttl).await?),
            None => None,
        };
        Ok(CommentView { comment, image_url })
    }

    pub async fn add_comment(
        &self,
        user: &AuthUser,
        recipe_id: Uuid,
        form: CommentForm,
    ) -> Result<CommentView, RecipeServiceError> {
        let mut errors = Vec::new();
        let text = validation::validate_comment(form.text.as_deref())
            .map_err(|e| errors.push(e))
            .ok();
        if let Some(image) = &form.image {
            if let Err(e) = validation::validate_image(Some(image), COMMENT_IMAGE, self.max_image_bytes) {
                errors.push(e);
            }
        }
        let Some(text) = text.filter(|_| errors.is_empty()) else {
            return Err(ValidationErrors(errors).into());
        };

        self.find(recipe_id).await?;

        let image_key = match form.image {
            Some(image) => {
                let key = keys::comment_image(recipe_id, &image.file_name);
                self.storage.put(&key, image.bytes, &image.content_type).await?;
                Some(key)
            }
            None => None,
        };

        let data = CreateComment {
            recipe_id,
            user_id: user.uid.clone(),
            user_name: user.display_name.clone(),
            text,
            image_key: image_key.clone(),
        };
        let comment = match Comment::create(&self.pool, Uuid::new_v4(), &data).await {
            Ok(comment) => comment,
            Err(e) => {
                if let Some(key) = &image_key {
                    Self::discard_object(self.storage.as_ref(), key).await;
                }
                return Err(e.into());
            }
        };

        info!(recipe_id = %recipe_id, comment_id = %comment.id, "Comment added");
        self.comment_view(comment).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use bytes::Bytes;
    use db::DBService;

    use super::*;
    use crate::services::{
        object_store::LocalObjectStore,
        validation::{ImageUpload, MAX_IMAGE_BYTES},
    };

    pub(crate) fn user(uid: &str) -> AuthUser {
        AuthUser {
            uid: uid.to_string(),
            display_name: format!("Chef {uid}"),
            email: None,
            name: None,
        }
    }

    pub(crate) fn png() -> ImageUpload {
        ImageUpload {
            file_name: "dish.png".to_string(),
            content_type: "image/png".to_string(),
            bytes: Bytes::from_static(b"\x89PNG fake"),
        }
    }

    pub(crate) async fn setup() -> (tempfile::TempDir, DBService, Arc<LocalObjectStore>, RecipeService) {
        let dir = tempfile::tempdir().unwrap();
        let db = DBService::new_in_memory().await.unwrap();
        let storage = Arc::new(LocalObjectStore::new(dir.path(), "http://localhost:3001"));
        let service = RecipeService::new(
            db.pool.clone(),
            storage.clone(),
            Duration::from_secs(60),
            MAX_IMAGE_BYTES,
        );
        (dir, db, storage, service)
    }

    fn form(name: &str) -> RecipeUploadForm {
        RecipeUploadForm {
            recipe_name: Some(name.to_string()),
            brief_ingredients: Some("flour, water, salt".to_string()),
            full_recipe: Some("Mix, knead, rest and bake until golden.".to_string()),
            ingredients: Some(r#"[{"name":"flour","quantity":"500 g"}]"#.to_string()),
            recipe_image: Some(png()),
        }
    }

    #[tokio::test]
    async fn upload_stores_image_and_row() {
        let (_dir, _db, storage, service) = setup().await;
        let view = service.upload_recipe(&user("u1"), form("Bread")).await.unwrap();

        assert_eq!(view.recipe.likes, 0);
        assert_eq!(view.recipe.user_name, "Chef u1");
        assert!(view.recipe.image_key.starts_with("recipeImages/u1/"));
        assert!(storage.exists(&view.recipe.image_key).await.unwrap());
        assert!(view.image_url.ends_with(&view.recipe.image_key));
    }

    #[tokio::test]
    async fn upload_removes_image_when_insert_fails() {
        let (_dir, db, storage, service) = setup().await;
        sqlx::query(
            "CREATE TRIGGER reject_recipes BEFORE INSERT ON recipes BEGIN SELECT RAISE(FAIL, 'rejected'); END",
        )
        .execute(&db.pool)
        .await
        .unwrap();

        let err = service.upload_recipe(&user("u1"), form("Bread")).await.unwrap_err();
        assert!(matches!(err, RecipeServiceError::Database(_)));

        let mut entries = Vec::new();
        let user_dir = storage.root().join("recipeImages/u1");
        if let Ok(mut dir) = tokio::fs::read_dir(&user_dir).await {
            while let Some(entry) = dir.next_entry().await.unwrap() {
                entries.push(entry.path());
            }
        }
        assert!(entries.is_empty(), "left behind {entries:?}");
    }

    #[tokio::test]
    async fn invalid_upload_stores_nothing() {
        let (dir, _db, _storage, service) = setup().await;
        let mut bad = form("Br");
        bad.recipe_image = None;
        let err = service.upload_recipe(&user("u1"), bad).await.unwrap_err();
        let RecipeServiceError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(errors.codes(), vec!["RECIPE_NAME_TOO_SHORT", "INVALID_RECIPE_IMAGE"]);
        assert!(!dir.path().join("recipeImages").exists());
    }

    #[tokio::test]
    async fn listing_pages_newest_first() {
        let (_dir, _db, _storage, service) = setup().await;
        for name in ["First", "Second", "Third"] {
            service.upload_recipe(&user("u1"), form(name)).await.unwrap();
        }
        service.upload_recipe(&user("u2"), form("Other cook")).await.unwrap();

        let page = service
            .list_recipes(ListParams {
                limit: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();
        let names: Vec<_> = page.recipes.iter().map(|r| r.recipe.recipe_name.as_str()).collect();
        assert_eq!(names, ["Other cook", "Third"]);
        assert_eq!(
            page.pagination,
            Pagination {
                total: 4,
                limit: 2,
                offset: 0,
                has_more: true
            }
        );

        let last = service
            .list_recipes(ListParams {
                limit: Some(2),
                offset: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(!last.pagination.has_more);
        assert_eq!(last.recipes.len(), 2);

        let mine = service
            .list_recipes(ListParams {
                user_id: Some("u2".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(mine.pagination.total, 1);

        let searched = service
            .list_recipes(ListParams {
                search: Some("SECOND".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(searched.recipes[0].recipe.recipe_name, "Second");
    }

    #[tokio::test]
    async fn limit_is_clamped() {
        let (_dir, _db, _storage, service) = setup().await;
        let page = service
            .list_recipes(ListParams {
                limit: Some(1000),
                offset: Some(-5),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.pagination.limit, MAX_PAGE_SIZE);
        assert_eq!(page.pagination.offset, 0);

        let page = service
            .list_recipes(ListParams {
                limit: Some(0),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.pagination.limit, 1);
    }

    #[tokio::test]
    async fn likes_are_idempotent_per_user() {
        let (_dir, _db, _storage, service) = setup().await;
        let id = service.upload_recipe(&user("u1"), form("Bread")).await.unwrap().recipe.id;

        assert_eq!(service.like(id, &user("u2")).await.unwrap().likes, 1);
        assert_eq!(service.like(id, &user("u2")).await.unwrap().likes, 1);
        assert_eq!(service.like(id, &user("u3")).await.unwrap().likes, 2);
        assert_eq!(service.unlike(id, &user("u2")).await.unwrap().likes, 1);
        assert_eq!(service.unlike(id, &user("u2")).await.unwrap().likes, 1);
        assert_eq!(service.unlike(id, &user("u3")).await.unwrap().likes, 0);
        assert_eq!(service.unlike(id, &user("u3")).await.unwrap().likes, 0);

        assert!(matches!(
            service.like(Uuid::new_v4(), &user("u2")).await,
            Err(RecipeServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn only_the_author_can_delete() {
        let (_dir, _db, storage, service) = setup().await;
        let view = service.upload_recipe(&user("u1"), form("Bread")).await.unwrap();
        let id = view.recipe.id;

        assert!(matches!(
            service.delete_recipe(id, &user("u2")).await,
            Err(RecipeServiceError::Forbidden)
        ));

        service.delete_recipe(id, &user("u1")).await.unwrap();
        assert!(!storage.exists(&view.recipe.image_key).await.unwrap());
        assert!(matches!(service.get_recipe(id).await, Err(RecipeServiceError::NotFound)));
    }

    #[tokio::test]
    async fn comments_with_and_without_images() {
        let (_dir, _db, storage, service) = setup().await;
        let id = service.upload_recipe(&user("u1"), form("Bread")).await.unwrap().recipe.id;

        service
            .add_comment(
                &user("u2"),
                id,
                CommentForm {
                    text: Some("Lovely crust".to_string()),
                    image: None,
                },
            )
            .await
            .unwrap();
        let with_image = service
            .add_comment(
                &user("u3"),
                id,
                CommentForm {
                    text: Some(" Made it! ".to_string()),
                    image: Some(png()),
                },
            )
            .await
            .unwrap();
        assert_eq!(with_image.comment.text, "Made it!");
        let key = with_image.comment.image_key.clone().unwrap();
        assert!(storage.exists(&key).await.unwrap());

        let comments = service.list_comments(id).await.unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].comment.user_id, "u3");
        assert!(comments[0].image_url.is_some());
        assert!(comments[1].image_url.is_none());

        let err = service
            .add_comment(&user("u2"), id, CommentForm::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RecipeServiceError::Validation(_)));

        service.delete_recipe(id, &user("u1")).await.unwrap();
        assert!(!storage.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn comment_on_missing_recipe() {
        let (_dir, _db, _storage, service) = setup().await;
        let err = service
            .add_comment(
                &user("u2"),
                Uuid::new_v4(),
                CommentForm {
                    text: Some("hello".to_string()),
                    image: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RecipeServiceError::NotFound));
    }
}
