use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteExecutor, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::store_product::StoreProduct;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "draft_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DraftStatus {
    #[default]
    Draft,
}

/// Ingredient the generator pulled out of the free-text description.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedIngredient {
    pub id: String,
    pub name: String,
    pub quantity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_product: Option<StoreProduct>,
}

/// First half of the generate/submit flow. Expires after `expires_at`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct RecipeDraft {
    pub id: Uuid,
    pub user_id: String,
    pub user_name: String,
    pub recipe_name: String,
    pub brief_description: String,
    pub generated_recipe: String,
    #[sqlx(json)]
    pub extracted_ingredients: Vec<ExtractedIngredient>,
    pub image_key: String,
    pub status: DraftStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateRecipeDraft {
    pub user_id: String,
    pub user_name: String,
    pub recipe_name: String,
    pub brief_description: String,
    pub generated_recipe: String,
    pub extracted_ingredients: Vec<ExtractedIngredient>,
    pub image_key: String,
    pub expires_at: DateTime<Utc>,
}

impl RecipeDraft {
    pub async fn create(
        pool: &SqlitePool,
        id: Uuid,
        data: &CreateRecipeDraft,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, RecipeDraft>(
            r#"INSERT INTO recipe_drafts (id, user_id, user_name, recipe_name, brief_description, generated_recipe, extracted_ingredients, image_key, status, created_at, expires_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
               RETURNING *"#,
        )
        .bind(id)
        .bind(&data.user_id)
        .bind(&data.user_name)
        .bind(&data.recipe_name)
        .bind(&data.brief_description)
        .bind(&data.generated_recipe)
        .bind(sqlx::types::Json(&data.extracted_ingredients))
        .bind(&data.image_key)
        .bind(DraftStatus::Draft)
        .bind(Utc::now())
        .bind(data.expires_at)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, RecipeDraft>("SELECT * FROM recipe_drafts WHERE id = ?1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Like [`Self::find_by_id`] but treats drafts past `expires_at` as absent.
    pub async fn find_active_by_id(
        pool: &SqlitePool,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, RecipeDraft>(
            "SELECT * FROM recipe_drafts WHERE id = ?1 AND julianday(expires_at) > julianday(?2)",
        )
        .bind(id)
        .bind(now)
        .fetch_optional(pool)
        .await
    }

    /// Delete the draft if it is still active at `now` and owned by `user_id`,
    /// returning the removed row. At most one caller can claim a given draft.
    pub async fn claim<'e, E>(
        executor: E,
        id: Uuid,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, RecipeDraft>(
            r#"DELETE FROM recipe_drafts
               WHERE id = ?1 AND user_id = ?2 AND julianday(expires_at) > julianday(?3)
               RETURNING *"#,
        )
        .bind(id)
        .bind(user_id)
        .bind(now)
        .fetch_optional(executor)
        .await
    }

    pub async fn find_expired(
        pool: &SqlitePool,
        now: DateTime<Utc>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, RecipeDraft>(
            "SELECT * FROM recipe_drafts WHERE julianday(expires_at) <= julianday(?1) ORDER BY expires_at ASC",
        )
        .bind(now)
        .fetch_all(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM recipe_drafts WHERE id = ?1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
