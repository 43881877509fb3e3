use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteExecutor, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "difficulty", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

/// One line of a recipe's ingredient list, optionally linked to a store product.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
pub struct RecipeIngredient {
    pub name: String,
    pub quantity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_product_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_product_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_product_price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_product_image_url: Option<String>,
}

impl RecipeIngredient {
    pub fn new(name: impl Into<String>, quantity: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quantity: quantity.into(),
            store_product_id: None,
            store_product_name: None,
            store_product_price: None,
            store_product_image_url: None,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: Uuid,
    pub user_id: String, // identity provider uid of the author
    pub user_name: String,
    pub recipe_name: String,
    pub brief_ingredients: String,
    pub full_recipe: String,
    #[sqlx(json)]
    pub ingredients: Vec<RecipeIngredient>,
    pub image_key: String, // object store key, never a URL
    pub likes: i64,
    #[sqlx(json)]
    pub tags: Vec<String>,
    pub difficulty: Difficulty,
    pub original_draft_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateRecipe {
    pub user_id: String,
    pub user_name: String,
    pub recipe_name: String,
    pub brief_ingredients: String,
    pub full_recipe: String,
    pub ingredients: Vec<RecipeIngredient>,
    pub image_key: String,
    pub tags: Vec<String>,
    pub difficulty: Difficulty,
    pub original_draft_id: Option<Uuid>,
}

/// Filters and paging for the community feed.
#[derive(Debug, Clone, Default)]
pub struct RecipeQuery {
    pub user_id: Option<String>,
    pub search: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl RecipeQuery {
    fn search_pattern(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", escape_like(&s.to_lowercase())))
    }
}

/// Text matched by feed search. Lowercased here rather than with SQLite
/// `lower()`, which only folds ASCII.
fn search_text(recipe_name: &str, brief_ingredients: &str) -> String {
    format!("{recipe_name}\n{brief_ingredients}").to_lowercase()
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

const FEED_FILTER: &str = r#"(?1 IS NULL OR user_id = ?1)
  AND (?2 IS NULL OR search_text LIKE ?2 ESCAPE '\')"#;

impl Recipe {
    pub async fn create<'e, E>(executor: E, id: Uuid, data: &CreateRecipe) -> Result<Self, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let now = Utc::now();
        sqlx::query_as::<_, Recipe>(
            r#"INSERT INTO recipes (id, user_id, user_name, recipe_name, brief_ingredients, full_recipe, ingredients, image_key, likes, tags, difficulty, original_draft_id, search_text, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9, ?10, ?11, ?12, ?13, ?13)
               RETURNING *"#,
        )
        .bind(id)
        .bind(&data.user_id)
        .bind(&data.user_name)
        .bind(&data.recipe_name)
        .bind(&data.brief_ingredients)
        .bind(&data.full_recipe)
        .bind(sqlx::types::Json(&data.ingredients))
        .bind(&data.image_key)
        .bind(sqlx::types::Json(&data.tags))
        .bind(data.difficulty)
        .bind(data.original_draft_id)
        .bind(search_text(&data.recipe_name, &data.brief_ingredients))
        .bind(now)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Recipe>("SELECT * FROM recipes WHERE id = ?1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Newest first, ties broken by insertion order.
    pub async fn list(pool: &SqlitePool, query: &RecipeQuery) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT * FROM recipes WHERE {FEED_FILTER} ORDER BY created_at DESC, rowid DESC LIMIT ?3 OFFSET ?4"
        );
        sqlx::query_as::<_, Recipe>(&sql)
            .bind(query.user_id.as_deref())
            .bind(query.search_pattern())
            .bind(query.limit)
            .bind(query.offset)
            .fetch_all(pool)
            .await
    }

    pub async fn count(pool: &SqlitePool, query: &RecipeQuery) -> Result<i64, sqlx::Error> {
        let sql = format!("SELECT COUNT(*) FROM recipes WHERE {FEED_FILTER}");
        sqlx::query_scalar::<_, i64>(&sql)
            .bind(query.user_id.as_deref())
            .bind(query.search_pattern())
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_user_id(
        pool: &SqlitePool,
        user_id: &str,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Recipe>(
            "SELECT * FROM recipes WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Recipe count and total likes received by `user_id`.
    pub async fn author_totals(pool: &SqlitePool, user_id: &str) -> Result<(i64, i64), sqlx::Error> {
        sqlx::query_as::<_, (i64, i64)>(
            "SELECT COUNT(*), COALESCE(SUM(likes), 0) FROM recipes WHERE user_id = ?1",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM recipes WHERE id = ?1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
