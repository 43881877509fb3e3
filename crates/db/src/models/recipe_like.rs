use sqlx::SqlitePool;
use uuid::Uuid;

/// Per-user like marker. `recipes.likes` is kept equal to the number of rows here.
pub struct RecipeLike;

impl RecipeLike {
    /// Record a like from `user_id`. Liking twice is a no-op. Returns the new count.
    pub async fn like(pool: &SqlitePool, recipe_id: Uuid, user_id: &str) -> Result<i64, sqlx::Error> {
        let mut tx = pool.begin().await?;
        sqlx::query(
            "INSERT OR IGNORE INTO recipe_likes (recipe_id, user_id, created_at) VALUES (?1, ?2, ?3)",
        )
        .bind(recipe_id)
        .bind(user_id)
        .bind(chrono::Utc::now())
        .execute(&mut *tx)
        .await?;
        let likes = Self::sync_count(&mut tx, recipe_id).await?;
        tx.commit().await?;
        Ok(likes)
    }

    /// Remove a like from `user_id`. Unliking without a like is a no-op.
    pub async fn unlike(
        pool: &SqlitePool,
        recipe_id: Uuid,
        user_id: &str,
    ) -> Result<i64, sqlx::Error> {
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM recipe_likes WHERE recipe_id = ?1 AND user_id = ?2")
            .bind(recipe_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        let likes = Self::sync_count(&mut tx, recipe_id).await?;
        tx.commit().await?;
        Ok(likes)
    }

    async fn sync_count(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        recipe_id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"UPDATE recipes
               SET likes = (SELECT COUNT(*) FROM recipe_likes WHERE recipe_id = ?1),
                   updated_at = ?2
               WHERE id = ?1
               RETURNING likes"#,
        )
        .bind(recipe_id)
        .bind(chrono::Utc::now())
        .fetch_one(&mut **tx)
        .await
    }
}
