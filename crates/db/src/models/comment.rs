use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub recipe_id: Uuid,
    pub user_id: String,
    pub user_name: String,
    pub text: String,
    pub image_key: Option<String>,
    pub likes: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateComment {
    pub recipe_id: Uuid,
    pub user_id: String,
    pub user_name: String,
    pub text: String,
    pub image_key: Option<String>,
}

impl Comment {
    pub async fn create(
        pool: &SqlitePool,
        id: Uuid,
        data: &CreateComment,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Comment>(
            r#"INSERT INTO comments (id, recipe_id, user_id, user_name, text, image_key, likes, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)
               RETURNING *"#,
        )
        .bind(id)
        .bind(data.recipe_id)
        .bind(&data.user_id)
        .bind(&data.user_name)
        .bind(&data.text)
        .bind(data.image_key.as_deref())
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_recipe_id(
        pool: &SqlitePool,
        recipe_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Comment>(
            "SELECT * FROM comments WHERE recipe_id = ?1 ORDER BY created_at DESC, rowid DESC",
        )
        .bind(recipe_id)
        .fetch_all(pool)
        .await
    }

    /// Image keys of every comment on `recipe_id`, for cleanup before the cascade delete.
    pub async fn image_keys_for_recipe(
        pool: &SqlitePool,
        recipe_id: Uuid,
    ) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            "SELECT image_key FROM comments WHERE recipe_id = ?1 AND image_key IS NOT NULL",
        )
        .bind(recipe_id)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        DBService,
        models::recipe::{Recipe, tests::sample},
    };

    #[tokio::test]
    async fn comments_are_listed_newest_first_and_cascade() {
        let db = DBService::new_in_memory().await.unwrap();
        let recipe_id = Uuid::new_v4();
        Recipe::create(&db.pool, recipe_id, &sample("author", "Soup"))
            .await
            .unwrap();

        for text in ["first", "second"] {
            Comment::create(
                &db.pool,
                Uuid::new_v4(),
                &CreateComment {
                    recipe_id,
                    user_id: "u2".to_string(),
                    user_name: "Guest".to_string(),
                    text: text.to_string(),
                    image_key: (text == "second").then(|| "commentImages/x.png".to_string()),
                },
            )
            .await
            .unwrap();
        }

        let comments = Comment::find_by_recipe_id(&db.pool, recipe_id).await.unwrap();
        let texts: Vec<_> = comments.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, ["second", "first"]);
        assert_eq!(
            Comment::image_keys_for_recipe(&db.pool, recipe_id).await.unwrap(),
            vec!["commentImages/x.png".to_string()]
        );

        Recipe::delete(&db.pool, recipe_id).await.unwrap();
        assert!(Comment::find_by_recipe_id(&db.pool, recipe_id).await.unwrap().is_empty());
    }
}
