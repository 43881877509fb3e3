use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;

/// Profile keyed by the identity provider's uid.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub display_name: Option<String>,
    pub photo_key: Option<String>, // kept so the previous picture can be removed on replace
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateUserProfile {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

impl UserProfile {
    pub async fn find_by_uid(pool: &SqlitePool, uid: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, UserProfile>("SELECT * FROM user_profiles WHERE uid = ?1")
            .bind(uid)
            .fetch_optional(pool)
            .await
    }

    /// Insert the profile unless it already exists, then return the stored row.
    pub async fn find_or_create(
        pool: &SqlitePool,
        data: &CreateUserProfile,
    ) -> Result<Self, sqlx::Error> {
        let now = Utc::now();
        sqlx::query(
            r#"INSERT OR IGNORE INTO user_profiles (uid, email, display_name, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?4)"#,
        )
        .bind(&data.uid)
        .bind(data.email.as_deref())
        .bind(data.display_name.as_deref())
        .bind(now)
        .execute(pool)
        .await?;

        Self::find_by_uid(pool, &data.uid)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    /// `None` leaves the stored value unchanged.
    pub async fn update_names(
        pool: &SqlitePool,
        uid: &str,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, UserProfile>(
            r#"UPDATE user_profiles
               SET first_name = COALESCE(?2, first_name),
                   last_name = COALESCE(?3, last_name),
                   updated_at = ?4
               WHERE uid = ?1
               RETURNING *"#,
        )
        .bind(uid)
        .bind(first_name)
        .bind(last_name)
        .bind(Utc::now())
        .fetch_optional(pool)
        .await
    }

    pub async fn update_photo_key(
        pool: &SqlitePool,
        uid: &str,
        photo_key: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, UserProfile>(
            r#"UPDATE user_profiles
               SET photo_key = ?2,
                   updated_at = ?3
               WHERE uid = ?1
               RETURNING *"#,
        )
        .bind(uid)
        .bind(photo_key)
        .bind(Utc::now())
        .fetch_optional(pool)
        .await
    }
}
