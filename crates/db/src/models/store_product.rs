use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;

/// Entry of the mock grocery catalog that ingredients get matched against.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
pub struct StoreProduct {
    pub id: String,
    pub name: String,
    /// Lowercase term that identifies the ingredient this product stands for.
    pub keyword: String,
    pub price: String, // display string, e.g. "$2.49"
    pub image_url: String,
    pub category: String,
    pub in_stock: bool,
}

impl StoreProduct {
    /// Whole catalog, most specific keyword first.
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, StoreProduct>(
            "SELECT * FROM store_products ORDER BY length(keyword) DESC, id ASC",
        )
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DBService;

    #[tokio::test]
    async fn catalog_is_seeded_most_specific_first() {
        let db = DBService::new_in_memory().await.unwrap();
        let catalog = StoreProduct::find_all(&db.pool).await.unwrap();
        assert!(!catalog.is_empty());
        assert_eq!(catalog[0].keyword, "olive oil");

        let spinach = catalog.iter().find(|p| p.id == "prod-spinach").unwrap();
        assert!(!spinach.in_stock);
    }
}
