use anyhow::Result;

use super::schema::Database;

impl Database {
    // ========================================================================
    // Key-Value Operations
    // ========================================================================

    /// Get a single stored value by key.
    ///
    /// Keys use dotted convention: `selectedCategories.products`,
    /// `selectedCategories.categories`, etc.
    pub async fn get_preference(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM user_preferences WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(value,)| value))
    }

    /// Set a value (UPSERT).
    ///
    /// Inserts the key-value pair if it doesn't exist, or updates the value and
    /// timestamp if the key already exists.
    pub async fn set_preference(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_preferences (key, value, updated_at)
            VALUES (?, ?, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Delete every key starting with `prefix`.
    ///
    /// Returns the number of rows removed. Used by `--reset-selection` to
    /// forget persisted category selections for all item types at once.
    pub async fn delete_preferences_by_prefix(&self, prefix: &str) -> Result<u64> {
        let pattern = format!("{}%", prefix.replace('%', "\\%").replace('_', "\\_"));
        let result = sqlx::query("DELETE FROM user_preferences WHERE key LIKE ? ESCAPE '\\'")
            .bind(&pattern)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::Database;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_get_preference_missing() {
        let db = test_db().await;
        let value = db.get_preference("selectedCategories.products").await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_set_and_get_preference() {
        let db = test_db().await;
        db.set_preference("selectedCategories.products", r#"["3"]"#)
            .await
            .unwrap();

        let value = db.get_preference("selectedCategories.products").await.unwrap();
        assert_eq!(value, Some(r#"["3"]"#.to_string()));
    }

    #[tokio::test]
    async fn test_set_preference_upsert() {
        let db = test_db().await;
        db.set_preference("selectedCategories.products", r#"["3"]"#)
            .await
            .unwrap();
        db.set_preference("selectedCategories.products", r#"["3","7"]"#)
            .await
            .unwrap();

        let value = db.get_preference("selectedCategories.products").await.unwrap();
        assert_eq!(value, Some(r#"["3","7"]"#.to_string()));
    }

    #[tokio::test]
    async fn test_delete_by_prefix_only_touches_matching_keys() {
        let db = test_db().await;
        db.set_preference("selectedCategories.products", "[]")
            .await
            .unwrap();
        db.set_preference("selectedCategories.categories", "[]")
            .await
            .unwrap();
        db.set_preference("selectedCategoriesXproducts", "[]")
            .await
            .unwrap();

        let removed = db
            .delete_preferences_by_prefix("selectedCategories.")
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert!(db
            .get_preference("selectedCategoriesXproducts")
            .await
            .unwrap()
            .is_some());
    }
}
