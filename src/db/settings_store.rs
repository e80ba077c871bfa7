use std::collections::BTreeMap;

use crate::{
    db::DbPool,
    error::{AppError, Result},
};

/// Flat key/value branding settings
pub type Settings = BTreeMap<String, String>;

#[derive(Clone)]
pub struct SettingsStore {
    pool: DbPool,
}

impl SettingsStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn get_all(&self) -> Result<Settings> {
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT key, value FROM settings")
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)?;

        Ok(rows.into_iter().collect())
    }

    /// Upsert every given pair; keys not mentioned keep their value.
    pub async fn merge(&self, values: &Settings) -> Result<Settings> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        for (key, value) in values {
            sqlx::query(
                r#"
                INSERT INTO settings (key, value) VALUES (?, ?)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value
                "#,
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await
            .map_err(AppError::Database)?;
        }

        tx.commit().await.map_err(AppError::Database)?;

        self.get_all().await
    }
}
