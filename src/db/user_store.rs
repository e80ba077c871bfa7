use sqlx::Sqlite;

use crate::{
    db::DbPool,
    error::{AppError, Result},
    models::user::{Role, User},
};

/// User store for database operations
#[derive(Clone)]
pub struct UserStore {
    pool: DbPool,
}

impl UserStore {
    /// Create a new UserStore with the provided database pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get all users with the driver role
    pub async fn list_drivers(&self) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE role = ? ORDER BY username COLLATE NOCASE",
        )
        .bind(Role::Driver)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(users)
    }

    /// Get users by ID, silently skipping unknown ids
    pub async fn get_users_by_ids(&self, ids: &[i64]) -> Result<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = sqlx::QueryBuilder::<Sqlite>::new("SELECT * FROM users WHERE id IN (");
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let users = query
            .build_query_as::<User>()
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)?;

        Ok(users)
    }

    /// Get a user by ID
    pub async fn get_user_by_id(&self, id: i64) -> Result<User> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)?
            .ok_or(AppError::NotFound("User"))?;

        Ok(user)
    }

    /// Get a user by ID, requiring the driver role
    pub async fn get_driver(&self, id: i64) -> Result<User> {
        match self.get_user_by_id(id).await {
            Ok(user) if user.role == Role::Driver => Ok(user),
            Ok(_) | Err(AppError::NotFound(_)) => Err(AppError::NotFound("Driver")),
            Err(e) => Err(e),
        }
    }

    /// Get a user by username
    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)?;

        Ok(user)
    }

    /// Create a user; usernames are unique
    pub async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
        car_id: Option<i64>,
    ) -> Result<User> {
        let username = username.trim();
        if self.find_by_username(username).await?.is_some() {
            return Err(AppError::Conflict("Username already registered".into()));
        }

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password_hash, role, car_id)
            VALUES (?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(role)
        .bind(car_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from_unique(e, "Username already registered"))?;

        tracing::info!("Created {} user {} ({})", role.as_str(), user.username, user.id);
        Ok(user)
    }

    /// Create the user unless the username is already taken.
    /// Returns whether a row was inserted.
    pub async fn ensure_user(&self, username: &str, password_hash: &str, role: Role) -> Result<bool> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO users (username, password_hash, role)
            VALUES (?, ?, ?)
            ON CONFLICT(username) DO NOTHING
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(role)
        .execute(&self.pool)
        .await
        .map_err(AppError::Database)?
        .rows_affected();

        Ok(inserted > 0)
    }

    /// Apply a partial update to a driver
    pub async fn update_driver(
        &self,
        id: i64,
        username: Option<&str>,
        password_hash: Option<&str>,
        car_id: Option<Option<i64>>,
    ) -> Result<User> {
        let mut driver = self.get_driver(id).await?;

        if let Some(username) = username.map(str::trim) {
            if let Some(existing) = self.find_by_username(username).await? {
                if existing.id != id {
                    return Err(AppError::Conflict("Username already taken".into()));
                }
            }
            driver.username = username.to_string();
        }

        if let Some(password_hash) = password_hash {
            driver.password_hash = password_hash.to_string();
        }

        if let Some(car_id) = car_id {
            driver.car_id = car_id;
        }

        sqlx::query(
            r#"
            UPDATE users
            SET username = ?, password_hash = ?, car_id = ?
            WHERE id = ?
            "#,
        )
        .bind(&driver.username)
        .bind(&driver.password_hash)
        .bind(driver.car_id)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::from_unique(e, "Username already taken"))?;

        Ok(driver)
    }

    /// Replace a user's password hash
    pub async fn update_password(&self, id: i64, password_hash: &str) -> Result<()> {
        let updated = sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?
            .rows_affected();

        if updated == 0 {
            return Err(AppError::NotFound("User"));
        }
        Ok(())
    }

    /// Delete a driver; their trips and trip logs go with them
    pub async fn delete_driver(&self, id: i64) -> Result<()> {
        let driver = self.get_driver(id).await?;

        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(driver.id)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;

        tracing::info!("Deleted driver {} ({})", driver.username, driver.id);
        Ok(())
    }
}
