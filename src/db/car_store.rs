use std::collections::HashMap;

use crate::{
    db::DbPool,
    error::{AppError, Result},
    models::car::{Car, CarUpdate, NewCar},
};

/// Car store for database operations
#[derive(Clone)]
pub struct CarStore {
    pool: DbPool,
}

impl CarStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn list_cars(&self) -> Result<Vec<Car>> {
        let cars = sqlx::query_as::<_, Car>("SELECT * FROM cars ORDER BY plate")
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)?;

        Ok(cars)
    }

    /// All cars keyed by id
    pub async fn cars_by_id(&self) -> Result<HashMap<i64, Car>> {
        Ok(self
            .list_cars()
            .await?
            .into_iter()
            .map(|car| (car.id, car))
            .collect())
    }

    pub async fn get_car(&self, id: i64) -> Result<Car> {
        let car = sqlx::query_as::<_, Car>("SELECT * FROM cars WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)?
            .ok_or(AppError::NotFound("Car"))?;

        Ok(car)
    }

    async fn find_by_plate(&self, plate: &str) -> Result<Option<Car>> {
        let car = sqlx::query_as::<_, Car>("SELECT * FROM cars WHERE plate = ?")
            .bind(plate)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)?;

        Ok(car)
    }

    /// Create a car; plates are unique
    pub async fn create_car(&self, car: &NewCar) -> Result<Car> {
        let plate = car.plate.trim();
        if self.find_by_plate(plate).await?.is_some() {
            return Err(AppError::Conflict("Car plate already exists".into()));
        }

        let created = sqlx::query_as::<_, Car>(
            r#"
            INSERT INTO cars (plate, model, status)
            VALUES (?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(plate)
        .bind(car.model.trim())
        .bind(car.status)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from_unique(e, "Car plate already exists"))?;

        tracing::info!("Created car {} ({})", created.plate, created.id);
        Ok(created)
    }

    pub async fn update_car(&self, id: i64, update: &CarUpdate) -> Result<Car> {
        let mut car = self.get_car(id).await?;

        if let Some(plate) = update.plate.as_deref().map(str::trim) {
            if let Some(existing) = self.find_by_plate(plate).await? {
                if existing.id != id {
                    return Err(AppError::Conflict("Car plate already exists".into()));
                }
            }
            car.plate = plate.to_string();
        }
        if let Some(model) = &update.model {
            car.model = model.trim().to_string();
        }
        if let Some(status) = update.status {
            car.status = status;
        }

        sqlx::query("UPDATE cars SET plate = ?, model = ?, status = ? WHERE id = ?")
            .bind(&car.plate)
            .bind(&car.model)
            .bind(car.status)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::from_unique(e, "Car plate already exists"))?;

        Ok(car)
    }

    /// Delete a car. Refused while any user is still assigned to it.
    pub async fn delete_car(&self, id: i64) -> Result<()> {
        let car = self.get_car(id).await?;

        let assigned: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE car_id = ?")
            .bind(car.id)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)?;

        if assigned.0 > 0 {
            return Err(AppError::Conflict(
                "Cannot delete car assigned to drivers. Unassign first.".into(),
            ));
        }

        sqlx::query("DELETE FROM cars WHERE id = ?")
            .bind(car.id)
            .execute(&self.pool)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                    AppError::Conflict("Cannot delete car assigned to drivers. Unassign first.".into())
                }
                _ => AppError::Database(e),
            })?;

        tracing::info!("Deleted car {} ({})", car.plate, car.id);
        Ok(())
    }
}
