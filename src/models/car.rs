use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum CarStatus {
    #[default]
    Active,
    Maintenance,
}

/// Fleet vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Car {
    pub id: i64,
    pub plate: String,
    pub model: String,
    pub status: CarStatus,
}

#[derive(Debug, Deserialize)]
pub struct NewCar {
    pub plate: String,
    pub model: String,
    #[serde(default)]
    pub status: CarStatus,
}

impl NewCar {
    pub fn validate(&self) -> Result<()> {
        validate_plate(&self.plate)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CarUpdate {
    pub plate: Option<String>,
    pub model: Option<String>,
    pub status: Option<CarStatus>,
}

impl CarUpdate {
    pub fn validate(&self) -> Result<()> {
        match &self.plate {
            Some(plate) => validate_plate(plate),
            None => Ok(()),
        }
    }
}

fn validate_plate(plate: &str) -> Result<()> {
    let trimmed = plate.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest("Plate must not be empty".into()));
    }
    if trimmed.chars().count() > 20 {
        return Err(AppError::BadRequest("Plate is limited to 20 characters".into()));
    }
    Ok(())
}
