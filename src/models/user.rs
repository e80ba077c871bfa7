use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;

use crate::{
    error::{AppError, Result},
    models::car::Car,
};

/// User role; drivers log trips, admins manage everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Role {
    Driver,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Driver => "driver",
            Role::Admin => "admin",
        }
    }
}

/// Database user model
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub car_id: Option<i64>,
}

/// JSON representation of a user for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDto {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub car_id: Option<i64>,
    pub car_plate: Option<String>,
    pub car: Option<Car>,
}

impl UserDto {
    pub fn with_car(user: User, car: Option<Car>) -> Self {
        Self {
            id: user.id,
            username: user.username,
            role: user.role,
            car_id: user.car_id,
            car_plate: car.as_ref().map(|car| car.plate.clone()),
            car,
        }
    }
}

/// Admin request to create a driver account. Any `role` sent by the
/// client is ignored.
#[derive(Debug, Deserialize)]
pub struct CreateDriver {
    pub username: String,
    pub password: String,
    pub car_id: Option<i64>,
}

impl CreateDriver {
    pub fn validate(&self) -> Result<()> {
        validate_username(&self.username)?;
        validate_password(&self.password)
    }
}

/// Partial driver update. A missing `car_id` leaves the assignment alone,
/// an explicit `null` unassigns the car.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateDriver {
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default, deserialize_with = "present_field")]
    pub car_id: Option<Option<i64>>,
}

impl UpdateDriver {
    pub fn validate(&self) -> Result<()> {
        if let Some(username) = &self.username {
            validate_username(username)?;
        }
        if let Some(password) = &self.password {
            validate_password(password)?;
        }
        Ok(())
    }
}

fn present_field<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
pub struct PasswordChange {
    pub password: String,
}

impl PasswordChange {
    pub fn validate(&self) -> Result<()> {
        validate_password(&self.password)
    }
}

/// Credentials posted to the token endpoint
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Token endpoint response
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub role: Role,
    pub username: String,
    pub user_id: i64,
}

fn validate_username(username: &str) -> Result<()> {
    let trimmed = username.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest("Username must not be empty".into()));
    }
    if trimmed.chars().count() > 50 {
        return Err(AppError::BadRequest("Username is limited to 50 characters".into()));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<()> {
    if password.is_empty() {
        return Err(AppError::BadRequest("Password must not be empty".into()));
    }
    Ok(())
}
