use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use crate::{
    error::Result,
    handlers::auth::AuthUser,
    models::user::{CreateDriver, Role, UpdateDriver, UserDto},
    services::auth_service::hash_password_blocking,
    state::AppState,
};

/// List drivers with their assigned car
pub async fn list_drivers(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<impl IntoResponse> {
    auth.require_role(Role::Admin)?;

    let cars = state.car_store.cars_by_id().await?;
    let drivers: Vec<UserDto> = state
        .user_store
        .list_drivers()
        .await?
        .into_iter()
        .map(|user| {
            let car = user.car_id.and_then(|id| cars.get(&id).cloned());
            UserDto::with_car(user, car)
        })
        .collect();

    Ok((StatusCode::OK, Json(drivers)))
}

/// Create a driver account
pub async fn create_driver(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CreateDriver>,
) -> Result<impl IntoResponse> {
    auth.require_role(Role::Admin)?;
    request.validate()?;

    let car = match request.car_id {
        Some(car_id) => Some(state.car_store.get_car(car_id).await?),
        None => None,
    };

    let password_hash = hash_password_blocking(request.password).await?;
    let driver = state
        .user_store
        .create_user(&request.username, &password_hash, Role::Driver, request.car_id)
        .await?;

    Ok((StatusCode::OK, Json(UserDto::with_car(driver, car))))
}

/// Update username, password and/or car assignment of a driver
pub async fn update_driver(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(request): Json<UpdateDriver>,
) -> Result<impl IntoResponse> {
    auth.require_role(Role::Admin)?;
    request.validate()?;

    if let Some(Some(car_id)) = request.car_id {
        state.car_store.get_car(car_id).await?;
    }

    let password_hash = match request.password {
        Some(password) => Some(hash_password_blocking(password).await?),
        None => None,
    };

    let driver = state
        .user_store
        .update_driver(
            id,
            request.username.as_deref(),
            password_hash.as_deref(),
            request.car_id,
        )
        .await?;

    let car = match driver.car_id {
        Some(car_id) => Some(state.car_store.get_car(car_id).await?),
        None => None,
    };

    Ok((StatusCode::OK, Json(UserDto::with_car(driver, car))))
}

/// Delete a driver together with their trips
pub async fn delete_driver(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    auth.require_role(Role::Admin)?;

    state.user_store.delete_driver(id).await?;

    Ok((
        StatusCode::OK,
        Json(json!({ "message": "Driver deleted successfully" })),
    ))
}
