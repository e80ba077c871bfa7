use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use crate::{
    error::Result,
    handlers::auth::AuthUser,
    models::{
        car::{CarUpdate, NewCar},
        user::Role,
    },
    state::AppState,
};

pub async fn list_cars(State(state): State<AppState>, auth: AuthUser) -> Result<impl IntoResponse> {
    auth.require_role(Role::Admin)?;
    let cars = state.car_store.list_cars().await?;
    Ok((StatusCode::OK, Json(cars)))
}

pub async fn create_car(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(car): Json<NewCar>,
) -> Result<impl IntoResponse> {
    auth.require_role(Role::Admin)?;
    car.validate()?;

    let car = state.car_store.create_car(&car).await?;
    Ok((StatusCode::OK, Json(car)))
}

pub async fn update_car(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(update): Json<CarUpdate>,
) -> Result<impl IntoResponse> {
    auth.require_role(Role::Admin)?;
    update.validate()?;

    let car = state.car_store.update_car(id, &update).await?;
    Ok((StatusCode::OK, Json(car)))
}

pub async fn delete_car(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    auth.require_role(Role::Admin)?;

    state.car_store.delete_car(id).await?;
    Ok((StatusCode::OK, Json(json!({ "message": "Car deleted" }))))
}
