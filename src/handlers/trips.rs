use std::collections::HashMap;

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    error::Result,
    handlers::auth::AuthUser,
    models::{
        trip::{HistoryFilter, NewCheckpoint, TripDto, TripUpdate},
        user::{Role, UserDto},
    },
    state::AppState,
};

/// Start (or resume) the caller's trip
pub async fn start_trip(State(state): State<AppState>, auth: AuthUser) -> Result<impl IntoResponse> {
    auth.require_role(Role::Driver)?;

    let trip = state.trip_service.start_trip(auth.id).await?;
    let logs = state.trip_store.logs_for_trip(trip.id).await?;

    Ok((
        StatusCode::OK,
        Json(TripDto {
            trip,
            logs,
            driver: None,
        }),
    ))
}

pub async fn get_active_trip(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<impl IntoResponse> {
    let trip = state.trip_service.active_trip(auth.id).await?;
    Ok((StatusCode::OK, Json(trip)))
}

pub async fn log_checkpoint(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(trip_id): Path<i64>,
    Json(checkpoint): Json<NewCheckpoint>,
) -> Result<impl IntoResponse> {
    let log = state
        .trip_service
        .log_checkpoint(trip_id, auth.id, checkpoint)
        .await?;
    Ok((StatusCode::OK, Json(log)))
}

/// Raw history query; values that fail to parse are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub month: Option<String>,
    pub year: Option<String>,
}

pub async fn get_history(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse> {
    auth.require_role(Role::Driver)?;

    let filter = HistoryFilter::from_raw(query.month.as_deref(), query.year.as_deref());
    let trips = state.trip_service.history(auth.id, filter).await?;
    Ok((StatusCode::OK, Json(trips)))
}

/// All trips with logs and driver, newest first
pub async fn list_all_trips(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<impl IntoResponse> {
    auth.require_role(Role::Admin)?;

    let trips = state.trip_store.list_trips().await?;
    let mut driver_ids: Vec<i64> = trips.iter().map(|trip| trip.driver_id).collect();
    driver_ids.sort_unstable();
    driver_ids.dedup();

    let cars = state.car_store.cars_by_id().await?;
    let drivers: HashMap<i64, UserDto> = state
        .user_store
        .get_users_by_ids(&driver_ids)
        .await?
        .into_iter()
        .map(|user| {
            let car = user.car_id.and_then(|id| cars.get(&id).cloned());
            (user.id, UserDto::with_car(user, car))
        })
        .collect();

    let trips: Vec<TripDto> = state
        .trip_service
        .attach_logs(trips)
        .await?
        .into_iter()
        .map(|mut dto| {
            dto.driver = drivers.get(&dto.trip.driver_id).cloned();
            dto
        })
        .collect();

    Ok((StatusCode::OK, Json(trips)))
}

pub async fn update_trip(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(trip_id): Path<i64>,
    Json(update): Json<TripUpdate>,
) -> Result<impl IntoResponse> {
    auth.require_role(Role::Admin)?;

    let trip = state.trip_store.update_trip(trip_id, &update).await?;
    let logs = state.trip_store.logs_for_trip(trip.id).await?;
    tracing::info!("Admin {} updated trip {}", auth.username, trip.id);

    Ok((
        StatusCode::OK,
        Json(TripDto {
            trip,
            logs,
            driver: None,
        }),
    ))
}

pub async fn delete_trip(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(trip_id): Path<i64>,
) -> Result<impl IntoResponse> {
    auth.require_role(Role::Admin)?;

    state.trip_store.delete_trip(trip_id).await?;
    tracing::info!("Admin {} deleted trip {}", auth.username, trip_id);

    Ok((StatusCode::OK, Json(json!({ "message": "Trip deleted" }))))
}
