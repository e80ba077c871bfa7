pub mod auth;
pub mod cars;
pub mod export;
pub mod settings;
pub mod trips;
pub mod user;

use axum::{
    Json, Router,
    routing::{get, post, put},
};
use serde_json::{Value, json};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

pub use auth::AuthUser;

/// Build the HTTP router with all API routes
pub fn router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/trips", get(trips::list_all_trips))
        .route(
            "/trips/{trip_id}",
            put(trips::update_trip).delete(trips::delete_trip),
        )
        .route("/cars", get(cars::list_cars).post(cars::create_car))
        .route("/cars/{id}", put(cars::update_car).delete(cars::delete_car))
        .route("/drivers-list", get(user::list_drivers))
        .route("/drivers", get(user::list_drivers).post(user::create_driver))
        .route(
            "/drivers/{id}",
            put(user::update_driver).delete(user::delete_driver),
        )
        .route("/change-password", put(auth::change_password))
        .route("/export", get(export::export_trips))
        .route("/settings", put(settings::update_settings))
        .route("/logo", post(settings::upload_logo));

    let api = Router::new()
        .route("/auth/token", post(auth::login))
        .route("/settings", get(settings::get_settings))
        // Older clients post to the trailing-slash form.
        .route("/trips", post(trips::start_trip))
        .route("/trips/", post(trips::start_trip))
        .route("/trips/active", get(trips::get_active_trip))
        .route("/trips/history", get(trips::get_history))
        .route("/trips/{trip_id}/logs", post(trips::log_checkpoint))
        .nest("/admin", admin_routes);

    Router::new()
        .route("/", get(health))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "message": "Driver Tracker API is running" }))
}
