use axum::{
    extract::{Json, Multipart, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use crate::{
    db::settings_store::Settings,
    error::{AppError, Result},
    handlers::auth::AuthUser,
    models::user::Role,
    state::AppState,
};

/// Branding settings, readable without authentication
pub async fn get_settings(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let settings = state.settings_store.get_all().await?;
    Ok((StatusCode::OK, Json(settings)))
}

pub async fn update_settings(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(values): Json<Settings>,
) -> Result<impl IntoResponse> {
    auth.require_role(Role::Admin)?;

    if values.keys().any(|key| key.trim().is_empty()) {
        return Err(AppError::BadRequest("Setting keys must not be empty".into()));
    }

    let settings = state.settings_store.merge(&values).await?;
    tracing::info!("Admin {} updated {} settings", auth.username, values.len());
    Ok((StatusCode::OK, Json(settings)))
}

/// Accept an image upload and store it as the logo. The first part with an
/// `image/*` content type is used.
pub async fn upload_logo(
    State(state): State<AppState>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    auth.require_role(Role::Admin)?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        let is_image = field
            .content_type()
            .is_some_and(|content_type| content_type.starts_with("image/"));
        if !is_image {
            continue;
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {}", e)))?;
        if bytes.is_empty() {
            return Err(AppError::BadRequest("Uploaded file is empty".into()));
        }

        state.logo_store.save(&bytes).await?;

        return Ok((
            StatusCode::OK,
            Json(json!({
                "message": "Logo uploaded successfully",
                "path": state.logo_store.location().display().to_string(),
            })),
        ));
    }

    Err(AppError::BadRequest("No image file in upload".into()))
}
