use axum::{
    extract::{Form, FromRequestParts, Json, State},
    http::{StatusCode, header, request::Parts},
    response::IntoResponse,
};
use serde_json::json;

use crate::{
    error::{AppError, Result},
    models::user::{LoginRequest, PasswordChange, Role},
    state::AppState,
};

/// Caller identity resolved from the bearer token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub role: Role,
}

impl AuthUser {
    pub fn require_role(&self, role: Role) -> Result<()> {
        if self.role != role {
            return Err(AppError::Forbidden(match role {
                Role::Admin => "Admin privileges required".into(),
                Role::Driver => "Only drivers can perform this action".into(),
            }));
        }
        Ok(())
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| {
                value
                    .strip_prefix("Bearer ")
                    .or_else(|| value.strip_prefix("bearer "))
            })
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AppError::Auth("Missing bearer token".into()))?;

        let user = state.auth_service.authenticate(token).await?;

        Ok(Self {
            id: user.id,
            username: user.username,
            role: user.role,
        })
    }
}

/// Handler for username/password login (form encoded)
pub async fn login(
    State(state): State<AppState>,
    Form(request): Form<LoginRequest>,
) -> Result<impl IntoResponse> {
    let response = state
        .auth_service
        .login(&request.username, &request.password)
        .await?;

    Ok((StatusCode::OK, Json(response)))
}

/// Handler for the calling admin changing their own password
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<PasswordChange>,
) -> Result<impl IntoResponse> {
    auth.require_role(Role::Admin)?;
    request.validate()?;

    state
        .auth_service
        .change_password(auth.id, &request.password)
        .await?;

    Ok((
        StatusCode::OK,
        Json(json!({ "message": "Password updated successfully" })),
    ))
}
