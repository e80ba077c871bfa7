use axum::{
    extract::{Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::Deserialize;

use crate::{
    error::Result,
    handlers::auth::AuthUser,
    models::user::Role,
    services::report_service::{ExportFilter, XLSX_CONTENT_TYPE},
    state::AppState,
};

/// Raw export query; malformed values are dropped rather than rejected.
#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    pub driver_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

pub async fn export_trips(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ExportQuery>,
) -> Result<impl IntoResponse> {
    auth.require_role(Role::Admin)?;

    let filter = ExportFilter::from_raw(
        query.driver_id.as_deref(),
        query.start_date.as_deref(),
        query.end_date.as_deref(),
    );
    let export = state.report_service.export(filter).await?;

    let disposition = format!("attachment; filename=\"{}\"", export.filename.replace('"', ""));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        export.content,
    ))
}
