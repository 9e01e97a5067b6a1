// handlers/admin/users/delete.rs - DELETE /api/admin/users?id= handler

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{success, Success};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    pub id: Option<String>,
}

/// DELETE /api/admin/users?id=<uuid> - Delete identity account and profile
///
/// The id is checked before authorization, so a request without one is
/// answered with 400 and never reaches the identity service.
pub async fn users_delete(
    State(state): State<AppState>,
    Query(params): Query<DeleteParams>,
    headers: HeaderMap,
) -> Result<Json<Success>, ApiError> {
    let raw_id = params
        .id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::missing_field("id"))?;
    let id = Uuid::parse_str(raw_id).map_err(|_| ApiError::bad_request(format!("Invalid user id '{}'", raw_id)))?;

    let ctx = state.gate.authorize(&headers).await?;
    state.user_admin(&ctx).delete_user(id).await?;
    Ok(success())
}
