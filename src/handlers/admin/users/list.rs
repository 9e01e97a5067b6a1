// handlers/admin/users/list.rs - GET /api/admin/users handler

use axum::{extract::State, http::HeaderMap, Json};

use crate::backend::Profile;
use crate::error::ApiError;
use crate::state::AppState;

/// GET /api/admin/users - All profiles, newest first
///
/// Responds with a bare JSON array of profiles.
pub async fn users_list(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<Vec<Profile>>, ApiError> {
    let ctx = state.gate.authorize(&headers).await?;
    let profiles = state.user_admin(&ctx).list_users().await?;
    Ok(Json(profiles))
}
