// handlers/admin/users/create.rs - POST /api/admin/users handler

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};

use super::{parse_body, success, Success};
use crate::error::ApiError;
use crate::services::NewUser;
use crate::state::AppState;

/// POST /api/admin/users - Create identity account and profile
///
/// Expected Input:
/// ```json
/// {
///   "email": "string",     // Required
///   "password": "string",  // Required
///   "name": "string",      // Optional: stored as full_name
///   "role": "string",      // Optional: defaults to "user"
///   "phone": "string"      // Optional
/// }
/// ```
pub async fn users_create(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Success>, ApiError> {
    let ctx = state.gate.authorize(&headers).await?;
    let input: NewUser = parse_body(&body)?;

    state.user_admin(&ctx).create_user(input).await?;
    Ok(success())
}
