// handlers/admin/users/update.rs - PATCH /api/admin/users handler

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};

use super::{parse_body, success, Success};
use crate::error::ApiError;
use crate::services::UserUpdate;
use crate::state::AppState;

/// PATCH /api/admin/users - Change password and/or profile fields
///
/// Only the fields present in the body are changed:
/// ```json
/// {
///   "id": "uuid",          // Required
///   "active": false,       // null is rejected
///   "password": "string",  // Set through the identity service first
///   "name": "string",      // null clears it
///   "role": "string",      // null is rejected
///   "phone": "string"      // null clears it
/// }
/// ```
pub async fn users_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Success>, ApiError> {
    let ctx = state.gate.authorize(&headers).await?;
    let input: UserUpdate = parse_body(&body)?;

    state.user_admin(&ctx).update_user(input).await?;
    Ok(success())
}
