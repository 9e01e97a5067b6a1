// handlers/admin/users/mod.rs - User management handlers

use axum::Json;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::ApiError;

pub mod create; // POST   /api/admin/users
pub mod delete; // DELETE /api/admin/users?id=
pub mod list;   // GET    /api/admin/users
pub mod update; // PATCH  /api/admin/users

pub use create::users_create;
pub use delete::users_delete;
pub use list::users_list;
pub use update::users_update;

/// `{"success": true}` body returned by the mutating handlers
#[derive(Debug, Serialize)]
pub struct Success {
    pub success: bool,
}

pub fn success() -> Json<Success> {
    Json(Success { success: true })
}

/// Bodies are parsed only after authorization succeeded, so a caller
/// without a session sees 401 whatever they sent.
pub(crate) fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::invalid_json("Request body is required"));
    }
    serde_json::from_slice(body).map_err(|e| ApiError::invalid_json(format!("Invalid JSON body: {}", e)))
}
