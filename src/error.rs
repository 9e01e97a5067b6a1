// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::backend::BackendError;
use crate::services::UserAdminError;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },
    InvalidJson(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 500 Internal Server Error
    InternalServerError(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ValidationError { .. } => 400,
            ApiError::InvalidJson(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::InternalServerError(_) => 500,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::ValidationError { message, .. } => message,
            ApiError::InvalidJson(msg) => msg,
            ApiError::Unauthorized(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        match self {
            ApiError::ValidationError { message, field_errors } => {
                let mut response = json!({
                    "error": true,
                    "message": message,
                    "code": "VALIDATION_ERROR"
                });

                if let Some(field_errors) = field_errors {
                    response["field_errors"] = json!(field_errors);
                }

                response
            }
            _ => {
                json!({
                    "error": true,
                    "message": self.message(),
                    "code": self.error_code()
                })
            }
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::InvalidJson(_) => "INVALID_JSON",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(
        message: impl Into<String>,
        field_errors: Option<HashMap<String, String>>,
    ) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors,
        }
    }

    /// Single-field shorthand for `validation_error`
    pub fn missing_field(field: &str) -> Self {
        let mut field_errors = HashMap::new();
        field_errors.insert(field.to_string(), "This field is required".to_string());
        ApiError::validation_error(format!("Missing required field '{}'", field), Some(field_errors))
    }

    pub fn invalid_json(message: impl Into<String>) -> Self {
        ApiError::InvalidJson(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }
}

impl From<BackendError> for ApiError {
    fn from(err: BackendError) -> Self {
        match err {
            // The service answered; its message goes back to the caller verbatim
            BackendError::Rejected { message, .. } => ApiError::bad_request(message),
            BackendError::Transport(msg) => {
                tracing::error!("Identity service transport error: {}", msg);
                ApiError::internal_server_error("Internal server error")
            }
            BackendError::Decode(msg) => {
                tracing::error!("Identity service returned an unreadable response: {}", msg);
                ApiError::internal_server_error("Internal server error")
            }
        }
    }
}

impl From<UserAdminError> for ApiError {
    fn from(err: UserAdminError) -> Self {
        match err {
            UserAdminError::MissingField(field) => ApiError::missing_field(field),
            UserAdminError::NullField(field) => {
                let mut field_errors = HashMap::new();
                field_errors.insert(field.to_string(), "This field cannot be null".to_string());
                ApiError::validation_error(format!("Field '{}' cannot be null", field), Some(field_errors))
            }
            UserAdminError::Backend(e) => e.into(),
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_backend_error_keeps_service_message() {
        let err: ApiError = BackendError::Rejected {
            status: 422,
            message: "A user with this email address has already been registered".to_string(),
        }
        .into();

        assert_eq!(err.status_code(), 400);
        assert_eq!(err.message(), "A user with this email address has already been registered");
        assert_eq!(err.to_json()["code"], "BAD_REQUEST");
    }

    #[test]
    fn transport_error_is_hidden_behind_500() {
        let err: ApiError = BackendError::Transport("connection refused (10.0.0.4:443)".to_string()).into();

        assert_eq!(err.status_code(), 500);
        assert!(!err.message().contains("10.0.0.4"));
    }

    #[test]
    fn missing_field_reports_field_errors() {
        let body = ApiError::missing_field("id").to_json();

        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(body["field_errors"]["id"], "This field is required");
    }

    #[test]
    fn null_field_is_a_validation_error() {
        let err: ApiError = UserAdminError::NullField("role").into();
        let body = err.to_json();

        assert_eq!(err.status_code(), 400);
        assert_eq!(body["message"], "Field 'role' cannot be null");
        assert_eq!(body["field_errors"]["role"], "This field cannot be null");
    }
}
