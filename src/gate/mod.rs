use std::sync::Arc;

use axum::http::HeaderMap;
use uuid::Uuid;

use crate::backend::{AdminClients, ClientFactory};
use crate::config::SecurityConfig;
use crate::error::ApiError;
use crate::session;

const UNAUTHORIZED: &str = "Unauthorized";

/// Resolved admin caller plus the privileged clients for this request
#[derive(Clone)]
pub struct AdminContext {
    pub caller_id: Uuid,
    pub clients: AdminClients,
}

/// Session cookie → identity → admin role check
#[derive(Clone)]
pub struct AdminGate {
    factory: Arc<dyn ClientFactory>,
    cookie_suffix: String,
    admin_role: String,
}

impl AdminGate {
    pub fn new(factory: Arc<dyn ClientFactory>, security: &SecurityConfig) -> Self {
        Self {
            factory,
            cookie_suffix: security.session_cookie_suffix.clone(),
            admin_role: security.admin_role.clone(),
        }
    }

    /// Authorize the request or fail with 401.
    ///
    /// No external call is made when the request carries no session cookie.
    pub async fn authorize(&self, headers: &HeaderMap) -> Result<AdminContext, ApiError> {
        let cookies = session::request_cookies(headers);
        let raw = session::find_session(&cookies, &self.cookie_suffix).ok_or_else(|| {
            tracing::debug!("Authorization failed: no session cookie ending in '{}'", self.cookie_suffix);
            ApiError::unauthorized(UNAUTHORIZED)
        })?;
        let access_token = raw.access_token();

        let clients = self.factory.admin_clients();

        let user = clients
            .identity
            .user_for_token(&access_token)
            .await
            .map_err(|e| {
                tracing::debug!("Authorization failed: session rejected by identity service: {}", e);
                ApiError::unauthorized(UNAUTHORIZED)
            })?;

        let role = clients.profiles.role_of(user.id).await.map_err(|e| {
            tracing::warn!("Authorization failed: role lookup for {} failed: {}", user.id, e);
            ApiError::unauthorized(UNAUTHORIZED)
        })?;

        if role.as_deref() != Some(self.admin_role.as_str()) {
            tracing::warn!(
                "Authorization failed: user {} has role {:?}, '{}' required",
                user.id,
                role,
                self.admin_role
            );
            return Err(ApiError::unauthorized(UNAUTHORIZED));
        }

        tracing::debug!("Admin {} authorized", user.id);

        Ok(AdminContext {
            caller_id: user.id,
            clients,
        })
    }
}
