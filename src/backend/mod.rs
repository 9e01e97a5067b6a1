//! External identity service and profile store.
//!
//! Every request gets its own privileged handle from a [`ClientFactory`]
//! held in the router state. Two implementations exist: [`remote`] talks to a
//! GoTrue/PostgREST-style HTTP service, [`memory`] keeps everything in process.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{AppConfig, BackendKind, ConfigError};

pub mod memory;
pub mod remote;

pub use memory::{MemoryBackend, SeededUser};
pub use remote::RemoteClientFactory;

/// Errors from the identity service or profile store
#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    /// The service answered with an error status
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("decode error: {0}")]
    Decode(String),
}

impl BackendError {
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        BackendError::Rejected {
            status,
            message: message.into(),
        }
    }
}

/// Account as known by the identity service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

/// Application-level user record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub role: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub phone: Option<String>,
}

/// Identity account to create; name, role and phone travel as user metadata
#[derive(Debug, Clone, PartialEq)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
    pub role: String,
    pub phone: Option<String>,
}

/// Profile row to insert; `created_at` is assigned by the store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewProfile {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub email: String,
    pub role: String,
    pub active: bool,
    pub phone: Option<String>,
}

/// Partial profile update. Only present fields are sent; `Some(None)` for
/// `full_name` or `phone` clears the column.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<Option<String>>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.active.is_none() && self.full_name.is_none() && self.role.is_none() && self.phone.is_none()
    }

    pub fn apply_to(&self, profile: &mut Profile) {
        if let Some(active) = self.active {
            profile.active = active;
        }
        if let Some(full_name) = &self.full_name {
            profile.full_name = full_name.clone();
        }
        if let Some(role) = &self.role {
            profile.role = role.clone();
        }
        if let Some(phone) = &self.phone {
            profile.phone = phone.clone();
        }
    }
}

#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Resolve the account behind a caller's access token
    async fn user_for_token(&self, access_token: &str) -> Result<IdentityUser, BackendError>;

    /// Create a pre-confirmed account
    async fn create_user(&self, account: &NewAccount) -> Result<IdentityUser, BackendError>;

    async fn update_password(&self, id: Uuid, password: &str) -> Result<(), BackendError>;

    async fn delete_user(&self, id: Uuid) -> Result<(), BackendError>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Role column of one profile, `None` when the row does not exist
    async fn role_of(&self, id: Uuid) -> Result<Option<String>, BackendError>;

    /// Every profile, newest `created_at` first
    async fn list_newest_first(&self) -> Result<Vec<Profile>, BackendError>;

    async fn insert(&self, profile: &NewProfile) -> Result<(), BackendError>;

    async fn update(&self, id: Uuid, patch: &ProfilePatch) -> Result<(), BackendError>;

    async fn delete(&self, id: Uuid) -> Result<(), BackendError>;
}

/// Privileged handles for one request
#[derive(Clone)]
pub struct AdminClients {
    pub identity: Arc<dyn IdentityService>,
    pub profiles: Arc<dyn ProfileStore>,
}

/// Produces request-scoped [`AdminClients`]
pub trait ClientFactory: Send + Sync {
    fn admin_clients(&self) -> AdminClients;
}

/// Build the factory selected by configuration
pub fn factory_from_config(config: &AppConfig) -> Result<Arc<dyn ClientFactory>, ConfigError> {
    config.validate()?;

    match config.backend.kind {
        BackendKind::Remote => {
            let factory = RemoteClientFactory::from_config(&config.backend)?;
            Ok(Arc::new(factory))
        }
        BackendKind::Memory => Ok(Arc::new(MemoryBackend::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn patch_serializes_only_present_fields() {
        let patch = ProfilePatch {
            active: Some(false),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&patch).unwrap(), json!({ "active": false }));
    }

    #[test]
    fn patch_can_clear_phone() {
        let patch = ProfilePatch {
            phone: Some(None),
            ..Default::default()
        };
        assert!(!patch.is_empty());
        assert_eq!(serde_json::to_value(&patch).unwrap(), json!({ "phone": null }));
    }

    #[test]
    fn patch_can_clear_full_name() {
        let patch = ProfilePatch {
            full_name: Some(None),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&patch).unwrap(), json!({ "full_name": null }));
    }

    #[test]
    fn empty_patch_leaves_profile_alone() {
        let mut profile = Profile {
            id: Uuid::new_v4(),
            full_name: Some("Ada".to_string()),
            email: Some("ada@example.com".to_string()),
            role: "user".to_string(),
            active: true,
            created_at: Utc::now(),
            phone: Some("555".to_string()),
        };
        let before = profile.clone();

        let patch = ProfilePatch::default();
        assert!(patch.is_empty());
        patch.apply_to(&mut profile);

        assert_eq!(profile, before);
    }

    #[test]
    fn memory_backend_needs_no_remote_settings() {
        let mut config = AppConfig::development();
        config.backend.kind = BackendKind::Memory;
        assert!(factory_from_config(&config).is_ok());

        config.backend.kind = BackendKind::Remote;
        assert!(factory_from_config(&config).is_err());
    }
}
