use serde::{Deserialize, Deserializer};
use uuid::Uuid;

use crate::backend::{BackendError, NewAccount, NewProfile, Profile, ProfilePatch};
use crate::gate::AdminContext;

/// Role stored on the profile when the request names none
pub const DEFAULT_ROLE: &str = "user";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUser {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub name: Option<String>,
    pub role: Option<String>,
    pub phone: Option<String>,
}

/// Fields left out of the request are not touched. A `null` clears `name`
/// and `phone`; `active` and `role` cannot be cleared.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub id: Option<Uuid>,
    #[serde(default, deserialize_with = "present")]
    pub active: Option<Option<bool>>,
    pub password: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub role: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub phone: Option<Option<String>>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl UserUpdate {
    pub fn profile_patch(&self) -> Result<ProfilePatch, UserAdminError> {
        Ok(ProfilePatch {
            active: required(self.active, "active")?,
            full_name: self.name.clone(),
            role: required(self.role.clone(), "role")?,
            phone: self.phone.clone(),
        })
    }
}

fn required<T>(field: Option<Option<T>>, name: &'static str) -> Result<Option<T>, UserAdminError> {
    match field {
        Some(None) => Err(UserAdminError::NullField(name)),
        Some(Some(value)) => Ok(Some(value)),
        None => Ok(None),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UserAdminError {
    #[error("Missing required field '{0}'")]
    MissingField(&'static str),

    #[error("Field '{0}' cannot be null")]
    NullField(&'static str),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// List/create/update/delete on behalf of an authorized admin
pub struct UserAdminService<'a> {
    ctx: &'a AdminContext,
    compensate_failed_create: bool,
}

impl<'a> UserAdminService<'a> {
    pub fn new(ctx: &'a AdminContext, compensate_failed_create: bool) -> Self {
        Self {
            ctx,
            compensate_failed_create,
        }
    }

    pub async fn list_users(&self) -> Result<Vec<Profile>, UserAdminError> {
        Ok(self.ctx.clients.profiles.list_newest_first().await?)
    }

    /// Create the identity account, then its profile row.
    ///
    /// Returns the new user id.
    pub async fn create_user(&self, input: NewUser) -> Result<Uuid, UserAdminError> {
        if input.email.trim().is_empty() {
            return Err(UserAdminError::MissingField("email"));
        }
        if input.password.is_empty() {
            return Err(UserAdminError::MissingField("password"));
        }

        let role = input
            .role
            .filter(|role| !role.is_empty())
            .unwrap_or_else(|| DEFAULT_ROLE.to_string());

        let account = NewAccount {
            email: input.email.trim().to_string(),
            password: input.password,
            full_name: input.name.clone(),
            role: role.clone(),
            phone: input.phone.clone(),
        };
        let created = self.ctx.clients.identity.create_user(&account).await?;

        let profile = NewProfile {
            id: created.id,
            full_name: input.name,
            email: account.email,
            role,
            active: true,
            phone: input.phone,
        };

        if let Err(insert_err) = self.ctx.clients.profiles.insert(&profile).await {
            tracing::error!(
                "Profile insert for new user {} failed: {}",
                created.id,
                insert_err
            );
            if self.compensate_failed_create {
                self.remove_orphaned_account(created.id).await;
            }
            return Err(insert_err.into());
        }

        tracing::info!(admin = %self.ctx.caller_id, user = %created.id, "Created user");
        Ok(created.id)
    }

    async fn remove_orphaned_account(&self, id: Uuid) {
        match self.ctx.clients.identity.delete_user(id).await {
            Ok(()) => tracing::warn!("Removed identity account {} after failed profile insert", id),
            Err(e) => tracing::error!(
                "Identity account {} has no profile and could not be removed: {}",
                id,
                e
            ),
        }
    }

    pub async fn update_user(&self, input: UserUpdate) -> Result<(), UserAdminError> {
        let id = input.id.ok_or(UserAdminError::MissingField("id"))?;
        let patch = input.profile_patch()?;

        if let Some(password) = input.password.as_deref().filter(|p| !p.is_empty()) {
            self.ctx.clients.identity.update_password(id, password).await?;
        }

        if !patch.is_empty() {
            self.ctx.clients.profiles.update(id, &patch).await?;
        }

        tracing::info!(admin = %self.ctx.caller_id, user = %id, "Updated user");
        Ok(())
    }

    /// Delete the identity account, then the profile row
    pub async fn delete_user(&self, id: Uuid) -> Result<(), UserAdminError> {
        self.ctx.clients.identity.delete_user(id).await?;
        self.ctx.clients.profiles.delete(id).await?;

        tracing::info!(admin = %self.ctx.caller_id, user = %id, "Deleted user");
        Ok(())
    }
}
