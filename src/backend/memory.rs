use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    AdminClients, BackendError, ClientFactory, IdentityService, IdentityUser, NewAccount, NewProfile, Profile,
    ProfilePatch, ProfileStore,
};

/// Process-local identity service and profile store.
///
/// Error statuses and messages follow what the remote service returns so
/// handlers behave the same against either backend. Every trait call is
/// recorded; seeding and inspection helpers are not.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    state: RwLock<MemoryState>,
    calls: RwLock<Vec<String>>,
}

#[derive(Default)]
struct MemoryState {
    accounts: HashMap<Uuid, Account>,
    sessions: HashMap<String, Uuid>,
    profiles: HashMap<Uuid, Profile>,
    fail_next_insert: Option<String>,
    fail_next_account_delete: Option<String>,
}

#[derive(Debug, Clone)]
struct Account {
    email: String,
    password: String,
}

/// Account created through a seeding helper
#[derive(Debug, Clone)]
pub struct SeededUser {
    pub id: Uuid,
    pub access_token: String,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account plus live session, no profile row
    pub async fn seed_account(&self, email: &str) -> SeededUser {
        let id = Uuid::new_v4();
        let access_token = format!("mem-{}", Uuid::new_v4().simple());

        let mut state = self.inner.state.write().await;
        state.accounts.insert(
            id,
            Account {
                email: email.to_string(),
                password: String::new(),
            },
        );
        state.sessions.insert(access_token.clone(), id);

        SeededUser { id, access_token }
    }

    /// Account, session and profile with the given role
    pub async fn seed_user(&self, email: &str, role: &str) -> SeededUser {
        self.seed_user_created_at(email, role, Utc::now()).await
    }

    pub async fn seed_user_created_at(&self, email: &str, role: &str, created_at: DateTime<Utc>) -> SeededUser {
        let user = self.seed_account(email).await;

        let mut state = self.inner.state.write().await;
        state.profiles.insert(
            user.id,
            Profile {
                id: user.id,
                full_name: None,
                email: Some(email.to_string()),
                role: role.to_string(),
                active: true,
                created_at,
                phone: None,
            },
        );

        user
    }

    /// Make the next profile insert fail with the given message
    pub async fn fail_next_profile_insert(&self, message: &str) {
        self.inner.state.write().await.fail_next_insert = Some(message.to_string());
    }

    /// Make the next account deletion fail with the given message
    pub async fn fail_next_account_delete(&self, message: &str) {
        self.inner.state.write().await.fail_next_account_delete = Some(message.to_string());
    }

    pub async fn profile(&self, id: Uuid) -> Option<Profile> {
        self.inner.state.read().await.profiles.get(&id).cloned()
    }

    pub async fn profile_count(&self) -> usize {
        self.inner.state.read().await.profiles.len()
    }

    pub async fn account_exists(&self, id: Uuid) -> bool {
        self.inner.state.read().await.accounts.contains_key(&id)
    }

    pub async fn account_id_for_email(&self, email: &str) -> Option<Uuid> {
        let state = self.inner.state.read().await;
        state
            .accounts
            .iter()
            .find(|(_, account)| account.email.eq_ignore_ascii_case(email))
            .map(|(id, _)| *id)
    }

    pub async fn password_of(&self, id: Uuid) -> Option<String> {
        let state = self.inner.state.read().await;
        state.accounts.get(&id).map(|account| account.password.clone())
    }

    /// Names of the trait calls made so far, in order
    pub async fn calls(&self) -> Vec<String> {
        self.inner.calls.read().await.clone()
    }

    async fn record(&self, call: &str) {
        self.inner.calls.write().await.push(call.to_string());
    }
}

impl ClientFactory for MemoryBackend {
    fn admin_clients(&self) -> AdminClients {
        AdminClients {
            identity: Arc::new(self.clone()),
            profiles: Arc::new(self.clone()),
        }
    }
}

fn user_not_found() -> BackendError {
    BackendError::rejected(404, "User not found")
}

#[async_trait]
impl IdentityService for MemoryBackend {
    async fn user_for_token(&self, access_token: &str) -> Result<IdentityUser, BackendError> {
        self.record("identity.user_for_token").await;

        let state = self.inner.state.read().await;
        let id = state
            .sessions
            .get(access_token)
            .ok_or_else(|| BackendError::rejected(403, "invalid JWT: unable to parse or verify signature"))?;
        let account = state.accounts.get(id).ok_or_else(user_not_found)?;

        Ok(IdentityUser {
            id: *id,
            email: Some(account.email.clone()),
        })
    }

    async fn create_user(&self, account: &NewAccount) -> Result<IdentityUser, BackendError> {
        self.record("identity.create_user").await;

        let mut state = self.inner.state.write().await;
        if state
            .accounts
            .values()
            .any(|existing| existing.email.eq_ignore_ascii_case(&account.email))
        {
            return Err(BackendError::rejected(
                422,
                "A user with this email address has already been registered",
            ));
        }

        let id = Uuid::new_v4();
        state.accounts.insert(
            id,
            Account {
                email: account.email.clone(),
                password: account.password.clone(),
            },
        );

        Ok(IdentityUser {
            id,
            email: Some(account.email.clone()),
        })
    }

    async fn update_password(&self, id: Uuid, password: &str) -> Result<(), BackendError> {
        self.record("identity.update_password").await;

        let mut state = self.inner.state.write().await;
        let account = state.accounts.get_mut(&id).ok_or_else(user_not_found)?;
        account.password = password.to_string();
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), BackendError> {
        self.record("identity.delete_user").await;

        let mut state = self.inner.state.write().await;
        if let Some(message) = state.fail_next_account_delete.take() {
            return Err(BackendError::rejected(500, message));
        }
        state.accounts.remove(&id).ok_or_else(user_not_found)?;
        state.sessions.retain(|_, session_user| *session_user != id);
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for MemoryBackend {
    async fn role_of(&self, id: Uuid) -> Result<Option<String>, BackendError> {
        self.record("profiles.role_of").await;

        let state = self.inner.state.read().await;
        Ok(state.profiles.get(&id).map(|profile| profile.role.clone()))
    }

    async fn list_newest_first(&self) -> Result<Vec<Profile>, BackendError> {
        self.record("profiles.list").await;

        let state = self.inner.state.read().await;
        let mut profiles: Vec<Profile> = state.profiles.values().cloned().collect();
        profiles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(profiles)
    }

    async fn insert(&self, profile: &NewProfile) -> Result<(), BackendError> {
        self.record("profiles.insert").await;

        let mut state = self.inner.state.write().await;
        if let Some(message) = state.fail_next_insert.take() {
            return Err(BackendError::rejected(400, message));
        }
        if state.profiles.contains_key(&profile.id) {
            return Err(BackendError::rejected(
                409,
                "duplicate key value violates unique constraint \"profiles_pkey\"",
            ));
        }

        state.profiles.insert(
            profile.id,
            Profile {
                id: profile.id,
                full_name: profile.full_name.clone(),
                email: Some(profile.email.clone()),
                role: profile.role.clone(),
                active: profile.active,
                created_at: Utc::now(),
                phone: profile.phone.clone(),
            },
        );
        Ok(())
    }

    async fn update(&self, id: Uuid, patch: &ProfilePatch) -> Result<(), BackendError> {
        self.record("profiles.update").await;

        // Filtering on a missing id matches zero rows, which is not an error
        let mut state = self.inner.state.write().await;
        if let Some(profile) = state.profiles.get_mut(&id) {
            patch.apply_to(profile);
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), BackendError> {
        self.record("profiles.delete").await;

        self.inner.state.write().await.profiles.remove(&id);
        Ok(())
    }
}
