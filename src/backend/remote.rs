use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use url::Url;
use uuid::Uuid;

use super::{
    AdminClients, BackendError, ClientFactory, IdentityService, IdentityUser, NewAccount, NewProfile, Profile,
    ProfilePatch, ProfileStore,
};
use crate::config::{BackendConfig, ConfigError};

/// Shared connection settings; one per process, cloned into each request's clients
struct Connection {
    http: reqwest::Client,
    base_url: Url,
    service_key: String,
    profile_table: String,
}

pub struct RemoteClientFactory {
    connection: Arc<Connection>,
}

impl RemoteClientFactory {
    pub fn new(base_url: &str, service_key: impl Into<String>, profile_table: impl Into<String>) -> Result<Self, ConfigError> {
        let mut base = Url::parse(base_url).map_err(|e| ConfigError::InvalidServiceUrl(base_url.to_string(), e))?;
        // Url::join drops the last path segment unless it ends with a slash
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self {
            connection: Arc::new(Connection {
                http: reqwest::Client::new(),
                base_url: base,
                service_key: service_key.into(),
                profile_table: profile_table.into(),
            }),
        })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self, ConfigError> {
        let service_url = config
            .service_url
            .as_deref()
            .ok_or(ConfigError::Missing("AUTH_SERVICE_URL"))?;
        let service_key = config
            .service_key
            .clone()
            .ok_or(ConfigError::Missing("AUTH_SERVICE_KEY"))?;
        Self::new(service_url, service_key, config.profile_table.clone())
    }
}

impl ClientFactory for RemoteClientFactory {
    fn admin_clients(&self) -> AdminClients {
        AdminClients {
            identity: Arc::new(RemoteIdentity {
                connection: self.connection.clone(),
            }),
            profiles: Arc::new(RemoteProfiles {
                connection: self.connection.clone(),
            }),
        }
    }
}

impl Connection {
    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        self.base_url
            .join(path)
            .map_err(|e| BackendError::Transport(format!("invalid endpoint '{}': {}", path, e)))
    }

    fn profiles_endpoint(&self) -> Result<Url, BackendError> {
        self.endpoint(&format!("rest/v1/{}", self.profile_table))
    }

    /// Request authenticated with the service key
    fn privileged(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, BackendError> {
        let response = request
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(status, &body);
        tracing::debug!("Identity service rejected request with {}: {}", status, message);
        Err(BackendError::rejected(status.as_u16(), message))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BackendError> {
        self.send(request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }
}

/// Pull a human readable message out of an error body.
///
/// The auth API uses `msg` or `error_description`, the table API uses
/// `message`; `error` is the last resort.
pub(crate) fn error_message(status: StatusCode, body: &str) -> String {
    let parsed = serde_json::from_str::<Value>(body).ok();
    let from_body = parsed.as_ref().and_then(|value| {
        ["msg", "message", "error_description", "error"]
            .iter()
            .find_map(|key| value.get(*key).and_then(Value::as_str))
            .filter(|message| !message.is_empty())
            .map(str::to_string)
    });

    from_body.unwrap_or_else(|| match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    })
}

fn id_filter(url: &mut Url, id: Uuid) {
    url.query_pairs_mut().append_pair("id", &format!("eq.{}", id));
}

struct RemoteIdentity {
    connection: Arc<Connection>,
}

#[async_trait]
impl IdentityService for RemoteIdentity {
    async fn user_for_token(&self, access_token: &str) -> Result<IdentityUser, BackendError> {
        let conn = &self.connection;
        let request = conn
            .http
            .get(conn.endpoint("auth/v1/user")?)
            .header("apikey", &conn.service_key)
            .bearer_auth(access_token);
        conn.send_json(request).await
    }

    async fn create_user(&self, account: &NewAccount) -> Result<IdentityUser, BackendError> {
        let conn = &self.connection;
        let body = json!({
            "email": account.email,
            "password": account.password,
            "email_confirm": true,
            "user_metadata": {
                "full_name": account.full_name,
                "role": account.role,
                "phone": account.phone,
            }
        });
        let request = conn
            .privileged(Method::POST, conn.endpoint("auth/v1/admin/users")?)
            .json(&body);
        conn.send_json(request).await
    }

    async fn update_password(&self, id: Uuid, password: &str) -> Result<(), BackendError> {
        let conn = &self.connection;
        let request = conn
            .privileged(Method::PUT, conn.endpoint(&format!("auth/v1/admin/users/{}", id))?)
            .json(&json!({ "password": password }));
        conn.send(request).await.map(|_| ())
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), BackendError> {
        let conn = &self.connection;
        let request = conn.privileged(Method::DELETE, conn.endpoint(&format!("auth/v1/admin/users/{}", id))?);
        conn.send(request).await.map(|_| ())
    }
}

struct RemoteProfiles {
    connection: Arc<Connection>,
}

#[derive(Deserialize)]
struct RoleRow {
    role: Option<String>,
}

#[async_trait]
impl ProfileStore for RemoteProfiles {
    async fn role_of(&self, id: Uuid) -> Result<Option<String>, BackendError> {
        let conn = &self.connection;
        let mut url = conn.profiles_endpoint()?;
        url.query_pairs_mut().append_pair("select", "role");
        id_filter(&mut url, id);

        let rows: Vec<RoleRow> = conn.send_json(conn.privileged(Method::GET, url)).await?;
        Ok(rows.into_iter().next().and_then(|row| row.role))
    }

    async fn list_newest_first(&self) -> Result<Vec<Profile>, BackendError> {
        let conn = &self.connection;
        let mut url = conn.profiles_endpoint()?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("order", "created_at.desc");

        conn.send_json(conn.privileged(Method::GET, url)).await
    }

    async fn insert(&self, profile: &NewProfile) -> Result<(), BackendError> {
        let conn = &self.connection;
        let request = conn
            .privileged(Method::POST, conn.profiles_endpoint()?)
            .header("Prefer", "return=minimal")
            .json(profile);
        conn.send(request).await.map(|_| ())
    }

    async fn update(&self, id: Uuid, patch: &ProfilePatch) -> Result<(), BackendError> {
        let conn = &self.connection;
        let mut url = conn.profiles_endpoint()?;
        id_filter(&mut url, id);

        let request = conn
            .privileged(Method::PATCH, url)
            .header("Prefer", "return=minimal")
            .json(patch);
        conn.send(request).await.map(|_| ())
    }

    async fn delete(&self, id: Uuid) -> Result<(), BackendError> {
        let conn = &self.connection;
        let mut url = conn.profiles_endpoint()?;
        id_filter(&mut url, id);

        conn.send(conn.privileged(Method::DELETE, url)).await.map(|_| ())
    }
}
