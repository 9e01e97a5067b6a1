use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub backend: BackendConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

/// Which implementation of the identity service and profile store to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum BackendKind {
    /// GoTrue/PostgREST-style HTTP service
    Remote,
    /// Process-local store, for development and tests
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub service_url: Option<String>,
    #[serde(skip_serializing)]
    pub service_key: Option<String>,
    pub profile_table: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub enable_request_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub session_cookie_suffix: String,
    pub admin_role: String,
    pub compensate_failed_create: bool,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid service URL '{0}': {1}")]
    InvalidServiceUrl(String, url::ParseError),
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Backend overrides
        if let Ok(v) = env::var("ADMIN_API_BACKEND") {
            match v.to_ascii_lowercase().as_str() {
                "memory" => self.backend.kind = BackendKind::Memory,
                "remote" => self.backend.kind = BackendKind::Remote,
                other => tracing::warn!("Ignoring unknown ADMIN_API_BACKEND '{}'", other),
            }
        }
        if let Ok(v) = env::var("AUTH_SERVICE_URL") {
            self.backend.service_url = Some(v);
        }
        if let Ok(v) = env::var("AUTH_SERVICE_KEY") {
            self.backend.service_key = Some(v);
        }
        if let Ok(v) = env::var("AUTH_PROFILE_TABLE") {
            self.backend.profile_table = v;
        }

        // API overrides
        if let Some(v) = env::var("ADMIN_API_PORT").ok().or_else(|| env::var("PORT").ok()) {
            self.api.port = v.parse().unwrap_or(self.api.port);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }

        // Security overrides
        if let Ok(v) = env::var("SESSION_COOKIE_SUFFIX") {
            if !v.is_empty() {
                self.security.session_cookie_suffix = v;
            }
        }
        if let Ok(v) = env::var("SECURITY_ADMIN_ROLE") {
            if !v.is_empty() {
                self.security.admin_role = v;
            }
        }
        if let Ok(v) = env::var("SECURITY_COMPENSATE_FAILED_CREATE") {
            self.security.compensate_failed_create =
                v.parse().unwrap_or(self.security.compensate_failed_create);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        self
    }

    /// Check that the selected backend has everything it needs
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend.kind == BackendKind::Remote {
            let service_url = self
                .backend
                .service_url
                .as_deref()
                .ok_or(ConfigError::Missing("AUTH_SERVICE_URL"))?;
            url::Url::parse(service_url)
                .map_err(|e| ConfigError::InvalidServiceUrl(service_url.to_string(), e))?;
            if self.backend.service_key.as_deref().map_or(true, str::is_empty) {
                return Err(ConfigError::Missing("AUTH_SERVICE_KEY"));
            }
        }
        Ok(())
    }

    fn base(environment: Environment) -> Self {
        Self {
            environment,
            backend: BackendConfig {
                kind: BackendKind::Remote,
                service_url: None,
                service_key: None,
                profile_table: "profiles".to_string(),
            },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: true,
            },
            security: SecurityConfig {
                session_cookie_suffix: "-auth-token".to_string(),
                admin_role: "admin".to_string(),
                compensate_failed_create: true,
                cors_origins: Vec::new(),
            },
        }
    }

    pub fn development() -> Self {
        let mut config = Self::base(Environment::Development);
        config.security.cors_origins = vec![
            "http://localhost:3000".to_string(),
            "http://localhost:5173".to_string(),
        ];
        config
    }

    fn staging() -> Self {
        let mut config = Self::base(Environment::Staging);
        config.security.cors_origins = vec!["https://staging.example.com".to_string()];
        config
    }

    fn production() -> Self {
        let mut config = Self::base(Environment::Production);
        config.api.enable_request_logging = false;
        config.security.cors_origins = vec!["https://app.example.com".to_string()];
        config
    }
}

// Global config - read once at startup, then handed to the router by value
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}
