use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use cookie::Cookie;
use reqwest::StatusCode;

use user_admin_api::backend::{MemoryBackend, SeededUser};
use user_admin_api::config::{AppConfig, BackendKind};
use user_admin_api::state::AppState;

/// Router served on a free local port, backed by an in-memory store
pub struct TestServer {
    pub base_url: String,
    pub backend: MemoryBackend,
    pub client: reqwest::Client,
}

impl TestServer {
    pub async fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let mut config = AppConfig::development();
        config.backend.kind = BackendKind::Memory;
        config.api.enable_request_logging = false;

        let backend = MemoryBackend::new();
        let app = user_admin_api::app(AppState::new(Arc::new(backend.clone()), &config), &config);

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind test listener")?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let server = Self {
            base_url,
            backend,
            client: reqwest::Client::new(),
        };
        server.wait_ready(Duration::from_secs(5)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = self.client.get(self.url("/health")).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Request carrying `user`'s session cookie, split into `fragments` pieces
    pub fn as_user(&self, method: reqwest::Method, path: &str, user: &SeededUser, fragments: usize) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header(reqwest::header::COOKIE, session_cookie(&user.access_token, fragments))
    }
}

/// Session cookie in the browser helpers' JSON format, optionally chunked
pub fn session_cookie(access_token: &str, fragments: usize) -> String {
    let value = format!(r#"{{"access_token":"{}","token_type":"bearer"}}"#, access_token);

    if fragments <= 1 {
        return encoded_cookie("sb-test-auth-token".to_string(), value);
    }

    // Split before encoding so no escape sequence straddles two cookies
    let chars: Vec<char> = value.chars().collect();
    let size = chars.len().div_ceil(fragments);
    chars
        .chunks(size)
        .enumerate()
        .rev()
        .map(|(i, chunk)| encoded_cookie(format!("sb-test-auth-token.{}", i), chunk.iter().collect()))
        .collect::<Vec<_>>()
        .join("; ")
}

fn encoded_cookie(name: String, value: String) -> String {
    Cookie::new(name, value).encoded().to_string()
}
