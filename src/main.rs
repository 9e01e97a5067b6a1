use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use user_admin_api::backend::{self, ClientFactory, MemoryBackend};
use user_admin_api::config::{self, BackendKind};
use user_admin_api::state::AppState;

#[derive(Parser)]
#[command(name = "user-admin-api", about = "Admin user management API", version)]
struct Args {
    /// Port to listen on (overrides ADMIN_API_PORT / PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Backend implementation (overrides ADMIN_API_BACKEND)
    #[arg(long, value_enum)]
    backend: Option<BackendKind>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up AUTH_SERVICE_URL, AUTH_SERVICE_KEY, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = config::config().clone();
    if let Some(port) = args.port {
        config.api.port = port;
    }
    if let Some(kind) = args.backend {
        config.backend.kind = kind;
    }
    tracing::info!("Starting User Admin API in {:?} mode with {:?} backend", config.environment, config.backend.kind);

    let factory: Arc<dyn ClientFactory> = match config.backend.kind {
        BackendKind::Memory => Arc::new(seeded_memory_backend().await),
        BackendKind::Remote => backend::factory_from_config(&config).context("invalid backend configuration")?,
    };

    let app = user_admin_api::app(AppState::new(factory, &config), &config);

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("User Admin API listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

/// Development backend with one admin whose session token is logged
async fn seeded_memory_backend() -> MemoryBackend {
    let backend = MemoryBackend::new();
    let email = std::env::var("MEMORY_ADMIN_EMAIL").unwrap_or_else(|_| "admin@localhost".to_string());
    let admin = backend.seed_user(&email, &config::config().security.admin_role).await;

    tracing::warn!(
        "In-memory backend: admin {} ({}) has session token {}",
        email,
        admin.id,
        admin.access_token
    );
    backend
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        // Keep serving; the process can still be stopped externally
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
