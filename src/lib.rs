use std::any::Any;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde_json::{json, Value};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

pub mod backend;
pub mod config;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod services;
pub mod session;
pub mod state;

use config::AppConfig;
use error::ApiError;
use state::AppState;

/// Full router: public routes, admin routes and global middleware
pub fn app(state: AppState, config: &AppConfig) -> Router {
    let mut router = Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        // Admin
        .merge(admin_routes())
        .with_state(state)
        .layer(CatchPanicLayer::custom(handle_panic));

    if let Some(cors) = cors_layer(&config.security.cors_origins) {
        router = router.layer(cors);
    }
    if config.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }

    router
}

fn admin_routes() -> Router<AppState> {
    use handlers::admin;

    Router::new().route(
        "/api/admin/users",
        get(admin::users_list)
            .post(admin::users_create)
            .patch(admin::users_update)
            .delete(admin::users_delete),
    )
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return None;
    }

    // Session travels as a cookie, so credentials must be allowed
    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE])
            .allow_credentials(true),
    )
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail: &str = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        *s
    } else {
        "unknown panic payload"
    };
    tracing::error!("Handler panicked: {}", detail);

    ApiError::internal_server_error("Internal server error").into_response()
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "User Admin API",
            "version": version,
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "users": "/api/admin/users (admin session required)",
            }
        }
    }))
}

async fn health() -> impl IntoResponse {
    let now = chrono::Utc::now();

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "data": {
                "status": "ok",
                "timestamp": now,
            }
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryBackend, SeededUser};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_app(backend: &MemoryBackend) -> Router {
        let config = AppConfig::development();
        app(AppState::new(Arc::new(backend.clone()), &config), &config)
    }

    fn request(method: Method, uri: &str, user: Option<&SeededUser>, body: &str) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(header::COOKIE, format!("sb-test-auth-token={}", user.access_token));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    const ROUTES: [(Method, &str); 4] = [
        (Method::GET, "/api/admin/users"),
        (Method::POST, "/api/admin/users"),
        (Method::PATCH, "/api/admin/users"),
        (Method::DELETE, "/api/admin/users?id=00000000-0000-0000-0000-000000000001"),
    ];

    #[tokio::test]
    async fn every_admin_route_requires_session() {
        let backend = MemoryBackend::new();

        for (method, uri) in ROUTES {
            let response = test_app(&backend)
                .oneshot(request(method.clone(), uri, None, "not json"))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{} {}", method, uri);
        }
        assert!(backend.calls().await.is_empty());
    }

    #[tokio::test]
    async fn every_admin_route_requires_admin_role() {
        let backend = MemoryBackend::new();
        let member = backend.seed_user("member@example.com", "user").await;

        for (method, uri) in ROUTES {
            let response = test_app(&backend)
                .oneshot(request(method.clone(), uri, Some(&member), "{}"))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{} {}", method, uri);
        }
    }

    #[tokio::test]
    async fn list_returns_bare_array() {
        let backend = MemoryBackend::new();
        let admin = backend.seed_user("root@example.com", "admin").await;

        let response = test_app(&backend)
            .oneshot(request(Method::GET, "/api/admin/users", Some(&admin), ""))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body.as_array().map(Vec::len), Some(1));
        assert_eq!(body[0]["role"], "admin");
    }

    #[tokio::test]
    async fn delete_without_id_is_rejected_before_any_call() {
        let backend = MemoryBackend::new();
        let admin = backend.seed_user("root@example.com", "admin").await;

        for uri in ["/api/admin/users", "/api/admin/users?id=", "/api/admin/users?id=not-a-uuid"] {
            let response = test_app(&backend)
                .oneshot(request(Method::DELETE, uri, Some(&admin), ""))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
        }
        assert!(backend.calls().await.is_empty());
    }

    #[tokio::test]
    async fn malformed_body_from_admin_is_bad_request() {
        let backend = MemoryBackend::new();
        let admin = backend.seed_user("root@example.com", "admin").await;

        let response = test_app(&backend)
            .oneshot(request(Method::POST, "/api/admin/users", Some(&admin), "{ nope"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "INVALID_JSON");
    }

    #[tokio::test]
    async fn create_returns_success_envelope() {
        let backend = MemoryBackend::new();
        let admin = backend.seed_user("root@example.com", "admin").await;

        let response = test_app(&backend)
            .oneshot(request(
                Method::POST,
                "/api/admin/users",
                Some(&admin),
                r#"{"email":"ada@example.com","password":"pw","name":"Ada"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "success": true }));
        assert!(backend.account_id_for_email("ada@example.com").await.is_some());
    }

    #[tokio::test]
    async fn health_is_public() {
        let backend = MemoryBackend::new();

        let response = test_app(&backend)
            .oneshot(request(Method::GET, "/health", None, ""))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["data"]["status"], "ok");
    }
}
