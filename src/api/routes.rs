//! API Routes
//!
//! Configures the Axum router with all daemon endpoints.

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    delete_handler, entities_handler, get_handler, health_handler, invalidate_handler,
    refresh_handler, set_handler, stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/cache", put(set_handler))
        .route("/cache/invalidate", post(invalidate_handler))
        .route("/cache/:key", get(get_handler).delete(delete_handler))
        .route("/refresh", post(refresh_handler))
        .route("/entities/:view", get(entities_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, MemoryStore, SharedCache, TtlCache};
    use crate::projection::ProjectionStore;
    use crate::refresh::{CoordinatorConfig, RefreshCoordinator};
    use crate::source::InMemorySource;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use std::sync::Arc;
    use std::time::Duration;
    use tower::util::ServiceExt;

    fn create_test_app() -> Router {
        let config = CacheConfig::new(100, Duration::from_secs(300), "routes_test");
        let cache = SharedCache::new(TtlCache::new(config, Arc::new(MemoryStore::new())));
        let coordinator = RefreshCoordinator::start(
            CoordinatorConfig::default(),
            Arc::new(InMemorySource::new("ana")),
            ProjectionStore::shared(),
            Some(cache.clone()),
        );
        create_router(AppState::new(cache, Arc::new(coordinator)))
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_test_app();

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_set_endpoint() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/cache")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"key":"test","value":{"a":1}}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_invalidate_route_is_not_a_key() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/cache/invalidate")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"pattern":"^filtered_"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_get_not_found() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/cache/nonexistent")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_refresh_accepted() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/refresh")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"action":"entity_created"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }
}
