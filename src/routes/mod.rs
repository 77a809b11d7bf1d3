use axum::{routing::get, Router};

use crate::{error::AppError, state::AppState};

pub mod admin;
pub mod health;
pub mod identity;
pub mod reports;

pub fn v1_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/me", get(identity::me))
        .merge(admin::router())
        .merge(reports::router())
        .fallback(not_found)
}

async fn not_found() -> AppError {
    AppError::NotFound("Route not found.".to_string())
}

#[cfg(test)]
mod tests {
    use super::v1_router;
    use crate::{access::Role, auth::sign_token_for_tests, config::AppConfig, state::AppState};
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        Router,
    };
    use tower::ServiceExt;

    #[tokio::test]
    async fn unknown_routes_are_not_found() {
        let state = AppState::build(AppConfig::for_tests()).unwrap();
        let app = Router::new().nest("/api", v1_router()).with_state(state);
        let response = app
            .oneshot(Request::builder().uri("/api/admin/audit").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn stats_require_a_credential() {
        let state = AppState::build(AppConfig::for_tests()).unwrap();
        let app = Router::new().nest("/api", v1_router()).with_state(state);
        let response = app
            .oneshot(Request::builder().uri("/api/admin/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn stats_without_a_database_are_unavailable() {
        let state = AppState::build(AppConfig::for_tests()).unwrap();
        state.role_cache.insert("admin-1".to_string(), Role::Admin).await;
        let token = sign_token_for_tests("test-secret", "admin-1", None);
        let app = Router::new().nest("/api", v1_router()).with_state(state);
        let request = Request::builder()
            .uri("/api/admin/stats")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
