pub mod auth;
pub mod broadcasts;
pub mod error;
pub mod middleware;
pub mod notifications;
pub mod users;

use std::sync::Arc;

use axum::{
    Json, Router,
    middleware::from_fn_with_state,
    routing::{get, post, put},
};
use serde_json::json;

use beacon_db::Database;
use beacon_dispatch::Dispatcher;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub dispatcher: Dispatcher,
    pub jwt_secret: String,
}

/// Assemble the full API surface. Everything except /health and the auth
/// endpoints sits behind the bearer-token middleware.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route(
            "/api/broadcasts",
            get(broadcasts::list_broadcasts).post(broadcasts::create_broadcast),
        )
        .route(
            "/api/broadcasts/{id}",
            get(broadcasts::get_broadcast)
                .put(broadcasts::update_broadcast)
                .delete(broadcasts::delete_broadcast),
        )
        .route("/api/broadcasts/{id}/send", post(broadcasts::send_broadcast))
        .route("/api/notifications", get(notifications::list_notifications))
        .route("/api/users/me/device", put(users::register_device))
        .layer(from_fn_with_state(state.clone(), middleware::require_auth))
        .with_state(state);

    public_routes.merge(protected_routes)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
