pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod rate_limit;
pub mod state;

pub use state::ApiState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{any, get, post},
};

use self::error::ApiError;

/// All `/api/` routes. Every route, the JSON 404 included, counts against
/// the per-client rate limit.
pub fn build_api_router(state: ApiState) -> Router {
    let authenticated = Router::new()
        .route("/api/auth/verify", get(handlers::verify))
        .route(
            "/api/user/profile",
            get(handlers::get_profile).put(handlers::update_profile),
        )
        .route("/api/user/avatar", post(handlers::upload_avatar))
        .route(
            "/api/user/tasks",
            get(handlers::list_tasks).post(handlers::save_tasks),
        )
        .route(
            "/api/user/history",
            get(handlers::get_history).delete(handlers::clear_history),
        )
        .route("/api/user/statistics", get(handlers::statistics))
        .route("/api/user/export", get(handlers::export_tasks))
        .route("/api/user/import", post(handlers::import_tasks))
        .route("/api/push/subscribe", post(handlers::subscribe_push))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_user,
        ));

    let admin = Router::new()
        .route("/api/admin/database/init", post(handlers::init_database))
        .route("/api/admin/database/status", get(handlers::database_status))
        .route("/api/admin/database/fix", post(handlers::fix_database))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_admin,
        ));

    Router::new()
        .route("/api/auth/register", post(handlers::register))
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/forgot-password", post(handlers::forgot_password))
        .route("/api/analytics/pwa", post(handlers::pwa_analytics))
        .merge(authenticated)
        .merge(admin)
        .route("/api/{*rest}", any(endpoint_not_found))
        .with_state(state.clone())
        .layer(axum_middleware::from_fn_with_state(
            state,
            middleware::rate_limit,
        ))
}

async fn endpoint_not_found() -> ApiError {
    ApiError::not_found("Endpoint not found")
}
