pub mod api;
pub mod middleware;
mod public;

pub use api::rate_limit::ApiRateLimiter;
pub use api::{ApiState, build_api_router};
pub use public::build_public_router;

use axum::{Router, extract::DefaultBodyLimit, middleware as axum_middleware};

use self::middleware::{log_responses, security_headers, set_request_context};

/// The complete HTTP surface: API, pages, uploads and static files.
pub fn build_router(state: ApiState) -> Router {
    let body_limit = state.body_limit;

    build_api_router(state.clone())
        .merge(build_public_router(state))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(security_headers))
        .layer(axum_middleware::from_fn(set_request_context))
}
