use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderValue, Request, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use metrics::counter;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::application::auth::AuthError;
use crate::infra::http::middleware::CurrentUser;

use super::error::{ApiError, codes};
use super::state::ApiState;

/// Resolve the bearer token to an account. Missing token is 401, a bad
/// token or a deleted account is 403.
pub async fn require_user(
    State(state): State<ApiState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = extract_token(request.headers().get(header::AUTHORIZATION)) else {
        counter!("todolist_auth_rejected_total", "reason" => "missing").increment(1);
        return ApiError::unauthorized().into_response();
    };

    let user = match state.auth.authenticate(&token).await {
        Ok(user) => user,
        Err(AuthError::InvalidToken) => {
            counter!("todolist_auth_rejected_total", "reason" => "invalid").increment(1);
            return ApiError::forbidden("Invalid token").into_response();
        }
        Err(AuthError::UserNotFound) => {
            counter!("todolist_auth_rejected_total", "reason" => "unknown_user").increment(1);
            return ApiError::forbidden("User not found").into_response();
        }
        Err(err) => {
            return ApiError::internal(err.to_string()).into_response();
        }
    };

    let current = CurrentUser { id: user.id };
    request.extensions_mut().insert(current);
    request.extensions_mut().insert(user);

    let mut response = next.run(request).await;
    response.extensions_mut().insert(current);
    response
}

pub async fn rate_limit(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client = client_key(&request);
    let decision = state.rate_limiter.check(&client);

    if !decision.allowed {
        counter!("todolist_http_rate_limited_total").increment(1);
        warn!(
            target: "todolist::http::rate_limit",
            client = %client,
            path = %request.uri().path(),
            "rate limit exceeded"
        );
        return ApiError::rate_limited(state.rate_limiter.retry_after_secs());
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&state.rate_limiter.limit().to_string()) {
        headers.insert("ratelimit-limit", value);
    }
    if let Ok(value) = HeaderValue::from_str(&decision.remaining.to_string()) {
        headers.insert("ratelimit-remaining", value);
    }
    response
}

/// Gate for the database maintenance routes.
pub async fn require_admin(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(expected) = state.admin_token.as_deref() else {
        debug!(
            target: "todolist::http::admin",
            "admin routes requested without a configured token"
        );
        return ApiError::new(
            axum::http::StatusCode::FORBIDDEN,
            codes::DISABLED,
            "Admin endpoints are disabled",
        )
        .into_response();
    };

    let Some(token) = extract_token(request.headers().get(header::AUTHORIZATION)) else {
        return ApiError::unauthorized().into_response();
    };

    if !bool::from(token.as_bytes().ct_eq(expected.as_bytes())) {
        return ApiError::forbidden("Invalid admin token").into_response();
    }

    next.run(request).await
}

fn client_key(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn extract_token(header: Option<&HeaderValue>) -> Option<String> {
    let raw = header?.to_str().ok()?;
    let bearer = raw.strip_prefix("Bearer ")?.trim();
    (!bearer.is_empty()).then(|| bearer.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_tokens_are_extracted() {
        let value = HeaderValue::from_static("Bearer abc.def.ghi");
        assert_eq!(extract_token(Some(&value)).as_deref(), Some("abc.def.ghi"));

        let basic = HeaderValue::from_static("Basic Zm9vOmJhcg==");
        assert_eq!(extract_token(Some(&basic)), None);

        let empty = HeaderValue::from_static("Bearer ");
        assert_eq!(extract_token(Some(&empty)), None);
        assert_eq!(extract_token(None), None);
    }

    #[test]
    fn client_key_falls_back_without_connect_info() {
        let request = Request::get("/api/user/tasks").body(Body::empty()).unwrap();
        assert_eq!(client_key(&request), "unknown");

        let mut request = Request::get("/api/user/tasks").body(Body::empty()).unwrap();
        let addr: SocketAddr = "192.0.2.7:5000".parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        assert_eq!(client_key(&request), "192.0.2.7");
    }
}
