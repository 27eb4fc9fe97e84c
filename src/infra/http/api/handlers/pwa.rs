//! Push subscription and install analytics.

use axum::Json;
use axum::extract::{Extension, State};
use axum::response::IntoResponse;
use serde_json::Value;
use todolist_api_types::SuccessResponse;
use tracing::info;

use crate::infra::http::middleware::CurrentUser;

use super::repo_to_api;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::JsonBody;
use crate::infra::http::api::state::ApiState;

pub async fn subscribe_push(
    State(state): State<ApiState>,
    Extension(user): Extension<CurrentUser>,
    JsonBody(subscription): JsonBody<Value>,
) -> Result<impl IntoResponse, ApiError> {
    if !subscription.is_object() {
        return Err(ApiError::validation("Subscription must be an object"));
    }

    state
        .push
        .save_subscription(user.id, &subscription)
        .await
        .map_err(repo_to_api)?;

    let endpoint = subscription
        .get("endpoint")
        .and_then(Value::as_str)
        .unwrap_or("");
    info!(
        target: "todolist::http::push",
        user_id = user.id,
        endpoint,
        "push subscription stored"
    );

    Ok(Json(SuccessResponse {
        success: true,
        message: Some("Subscription saved".to_string()),
    }))
}

/// Unauthenticated usage beacon from the installed app.
pub async fn pwa_analytics(JsonBody(payload): JsonBody<Value>) -> impl IntoResponse {
    info!(
        target: "todolist::http::analytics",
        payload = %payload,
        "pwa analytics"
    );
    Json(SuccessResponse {
        success: true,
        message: None,
    })
}
