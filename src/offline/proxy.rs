//! Local HTTP host for the offline layer.
//!
//! Every request that is not a control endpoint is rebuilt on the upstream
//! origin and run through [`handle_fetch`](super::policy::handle_fetch).
//! Control endpoints live under `/__offline/`.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{Path, State},
    http::{Request, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::context::WorkerContext;
use super::error::OfflineError;
use super::lifecycle::{self, LifecycleState};
use super::message::WorkerMessage;
use super::push::NotificationCenter;
use super::request::OfflineRequest;
use super::sync::SyncScheduler;
use crate::infra::http::api::error::{ApiError, codes};
use crate::infra::http::middleware::log_responses;

pub const CONTROL_PREFIX: &str = "/__offline";

#[derive(Clone)]
pub struct ProxyState {
    pub context: WorkerContext,
    pub scheduler: Arc<SyncScheduler>,
    pub notifications: Arc<NotificationCenter>,
    pub body_limit: usize,
}

pub fn build_router(state: ProxyState) -> Router {
    Router::new()
        .route("/__offline/sync", post(sync_now))
        .route("/__offline/online", post(online))
        .route("/__offline/push", post(push))
        .route("/__offline/notifications", get(list_notifications))
        .route("/__offline/notifications/{id}/click", post(click_notification))
        .route("/__offline/message", post(message))
        .route("/__offline/status", get(status))
        .fallback(intercept)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
}

/// Install then activate. A generation whose assets are already on disk is
/// resumed without fetching. An install failure aborts before any stale
/// partition is touched.
pub async fn bootstrap(context: &WorkerContext) -> Result<Vec<String>, OfflineError> {
    let (warmed, resumed) = match lifecycle::resume(context).await? {
        Some(count) => (count, true),
        None => (lifecycle::install(context).await?, false),
    };
    let deleted = lifecycle::activate(context).await?;
    info!(
        target: "todolist::offline::proxy",
        generation = %context.generation(),
        warmed,
        resumed,
        deleted = deleted.len(),
        "offline layer active"
    );
    Ok(deleted)
}

impl From<OfflineError> for ApiError {
    fn from(err: OfflineError) -> Self {
        let detail = err.to_string();
        match err {
            OfflineError::NetworkUnavailable { .. } | OfflineError::QueueReplayFailure { .. } => {
                ApiError::new(StatusCode::BAD_GATEWAY, codes::UPSTREAM, "Upstream unavailable")
            }
            OfflineError::Storage { .. } | OfflineError::Serialization(_) => ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                codes::OFFLINE_STORAGE,
                "Offline storage unavailable",
            ),
            OfflineError::InvalidRequest { message } => ApiError::bad_request(message),
            OfflineError::InstallFailure { .. } => ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                codes::OFFLINE_STORAGE,
                "Offline layer is not installed",
            ),
        }
        .with_detail(detail)
    }
}

#[instrument(skip_all, fields(method = %request.method(), path = %request.uri().path()))]
async fn intercept(State(state): State<ProxyState>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();

    let mut url = state.context.origin().clone();
    url.set_path(parts.uri.path());
    url.set_query(parts.uri.query());

    let body = match axum::body::to_bytes(body, state.body_limit).await {
        Ok(bytes) => bytes,
        Err(err) => {
            return ApiError::new(
                StatusCode::PAYLOAD_TOO_LARGE,
                codes::PAYLOAD_TOO_LARGE,
                "Request body too large",
            )
            .with_detail(err.to_string())
            .into_response();
        }
    };

    let mut offline_request = OfflineRequest::new(parts.method, url).with_body(body);
    for (name, value) in &parts.headers {
        if name == axum::http::header::HOST {
            continue;
        }
        if let Ok(value) = value.to_str() {
            offline_request = offline_request.with_header(name.as_str(), value);
        }
    }

    match state.context.handle_fetch(offline_request).await {
        Ok(response) => response.into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

async fn sync_now(State(state): State<ProxyState>) -> Response {
    match state.context.sync().await {
        Ok(report) => Json(report).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

async fn online(State(state): State<ProxyState>) -> Response {
    state.scheduler.signal();
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "scheduled": true })),
    )
        .into_response()
}

async fn push(State(state): State<ProxyState>, body: Bytes) -> Response {
    match state.context.push().on_push(Some(&body)).await {
        Ok(notification) => (StatusCode::CREATED, Json(notification)).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

async fn list_notifications(State(state): State<ProxyState>) -> Response {
    Json(state.notifications.list()).into_response()
}

#[derive(Debug, Default, Deserialize)]
struct ClickRequest {
    action: Option<String>,
}

async fn click_notification(
    State(state): State<ProxyState>,
    Path(id): Path<u64>,
    body: Bytes,
) -> Response {
    let click: ClickRequest = if body.is_empty() {
        ClickRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(click) => click,
            Err(err) => {
                return ApiError::bad_request("Invalid click payload")
                    .with_detail(err.to_string())
                    .into_response();
            }
        }
    };

    let Some(notification) = state.notifications.get(id) else {
        return ApiError::not_found("Notification not found").into_response();
    };

    match state
        .context
        .push()
        .on_click(&notification, click.action.as_deref())
        .await
    {
        Ok(outcome) => Json(outcome).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

async fn message(State(state): State<ProxyState>, body: Bytes) -> Response {
    let message: WorkerMessage = match serde_json::from_slice(&body) {
        Ok(message) => message,
        Err(err) => {
            return ApiError::bad_request("Unrecognized worker message")
                .with_detail(err.to_string())
                .into_response();
        }
    };

    match state.context.handle_message(message).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusView {
    state: LifecycleState,
    generation: String,
    partitions: Vec<String>,
    queue_length: usize,
    skip_waiting: bool,
    sync_tags: Vec<String>,
}

async fn status(State(state): State<ProxyState>) -> Response {
    let context = &state.context;
    let partitions = match context.caches().keys().await {
        Ok(keys) => keys,
        Err(err) => return ApiError::from(err).into_response(),
    };
    let queue_length = match context.queue().len().await {
        Ok(len) => len,
        Err(err) => return ApiError::from(err).into_response(),
    };

    Json(StatusView {
        state: context.lifecycle().state(),
        generation: context.generation().version().to_string(),
        partitions,
        queue_length,
        skip_waiting: context.lifecycle().skipping_waiting(),
        sync_tags: state.scheduler.registered_tags(),
    })
    .into_response()
}
