//! Fetch interception: pick a strategy per request and run it.

use serde_json::Value;
use todolist_api_types::{OfflineEnvelope, QueuedMutation};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::context::WorkerContext;
use super::data::offline_data_for;
use super::error::OfflineError;
use super::generation::PartitionKind;
use super::queue::QueueItem;
use super::request::{CacheKey, OfflineRequest, OfflineResponse};
use super::sync::SYNC_TAG;

pub const OFFLINE_PAGE: &str = "/offline.html";
pub const API_PREFIX: &str = "/api/";
pub const QUEUED_HEADER: &str = "x-offline-queued";
const OFFLINE_MESSAGE: &str = "offline mode";
const QUEUED_MESSAGE: &str = "queued for sync";

const STATIC_SEGMENTS: [&str; 3] = ["/css/", "/js/", "/uploads/"];
const STATIC_EXTENSIONS: [&str; 5] = [".css", ".js", ".png", ".jpg", ".svg"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Other origins: forwarded untouched.
    Passthrough,
    CacheFirst,
    NetworkFirst,
    StaleWhileRevalidate,
    NetworkOnly,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Passthrough => "passthrough",
            Strategy::CacheFirst => "cache_first",
            Strategy::NetworkFirst => "network_first",
            Strategy::StaleWhileRevalidate => "stale_while_revalidate",
            Strategy::NetworkOnly => "network_only",
        }
    }
}

pub fn is_static_asset(path: &str) -> bool {
    STATIC_SEGMENTS.iter().any(|segment| path.contains(segment))
        || STATIC_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

pub fn is_api(path: &str) -> bool {
    path.starts_with(API_PREFIX)
}

/// Classify in priority order: mutation, static asset, API, navigation.
pub fn classify(request: &OfflineRequest, origin: &Url) -> Strategy {
    if !request.same_origin(origin) {
        return Strategy::Passthrough;
    }
    if !request.is_read() {
        return Strategy::NetworkOnly;
    }
    let path = request.path();
    if is_static_asset(path) {
        Strategy::CacheFirst
    } else if is_api(path) {
        Strategy::NetworkFirst
    } else {
        Strategy::StaleWhileRevalidate
    }
}

/// Entry point for every intercepted request.
///
/// Only passthrough and queueing failures surface as errors; every other
/// failure resolves to a cached or synthesized response.
#[instrument(skip_all, fields(method = %request.method, path = %request.url.path()))]
pub async fn handle_fetch(
    ctx: &WorkerContext,
    request: OfflineRequest,
) -> Result<OfflineResponse, OfflineError> {
    let strategy = classify(&request, ctx.origin());
    debug!(target: "todolist::offline::policy", strategy = strategy.as_str(), "intercepted");

    match strategy {
        Strategy::Passthrough => ctx.network().fetch(&request).await,
        Strategy::CacheFirst => Ok(cache_first(ctx, &request).await),
        Strategy::NetworkFirst => Ok(network_first(ctx, &request).await),
        Strategy::StaleWhileRevalidate => Ok(stale_while_revalidate(ctx, request).await.0),
        Strategy::NetworkOnly => network_only(ctx, request).await,
    }
}

pub(crate) async fn cache_first(ctx: &WorkerContext, request: &OfflineRequest) -> OfflineResponse {
    let key = request.cache_key();
    if let Some(hit) = lookup(ctx, PartitionKind::Static, &key).await {
        return hit;
    }

    match ctx.network().fetch(request).await {
        Ok(response) => {
            if response.is_success() {
                store(ctx, PartitionKind::Static, &key, response.duplicate()).await;
            }
            response
        }
        Err(err) => {
            warn!(
                target: "todolist::offline::policy",
                strategy = "cache_first",
                error = %err,
                "network failed with nothing cached"
            );
            offline_page(ctx).await
        }
    }
}

pub(crate) async fn network_first(ctx: &WorkerContext, request: &OfflineRequest) -> OfflineResponse {
    let key = request.cache_key();
    let err = match ctx.network().fetch(request).await {
        Ok(response) => {
            if response.is_success() {
                store(ctx, PartitionKind::Dynamic, &key, response.duplicate()).await;
            }
            return response;
        }
        Err(err) => err,
    };

    debug!(
        target: "todolist::offline::policy",
        strategy = "network_first",
        error = %err,
        "network failed, falling back"
    );

    if let Some(hit) = lookup_any(ctx, &key).await {
        return hit;
    }

    if is_api(request.path()) {
        let data = offline_data_for(ctx.data(), request.path()).await;
        return offline_envelope(data);
    }

    offline_page(ctx).await
}

/// Returns the response plus the background revalidation, if one was
/// spawned. The revalidation runs to completion even if nobody awaits it.
pub(crate) async fn stale_while_revalidate(
    ctx: &WorkerContext,
    request: OfflineRequest,
) -> (OfflineResponse, Option<JoinHandle<()>>) {
    let key = request.cache_key();

    if let Some(hit) = lookup(ctx, PartitionKind::Dynamic, &key).await {
        let ctx = ctx.clone();
        let handle = tokio::spawn(async move {
            match ctx.network().fetch(&request).await {
                Ok(fresh) if fresh.is_success() => {
                    store(&ctx, PartitionKind::Dynamic, &key, fresh).await;
                }
                Ok(fresh) => debug!(
                    target: "todolist::offline::policy",
                    status = fresh.status,
                    "revalidation kept stale entry"
                ),
                Err(err) => debug!(
                    target: "todolist::offline::policy",
                    error = %err,
                    "revalidation failed, stale entry kept"
                ),
            }
        });
        return (hit, Some(handle));
    }

    let response = match ctx.network().fetch(&request).await {
        Ok(response) => {
            if response.is_success() {
                store(ctx, PartitionKind::Dynamic, &key, response.duplicate()).await;
            }
            response
        }
        Err(err) => {
            if let Some(warmed) = lookup_any(ctx, &key).await {
                return (warmed, None);
            }
            warn!(
                target: "todolist::offline::policy",
                strategy = "stale_while_revalidate",
                error = %err,
                "network failed with nothing cached"
            );
            offline_page(ctx).await
        }
    };
    (response, None)
}

pub(crate) async fn network_only(
    ctx: &WorkerContext,
    request: OfflineRequest,
) -> Result<OfflineResponse, OfflineError> {
    let err = match ctx.network().fetch(&request).await {
        Ok(response) => return Ok(response),
        Err(err) if err.is_network_unavailable() => err,
        Err(err) => return Err(err),
    };

    let item = QueueItem::capture(&request);
    let id = item.id;
    ctx.queue().enqueue(item).await?;
    ctx.registrar().register(SYNC_TAG);
    metrics::counter!("todolist_offline_queued_total").increment(1);
    info!(
        target: "todolist::offline::policy",
        id,
        method = %request.method,
        url = %request.url,
        cause = %err,
        "queued mutation for background sync"
    );

    let body = QueuedMutation {
        success: true,
        message: QUEUED_MESSAGE.to_string(),
        offline: true,
    };
    Ok(OfflineResponse::json(200, &body)?.with_header(QUEUED_HEADER, id.to_string()))
}

fn offline_envelope(data: Value) -> OfflineResponse {
    let envelope = OfflineEnvelope {
        error: OFFLINE_MESSAGE.to_string(),
        offline: true,
        data,
    };
    OfflineResponse::json(200, &envelope)
        .unwrap_or_else(|_| OfflineResponse::text(503, OFFLINE_MESSAGE))
}

/// The pre-cached offline page, or a bare 503 when even that is missing.
pub(crate) async fn offline_page(ctx: &WorkerContext) -> OfflineResponse {
    if let Ok(url) = ctx.resolve(OFFLINE_PAGE)
        && let Some(page) = lookup_any(ctx, &CacheKey::get(&url)).await
    {
        return page;
    }
    OfflineResponse::text(503, "You are offline and this page has not been cached.")
}

async fn lookup(ctx: &WorkerContext, kind: PartitionKind, key: &CacheKey) -> Option<OfflineResponse> {
    let found = match ctx.partition(kind).await {
        Ok(cache) => cache.match_key(key).await,
        Err(err) => Err(err),
    };
    record_lookup(key, found)
}

async fn lookup_any(ctx: &WorkerContext, key: &CacheKey) -> Option<OfflineResponse> {
    record_lookup(key, ctx.caches().match_any(key).await)
}

fn record_lookup(
    key: &CacheKey,
    found: Result<Option<OfflineResponse>, OfflineError>,
) -> Option<OfflineResponse> {
    match found {
        Ok(Some(hit)) => {
            metrics::counter!("todolist_offline_cache_hit_total").increment(1);
            debug!(target: "todolist::offline::policy", cache = "offline", outcome = "hit", %key);
            Some(hit)
        }
        Ok(None) => {
            metrics::counter!("todolist_offline_cache_miss_total").increment(1);
            debug!(target: "todolist::offline::policy", cache = "offline", outcome = "miss", %key);
            None
        }
        Err(err) => {
            warn!(
                target: "todolist::offline::policy",
                %key,
                error = %err,
                "cache lookup failed, treating as miss"
            );
            None
        }
    }
}

async fn store(ctx: &WorkerContext, kind: PartitionKind, key: &CacheKey, response: OfflineResponse) {
    let stored = match ctx.partition(kind).await {
        Ok(cache) => cache.put(key, response).await,
        Err(err) => Err(err),
    };
    if let Err(err) = stored {
        warn!(
            target: "todolist::offline::policy",
            %key,
            error = %err,
            "failed to store response"
        );
    }
}
