//! Install and activate steps.

use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::try_join_all;
use serde::Serialize;
use tracing::{error, info};

use super::context::WorkerContext;
use super::error::OfflineError;
use super::generation::PartitionKind;
use super::lock::{rw_read, rw_write};
use super::request::OfflineRequest;

const SOURCE: &str = "offline::lifecycle";

/// Assets fetched into the static partition on install.
pub const PREWARM_ASSETS: [&str; 13] = [
    "/",
    "/index.html",
    "/auth.html",
    "/profile.html",
    "/css/index.css",
    "/css/auth.css",
    "/css/profile.css",
    "/js/index.js",
    "/js/auth.js",
    "/js/profile.js",
    "/js/pwa.js",
    "/manifest.json",
    "/offline.html",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Install failed; the previous generation stays in charge.
    Redundant,
}

impl LifecycleState {
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Parsed => "parsed",
            LifecycleState::Installing => "installing",
            LifecycleState::Installed => "installed",
            LifecycleState::Activating => "activating",
            LifecycleState::Activated => "activated",
            LifecycleState::Redundant => "redundant",
        }
    }
}

pub struct Lifecycle {
    state: RwLock<LifecycleState>,
    skip_waiting: AtomicBool,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(LifecycleState::Parsed),
            skip_waiting: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> LifecycleState {
        *rw_read(&self.state, SOURCE, "state")
    }

    fn transition(&self, next: LifecycleState) {
        let mut state = rw_write(&self.state, SOURCE, "transition");
        info!(
            target: "todolist::offline::lifecycle",
            from = state.as_str(),
            to = next.as_str(),
            "lifecycle transition"
        );
        *state = next;
    }

    pub fn skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::SeqCst);
    }

    pub fn skipping_waiting(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Pre-warm the static partition. Every asset must come back 2xx or nothing
/// is stored and the worker becomes redundant.
pub async fn install(ctx: &WorkerContext) -> Result<usize, OfflineError> {
    let lifecycle = ctx.lifecycle();
    lifecycle.transition(LifecycleState::Installing);

    match prewarm(ctx).await {
        Ok(count) => {
            lifecycle.transition(LifecycleState::Installed);
            lifecycle.skip_waiting();
            Ok(count)
        }
        Err(err) => {
            error!(
                target: "todolist::offline::lifecycle",
                generation = %ctx.generation(),
                error = %err,
                "install failed"
            );
            lifecycle.transition(LifecycleState::Redundant);
            Err(err)
        }
    }
}

/// Take over a generation whose static partition already holds every
/// pre-warm asset, without touching the network. Returns `None` when any
/// asset is missing and a full install is needed.
pub async fn resume(ctx: &WorkerContext) -> Result<Option<usize>, OfflineError> {
    let cache = ctx.partition(PartitionKind::Static).await?;
    for asset in PREWARM_ASSETS {
        let key = OfflineRequest::get(ctx.resolve(asset)?).cache_key();
        if cache.match_key(&key).await?.is_none() {
            return Ok(None);
        }
    }

    let lifecycle = ctx.lifecycle();
    lifecycle.transition(LifecycleState::Installed);
    lifecycle.skip_waiting();
    Ok(Some(PREWARM_ASSETS.len()))
}

async fn prewarm(ctx: &WorkerContext) -> Result<usize, OfflineError> {
    let cache = ctx.partition(PartitionKind::Static).await?;

    let fetches = PREWARM_ASSETS.iter().map(|asset| async move {
        let install_failure = |message: String| OfflineError::InstallFailure {
            asset: (*asset).to_string(),
            message,
        };
        let url = ctx.resolve(asset)?;
        let request = OfflineRequest::get(url);
        let response = ctx
            .network()
            .fetch(&request)
            .await
            .map_err(|err| install_failure(err.to_string()))?;
        if !response.is_success() {
            return Err(install_failure(format!("status {}", response.status)));
        }
        Ok((request.cache_key(), response))
    });
    let fetched = try_join_all(fetches).await?;

    let count = fetched.len();
    for (key, response) in fetched {
        cache.put(&key, response).await?;
    }
    Ok(count)
}

/// Delete partitions outside the current generation and take control of
/// open pages. Returns the deleted partition names.
pub async fn activate(ctx: &WorkerContext) -> Result<Vec<String>, OfflineError> {
    let lifecycle = ctx.lifecycle();
    if lifecycle.state() == LifecycleState::Redundant {
        return Err(OfflineError::invalid("cannot activate after a failed install"));
    }
    lifecycle.transition(LifecycleState::Activating);

    let existing = ctx.caches().keys().await?;
    let stale = ctx.generation().stale(&existing);
    for name in &stale {
        ctx.caches().delete(name).await?;
        info!(
            target: "todolist::offline::lifecycle",
            partition = %name,
            "deleted stale partition"
        );
    }

    ctx.clients().claim().await?;
    lifecycle.transition(LifecycleState::Activated);
    Ok(stale)
}
