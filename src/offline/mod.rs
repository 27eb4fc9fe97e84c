//! Offline layer.
//!
//! Sits between the browser pages and the REST API, the way a service worker
//! would: every request goes through [`policy::handle_fetch`], which serves
//! from a cache partition, forwards to the network (populating a partition on
//! success) or, for mutations that cannot reach the server, records a
//! [`QueueItem`] and answers with a synthesized success body. The sync loop in
//! [`sync`] replays queued items once connectivity returns.
//!
//! All state lives in an explicit [`WorkerContext`]; host collaborators
//! (network, storage, page clients, notification display) are traits so the
//! handlers can be driven with in-memory fakes.

mod data;
mod error;
mod generation;
mod lock;
mod message;
mod network;
mod request;

pub mod context;
pub mod lifecycle;
pub mod policy;
pub mod proxy;
pub mod push;
pub mod queue;
pub mod store;
pub mod sync;

pub use context::{WorkerContext, WorkerContextBuilder};
pub use data::{FsOfflineData, MemoryOfflineData, OfflineDataKind, OfflineDataStore};
pub use error::OfflineError;
pub use generation::{CURRENT_GENERATION, CacheGeneration, PartitionKind};
pub use lifecycle::{Lifecycle, LifecycleState, PREWARM_ASSETS};
pub use message::{MessageOutcome, WorkerMessage};
pub use network::{HttpNetwork, Network};
pub use policy::{Strategy, classify};
pub use proxy::{ProxyState, bootstrap, build_router};
pub use push::{
    ClickOutcome, ClientInfo, Clients, MemoryClients, Notification, NotificationAction,
    NotificationCenter, Notifier, PushHandler,
};
pub use queue::{FsSyncQueue, MemorySyncQueue, QueueItem, SyncQueue};
pub use request::{CacheKey, OfflineRequest, OfflineResponse};
pub use store::{CacheHandle, CacheStorage, FsCacheStorage, MemoryCacheStorage};
pub use sync::{DrainReport, RetryPolicy, SYNC_TAG, SyncRegistrar, SyncScheduler, drain};

/// Describe the counters emitted by the offline layer.
pub fn describe_metrics() {
    metrics::describe_counter!(
        "todolist_offline_cache_hit_total",
        "Requests answered from an offline cache partition"
    );
    metrics::describe_counter!(
        "todolist_offline_cache_miss_total",
        "Cache lookups that found no stored response"
    );
    metrics::describe_counter!(
        "todolist_offline_queued_total",
        "Mutations queued for background replay"
    );
    metrics::describe_counter!(
        "todolist_offline_replayed_total",
        "Queued mutations replayed successfully"
    );
    metrics::describe_counter!(
        "todolist_offline_replay_failed_total",
        "Queued mutation replays that failed and were retained"
    );
}
