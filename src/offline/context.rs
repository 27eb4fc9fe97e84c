//! Explicit state shared by every offline handler.

use std::sync::Arc;

use tracing::{debug, warn};
use url::Url;

use super::data::{MemoryOfflineData, OfflineDataKind, OfflineDataStore};
use super::error::OfflineError;
use super::generation::{CacheGeneration, PartitionKind};
use super::lifecycle::Lifecycle;
use super::message::{MessageOutcome, WorkerMessage};
use super::network::Network;
use super::push::{Clients, MemoryClients, NotificationCenter, Notifier, PushHandler};
use super::queue::{MemorySyncQueue, SyncQueue};
use super::request::{OfflineRequest, OfflineResponse};
use super::store::{CacheHandle, CacheStorage, MemoryCacheStorage};
use super::sync::{DrainReport, RetryPolicy, SyncRegistrar, SyncScheduler, drain};

/// Cheaply cloneable handle to the layer's collaborators and stores.
#[derive(Clone)]
pub struct WorkerContext {
    inner: Arc<Inner>,
}

struct Inner {
    origin: Url,
    generation: CacheGeneration,
    caches: Arc<dyn CacheStorage>,
    queue: Arc<dyn SyncQueue>,
    data: Arc<dyn OfflineDataStore>,
    network: Arc<dyn Network>,
    registrar: Arc<dyn SyncRegistrar>,
    notifier: Arc<dyn Notifier>,
    clients: Arc<dyn Clients>,
    retry_policy: RetryPolicy,
    lifecycle: Lifecycle,
    drain_lock: tokio::sync::Mutex<()>,
}

impl WorkerContext {
    pub fn builder(origin: Url, network: Arc<dyn Network>) -> WorkerContextBuilder {
        WorkerContextBuilder::new(origin, network)
    }

    /// Origin whose requests are intercepted.
    pub fn origin(&self) -> &Url {
        &self.inner.origin
    }

    pub fn generation(&self) -> &CacheGeneration {
        &self.inner.generation
    }

    pub fn caches(&self) -> &dyn CacheStorage {
        self.inner.caches.as_ref()
    }

    pub fn queue(&self) -> &dyn SyncQueue {
        self.inner.queue.as_ref()
    }

    pub fn data(&self) -> &dyn OfflineDataStore {
        self.inner.data.as_ref()
    }

    pub fn network(&self) -> &dyn Network {
        self.inner.network.as_ref()
    }

    pub fn registrar(&self) -> &dyn SyncRegistrar {
        self.inner.registrar.as_ref()
    }

    pub fn clients(&self) -> &dyn Clients {
        self.inner.clients.as_ref()
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.inner.lifecycle
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.inner.retry_policy
    }

    /// Open one of the current generation's partitions.
    pub async fn partition(&self, kind: PartitionKind) -> Result<Arc<dyn CacheHandle>, OfflineError> {
        self.caches()
            .open(&self.inner.generation.partition(kind))
            .await
    }

    /// Resolve a same-origin path such as `/offline.html`.
    pub fn resolve(&self, path: &str) -> Result<Url, OfflineError> {
        self.inner
            .origin
            .join(path)
            .map_err(|err| OfflineError::invalid(format!("cannot resolve `{path}`: {err}")))
    }

    pub async fn handle_fetch(&self, request: OfflineRequest) -> Result<OfflineResponse, OfflineError> {
        super::policy::handle_fetch(self, request).await
    }

    /// One drain pass. Concurrent callers wait for the running pass.
    pub async fn sync(&self) -> Result<DrainReport, OfflineError> {
        let _guard = self.inner.drain_lock.lock().await;
        drain(self.queue(), self.network(), self.inner.retry_policy).await
    }

    pub fn push(&self) -> PushHandler<'_> {
        PushHandler::new(self.inner.notifier.as_ref(), self.inner.clients.as_ref())
    }

    pub async fn handle_message(&self, message: WorkerMessage) -> Result<MessageOutcome, OfflineError> {
        match message {
            WorkerMessage::SkipWaiting => {
                self.inner.lifecycle.skip_waiting();
                debug!(target: "todolist::offline::context", "skip waiting requested");
                Ok(MessageOutcome::SkipWaiting)
            }
            WorkerMessage::CacheData { key, data } => {
                let Some(kind) = OfflineDataKind::parse(&key) else {
                    warn!(
                        target: "todolist::offline::context",
                        key = %key,
                        "ignoring offline data for unknown key"
                    );
                    return Ok(MessageOutcome::Ignored {
                        reason: format!("unknown offline data key `{key}`"),
                    });
                };
                self.data().save(kind, data).await?;
                Ok(MessageOutcome::Cached { key })
            }
        }
    }
}

pub struct WorkerContextBuilder {
    origin: Url,
    network: Arc<dyn Network>,
    generation: CacheGeneration,
    caches: Option<Arc<dyn CacheStorage>>,
    queue: Option<Arc<dyn SyncQueue>>,
    data: Option<Arc<dyn OfflineDataStore>>,
    registrar: Option<Arc<dyn SyncRegistrar>>,
    notifier: Option<Arc<dyn Notifier>>,
    clients: Option<Arc<dyn Clients>>,
    retry_policy: RetryPolicy,
}

impl WorkerContextBuilder {
    pub fn new(origin: Url, network: Arc<dyn Network>) -> Self {
        Self {
            origin,
            network,
            generation: CacheGeneration::current(),
            caches: None,
            queue: None,
            data: None,
            registrar: None,
            notifier: None,
            clients: None,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn generation(mut self, generation: CacheGeneration) -> Self {
        self.generation = generation;
        self
    }

    pub fn caches(mut self, caches: Arc<dyn CacheStorage>) -> Self {
        self.caches = Some(caches);
        self
    }

    pub fn queue(mut self, queue: Arc<dyn SyncQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn data(mut self, data: Arc<dyn OfflineDataStore>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn registrar(mut self, registrar: Arc<dyn SyncRegistrar>) -> Self {
        self.registrar = Some(registrar);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn clients(mut self, clients: Arc<dyn Clients>) -> Self {
        self.clients = Some(clients);
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Missing collaborators default to in-memory implementations.
    pub fn build(self) -> WorkerContext {
        WorkerContext {
            inner: Arc::new(Inner {
                origin: self.origin,
                generation: self.generation,
                caches: self
                    .caches
                    .unwrap_or_else(|| Arc::new(MemoryCacheStorage::new())),
                queue: self
                    .queue
                    .unwrap_or_else(|| Arc::new(MemorySyncQueue::new())),
                data: self
                    .data
                    .unwrap_or_else(|| Arc::new(MemoryOfflineData::new())),
                network: self.network,
                registrar: self
                    .registrar
                    .unwrap_or_else(|| Arc::new(SyncScheduler::new())),
                notifier: self
                    .notifier
                    .unwrap_or_else(|| Arc::new(NotificationCenter::new())),
                clients: self
                    .clients
                    .unwrap_or_else(|| Arc::new(MemoryClients::new())),
                retry_policy: self.retry_policy,
                lifecycle: Lifecycle::new(),
                drain_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offline::lifecycle::LifecycleState;
    use async_trait::async_trait;
    use serde_json::json;

    struct Offline;

    #[async_trait]
    impl Network for Offline {
        async fn fetch(&self, _request: &OfflineRequest) -> Result<OfflineResponse, OfflineError> {
            Err(OfflineError::network("offline"))
        }
    }

    fn context() -> WorkerContext {
        WorkerContext::builder(
            Url::parse("http://localhost:3000").unwrap(),
            Arc::new(Offline),
        )
        .build()
    }

    #[tokio::test]
    async fn cache_data_message_stores_last_known_tasks() {
        let ctx = context();
        let outcome = ctx
            .handle_message(WorkerMessage::CacheData {
                key: "tasks".to_string(),
                data: json!([{"name": "Buy milk"}]),
            })
            .await
            .unwrap();

        assert_eq!(
            outcome,
            MessageOutcome::Cached {
                key: "tasks".to_string()
            }
        );
        assert_eq!(
            ctx.data().load(OfflineDataKind::Tasks).await.unwrap(),
            Some(json!([{"name": "Buy milk"}]))
        );
    }

    #[tokio::test]
    async fn unknown_cache_key_is_ignored() {
        let ctx = context();
        let outcome = ctx
            .handle_message(WorkerMessage::CacheData {
                key: "settings".to_string(),
                data: json!({}),
            })
            .await
            .unwrap();
        assert!(matches!(outcome, MessageOutcome::Ignored { .. }));
    }

    #[tokio::test]
    async fn skip_waiting_message_is_recorded() {
        let ctx = context();
        assert_eq!(ctx.lifecycle().state(), LifecycleState::Parsed);
        ctx.handle_message(WorkerMessage::SkipWaiting).await.unwrap();
        assert!(ctx.lifecycle().skipping_waiting());
    }

    #[test]
    fn resolve_joins_paths_onto_the_origin() {
        let ctx = context();
        assert_eq!(
            ctx.resolve("/offline.html").unwrap().as_str(),
            "http://localhost:3000/offline.html"
        );
    }
}
