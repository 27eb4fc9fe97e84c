//! Background replay of queued mutations.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use super::context::WorkerContext;
use super::error::OfflineError;
use super::lock::mutex_lock;
use super::network::Network;
use super::queue::SyncQueue;

const SOURCE: &str = "offline::sync";

/// Tag registered whenever a mutation is queued.
pub const SYNC_TAG: &str = "background-sync";

/// How queued items are retried.
///
/// Every drain replays every retained item once. There is no attempt limit,
/// no backoff, no ordering guarantee beyond storage order within a pass and
/// no idempotency token, so a mutation that the server processed but whose
/// response was lost will be sent again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RetryPolicy {
    #[default]
    Unlimited,
}

impl RetryPolicy {
    pub fn max_attempts(self) -> Option<u32> {
        match self {
            RetryPolicy::Unlimited => None,
        }
    }

    pub fn backoff(self) -> Duration {
        match self {
            RetryPolicy::Unlimited => Duration::ZERO,
        }
    }

    /// Whether a failed item is tried again before the pass moves on.
    pub fn retries_within_pass(self) -> bool {
        false
    }
}

/// Outcome of one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub attempted: usize,
    pub replayed: usize,
    pub retained: usize,
}

/// Replay every queued item once, in storage order. Items whose replay
/// returned 2xx are removed; everything else stays for the next pass. A
/// storage failure on one item never stops the pass.
pub async fn drain(
    queue: &dyn SyncQueue,
    network: &dyn Network,
    policy: RetryPolicy,
) -> Result<DrainReport, OfflineError> {
    let items = queue.items().await?;
    let mut report = DrainReport::default();

    for item in items {
        report.attempted += 1;

        let outcome = match item.to_request() {
            Ok(request) => network.fetch(&request).await.and_then(|response| {
                if response.is_success() {
                    Ok(())
                } else {
                    Err(OfflineError::QueueReplayFailure {
                        id: item.id,
                        message: format!("server answered {}", response.status),
                    })
                }
            }),
            Err(err) => Err(err),
        };

        match outcome {
            Ok(()) => {
                if let Err(err) = queue.remove(item.id).await {
                    report.retained += 1;
                    error!(
                        target: "todolist::offline::sync",
                        id = item.id,
                        url = %item.url,
                        error = %err,
                        "replayed mutation could not be removed and will be sent again"
                    );
                    continue;
                }
                report.replayed += 1;
                metrics::counter!("todolist_offline_replayed_total").increment(1);
                info!(
                    target: "todolist::offline::sync",
                    id = item.id,
                    method = %item.method,
                    url = %item.url,
                    "replayed queued mutation"
                );
            }
            Err(err) => {
                report.retained += 1;
                metrics::counter!("todolist_offline_replay_failed_total").increment(1);
                warn!(
                    target: "todolist::offline::sync",
                    id = item.id,
                    url = %item.url,
                    max_attempts = ?policy.max_attempts(),
                    error = %err,
                    "queued mutation retained for next sync"
                );
            }
        }
    }

    Ok(report)
}

/// Host hook for "notify me when connectivity returns".
pub trait SyncRegistrar: Send + Sync {
    fn register(&self, tag: &str);
}

/// Tokio implementation of [`SyncRegistrar`]: registrations and page signals
/// wake a loop that drains the queue; the loop also drains on an interval.
#[derive(Default)]
pub struct SyncScheduler {
    notify: Notify,
    tags: Mutex<BTreeSet<String>>,
}

impl SyncScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connectivity restored or a page regained focus.
    pub fn signal(&self) {
        self.notify.notify_one();
    }

    pub fn registered_tags(&self) -> Vec<String> {
        mutex_lock(&self.tags, SOURCE, "registered_tags")
            .iter()
            .cloned()
            .collect()
    }

    /// Drain whenever woken or when `retry_interval` elapses, until
    /// `shutdown` resolves.
    pub async fn run<F>(self: Arc<Self>, context: WorkerContext, retry_interval: Duration, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    debug!(target: "todolist::offline::sync", "sync loop stopping");
                    break;
                }
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep(retry_interval) => {}
            }

            let tags: Vec<String> = std::mem::take(&mut *mutex_lock(&self.tags, SOURCE, "run"))
                .into_iter()
                .collect();
            match context.sync().await {
                Ok(report) if report.attempted > 0 => info!(
                    target: "todolist::offline::sync",
                    ?tags,
                    attempted = report.attempted,
                    replayed = report.replayed,
                    retained = report.retained,
                    "sync pass finished"
                ),
                Ok(_) => {}
                Err(err) => warn!(
                    target: "todolist::offline::sync",
                    error = %err,
                    "sync pass failed"
                ),
            }
        }
    }
}

impl SyncRegistrar for SyncScheduler {
    fn register(&self, tag: &str) {
        mutex_lock(&self.tags, SOURCE, "register").insert(tag.to_string());
        self.notify.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offline::queue::{MemorySyncQueue, QueueItem};
    use crate::offline::request::{OfflineRequest, OfflineResponse};
    use async_trait::async_trait;
    use axum::http::Method;
    use url::Url;

    #[derive(Default)]
    struct RecordingNetwork {
        fail_bodies: Vec<&'static str>,
        seen: Mutex<Vec<(String, String, String)>>,
    }

    #[async_trait]
    impl Network for RecordingNetwork {
        async fn fetch(&self, request: &OfflineRequest) -> Result<OfflineResponse, OfflineError> {
            let body = String::from_utf8_lossy(&request.body).into_owned();
            self.seen.lock().unwrap().push((
                request.method.to_string(),
                request.url.to_string(),
                body.clone(),
            ));
            if self.fail_bodies.contains(&body.as_str()) {
                return Err(OfflineError::network("connection refused"));
            }
            Ok(OfflineResponse::text(200, "ok"))
        }
    }

    fn item(body: &str) -> QueueItem {
        QueueItem::capture(
            &OfflineRequest::new(
                Method::PUT,
                Url::parse("http://localhost:3000/api/user/profile").unwrap(),
            )
            .with_body(body.to_string()),
        )
    }

    #[tokio::test]
    async fn drain_replays_everything_in_storage_order() {
        let queue = MemorySyncQueue::new();
        for body in ["a", "b", "c"] {
            queue.enqueue(item(body)).await.unwrap();
        }
        let network = RecordingNetwork::default();

        let report = drain(&queue, &network, RetryPolicy::default()).await.unwrap();

        assert_eq!(
            report,
            DrainReport {
                attempted: 3,
                replayed: 3,
                retained: 0
            }
        );
        assert_eq!(queue.len().await.unwrap(), 0);
        let seen = network.seen.lock().unwrap();
        let bodies: Vec<&str> = seen.iter().map(|(_, _, body)| body.as_str()).collect();
        assert_eq!(bodies, vec!["a", "b", "c"]);
        assert!(seen.iter().all(|(method, url, _)| {
            method == "PUT" && url == "http://localhost:3000/api/user/profile"
        }));
    }

    #[tokio::test]
    async fn failed_items_are_retained_without_blocking_the_rest() {
        let queue = MemorySyncQueue::new();
        for body in ["a", "b", "c"] {
            queue.enqueue(item(body)).await.unwrap();
        }
        let network = RecordingNetwork {
            fail_bodies: vec!["b"],
            ..Default::default()
        };

        let report = drain(&queue, &network, RetryPolicy::default()).await.unwrap();

        assert_eq!(report.replayed, 2);
        assert_eq!(report.retained, 1);
        let remaining = queue.items().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].body, "b");
        assert_eq!(network.seen.lock().unwrap().len(), 3);
    }

    /// Queue whose `remove` fails for one item.
    struct StuckQueue {
        inner: MemorySyncQueue,
        stuck_body: &'static str,
    }

    #[async_trait]
    impl SyncQueue for StuckQueue {
        async fn enqueue(&self, item: QueueItem) -> Result<(), OfflineError> {
            self.inner.enqueue(item).await
        }

        async fn items(&self) -> Result<Vec<QueueItem>, OfflineError> {
            self.inner.items().await
        }

        async fn remove(&self, id: i64) -> Result<bool, OfflineError> {
            let items = self.inner.items().await?;
            if items
                .iter()
                .any(|item| item.id == id && item.body == self.stuck_body)
            {
                return Err(OfflineError::storage("disk full"));
            }
            self.inner.remove(id).await
        }
    }

    #[tokio::test]
    async fn removal_failures_are_retained_and_the_pass_continues() {
        let queue = StuckQueue {
            inner: MemorySyncQueue::new(),
            stuck_body: "a",
        };
        for body in ["a", "b"] {
            queue.enqueue(item(body)).await.unwrap();
        }
        let network = RecordingNetwork::default();

        let report = drain(&queue, &network, RetryPolicy::default()).await.unwrap();

        assert_eq!(
            report,
            DrainReport {
                attempted: 2,
                replayed: 1,
                retained: 1
            }
        );
        let remaining = queue.items().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].body, "a");
        assert_eq!(network.seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn retry_policy_is_unbounded_and_immediate() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), None);
        assert_eq!(policy.backoff(), Duration::ZERO);
        assert!(!policy.retries_within_pass());
    }

    #[test]
    fn registering_records_the_tag() {
        let scheduler = SyncScheduler::new();
        scheduler.register(SYNC_TAG);
        scheduler.register(SYNC_TAG);
        assert_eq!(scheduler.registered_tags(), vec![SYNC_TAG.to_string()]);
    }
}
