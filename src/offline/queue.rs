//! Durable queue of mutations that could not reach the server.
//!
//! Items are written once, read by a drain and deleted when their replay
//! succeeds. They are never updated in place.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use axum::http::Method;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::fs;
use url::Url;

use super::error::OfflineError;
use super::lock::mutex_lock;
use super::request::{OfflineRequest, is_hop_by_hop};
use super::store::{read_optional, remove_optional, write_atomic};

const SOURCE: &str = "offline::queue";

/// Headers left out when a stored item is sent again.
const NOT_REPLAYED: [&str; 2] = ["host", "content-length"];

static LAST_ID: AtomicI64 = AtomicI64::new(0);

/// Unix milliseconds, bumped so ids stay strictly increasing in this process.
fn next_id(now: OffsetDateTime) -> i64 {
    let millis = i64::try_from(now.unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX);
    let previous = LAST_ID
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(millis.max(last.saturating_add(1)))
        })
        .unwrap_or(0);
    millis.max(previous.saturating_add(1))
}

/// A failed mutation captured for replay.
///
/// The body is stored as text, so non-UTF-8 bytes (a binary multipart
/// upload, for instance) are replaced and will not replay faithfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: i64,
    pub url: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    #[serde(with = "time::serde::rfc3339")]
    pub enqueued_at: OffsetDateTime,
}

impl QueueItem {
    /// Capture `request` as it was sent. Header names are lower-cased and
    /// repeated headers are joined with `, `.
    pub fn capture(request: &OfflineRequest) -> Self {
        let now = OffsetDateTime::now_utc();
        let mut headers: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in request.headers.iter().filter(|(name, _)| !is_hop_by_hop(name)) {
            headers
                .entry(name.to_ascii_lowercase())
                .and_modify(|joined| {
                    joined.push_str(", ");
                    joined.push_str(value);
                })
                .or_insert_with(|| value.clone());
        }

        Self {
            id: next_id(now),
            url: request.url.to_string(),
            method: request.method.as_str().to_string(),
            headers,
            body: String::from_utf8_lossy(&request.body).into_owned(),
            enqueued_at: now,
        }
    }

    /// Rebuild the request to replay.
    pub fn to_request(&self) -> Result<OfflineRequest, OfflineError> {
        let url = Url::parse(&self.url)
            .map_err(|err| OfflineError::invalid(format!("queued url `{}`: {err}", self.url)))?;
        let method = Method::from_bytes(self.method.as_bytes())
            .map_err(|err| OfflineError::invalid(format!("queued method: {err}")))?;

        let mut request = OfflineRequest::new(method, url).with_body(self.body.clone());
        for (name, value) in &self.headers {
            if NOT_REPLAYED.contains(&name.as_str()) {
                continue;
            }
            request = request.with_header(name.clone(), value.clone());
        }
        Ok(request)
    }
}

#[async_trait]
pub trait SyncQueue: Send + Sync {
    async fn enqueue(&self, item: QueueItem) -> Result<(), OfflineError>;

    /// Every stored item, in storage order.
    async fn items(&self) -> Result<Vec<QueueItem>, OfflineError>;

    async fn remove(&self, id: i64) -> Result<bool, OfflineError>;

    async fn len(&self) -> Result<usize, OfflineError> {
        Ok(self.items().await?.len())
    }
}

#[derive(Default)]
pub struct MemorySyncQueue {
    items: Mutex<BTreeMap<i64, QueueItem>>,
}

impl MemorySyncQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SyncQueue for MemorySyncQueue {
    async fn enqueue(&self, item: QueueItem) -> Result<(), OfflineError> {
        mutex_lock(&self.items, SOURCE, "enqueue").insert(item.id, item);
        Ok(())
    }

    async fn items(&self) -> Result<Vec<QueueItem>, OfflineError> {
        Ok(mutex_lock(&self.items, SOURCE, "items")
            .values()
            .cloned()
            .collect())
    }

    async fn remove(&self, id: i64) -> Result<bool, OfflineError> {
        Ok(mutex_lock(&self.items, SOURCE, "remove")
            .remove(&id)
            .is_some())
    }

    async fn len(&self) -> Result<usize, OfflineError> {
        Ok(mutex_lock(&self.items, SOURCE, "len").len())
    }
}

/// One JSON file per item, named by id.
#[derive(Debug, Clone)]
pub struct FsSyncQueue {
    root: PathBuf,
}

impl FsSyncQueue {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, std::io::Error> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path(&self, id: i64) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }
}

#[async_trait]
impl SyncQueue for FsSyncQueue {
    async fn enqueue(&self, item: QueueItem) -> Result<(), OfflineError> {
        write_atomic(&self.path(item.id), &serde_json::to_vec(&item)?).await
    }

    async fn items(&self) -> Result<Vec<QueueItem>, OfflineError> {
        let mut ids = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<i64>().ok())
            {
                ids.push(id);
            }
        }
        ids.sort_unstable();

        let mut items = Vec::with_capacity(ids.len());
        for id in ids {
            // Removed by a concurrent drain between listing and reading.
            if let Some(raw) = read_optional(&self.path(id)).await? {
                items.push(serde_json::from_slice(&raw)?);
            }
        }
        Ok(items)
    }

    async fn remove(&self, id: i64) -> Result<bool, OfflineError> {
        remove_optional(&self.path(id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(body: &str) -> OfflineRequest {
        OfflineRequest::new(
            Method::POST,
            Url::parse("http://localhost:3000/api/user/tasks").unwrap(),
        )
        .with_header("Content-Type", "application/json")
        .with_header("Authorization", "Bearer abc")
        .with_header("Connection", "keep-alive")
        .with_body(body.to_string())
    }

    #[test]
    fn ids_are_strictly_increasing() {
        let now = OffsetDateTime::now_utc();
        let first = next_id(now);
        let second = next_id(now);
        let third = next_id(now);
        assert!(first < second && second < third);
    }

    #[test]
    fn capture_keeps_method_url_headers_and_body() {
        let item = QueueItem::capture(&post(r#"{"tasks":[]}"#));
        assert_eq!(item.method, "POST");
        assert_eq!(item.url, "http://localhost:3000/api/user/tasks");
        assert_eq!(item.body, r#"{"tasks":[]}"#);
        assert_eq!(item.headers.get("content-type").unwrap(), "application/json");
        assert_eq!(item.headers.get("authorization").unwrap(), "Bearer abc");
        assert!(!item.headers.contains_key("connection"));

        let replay = item.to_request().unwrap();
        assert_eq!(replay.method, Method::POST);
        assert_eq!(replay.body.as_ref(), br#"{"tasks":[]}"#);
        assert_eq!(replay.header("authorization"), Some("Bearer abc"));
    }

    #[test]
    fn capture_joins_repeated_headers() {
        let request = post("{}")
            .with_header("Accept", "application/json")
            .with_header("accept", "text/plain");
        let item = QueueItem::capture(&request);
        assert_eq!(
            item.headers.get("accept").unwrap(),
            "application/json, text/plain"
        );
        assert_eq!(
            item.to_request().unwrap().header("accept"),
            Some("application/json, text/plain")
        );
    }

    async fn exercise(queue: &dyn SyncQueue) {
        let first = QueueItem::capture(&post("1"));
        let second = QueueItem::capture(&post("2"));
        queue.enqueue(second.clone()).await.unwrap();
        queue.enqueue(first.clone()).await.unwrap();

        let items = queue.items().await.unwrap();
        assert_eq!(items, vec![first.clone(), second.clone()]);
        assert_eq!(queue.len().await.unwrap(), 2);

        assert!(queue.remove(first.id).await.unwrap());
        assert!(!queue.remove(first.id).await.unwrap());
        assert_eq!(queue.items().await.unwrap(), vec![second]);
    }

    #[tokio::test]
    async fn memory_queue_orders_by_id() {
        exercise(&MemorySyncQueue::new()).await;
    }

    #[tokio::test]
    async fn fs_queue_orders_by_id_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        exercise(&FsSyncQueue::new(dir.path()).unwrap()).await;

        let reopened = FsSyncQueue::new(dir.path()).unwrap();
        assert_eq!(reopened.len().await.unwrap(), 1);
    }
}
