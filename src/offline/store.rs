//! Named cache partitions holding buffered responses.
//!
//! Two backends: [`MemoryCacheStorage`] for tests and ephemeral hosts, and
//! [`FsCacheStorage`] which keeps one directory per partition and one entry
//! file per key, named by the SHA-256 of the key. An entry file holds the
//! metadata and the body together, so a single rename commits a put.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use super::error::OfflineError;
use super::lock::{rw_read, rw_write};
use super::request::{CacheKey, OfflineResponse};

const SOURCE: &str = "offline::store";

/// The set of partitions.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Return the partition called `name`, creating it if absent.
    async fn open(&self, name: &str) -> Result<Arc<dyn CacheHandle>, OfflineError>;

    /// Names of every stored partition, sorted.
    async fn keys(&self) -> Result<Vec<String>, OfflineError>;

    /// Remove a partition and everything in it. Returns whether it existed.
    async fn delete(&self, name: &str) -> Result<bool, OfflineError>;

    /// Look `key` up in every existing partition, in name order.
    async fn match_any(&self, key: &CacheKey) -> Result<Option<OfflineResponse>, OfflineError> {
        for name in self.keys().await? {
            let cache = self.open(&name).await?;
            if let Some(found) = cache.match_key(key).await? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }
}

/// One partition.
#[async_trait]
pub trait CacheHandle: Send + Sync {
    fn name(&self) -> &str;

    /// Store `response` under `key`, replacing any previous entry.
    async fn put(&self, key: &CacheKey, response: OfflineResponse) -> Result<(), OfflineError>;

    async fn match_key(&self, key: &CacheKey) -> Result<Option<OfflineResponse>, OfflineError>;

    async fn delete(&self, key: &CacheKey) -> Result<bool, OfflineError>;

    async fn len(&self) -> Result<usize, OfflineError>;
}

// ----- memory -----

#[derive(Default)]
pub struct MemoryCacheStorage {
    partitions: RwLock<BTreeMap<String, Arc<MemoryCache>>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, name: &str) -> Result<Arc<dyn CacheHandle>, OfflineError> {
        if let Some(existing) = rw_read(&self.partitions, SOURCE, "open.read").get(name) {
            return Ok(existing.clone());
        }
        let mut partitions = rw_write(&self.partitions, SOURCE, "open.write");
        let cache = partitions
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryCache::new(name)))
            .clone();
        Ok(cache)
    }

    async fn keys(&self) -> Result<Vec<String>, OfflineError> {
        Ok(rw_read(&self.partitions, SOURCE, "keys")
            .keys()
            .cloned()
            .collect())
    }

    async fn delete(&self, name: &str) -> Result<bool, OfflineError> {
        Ok(rw_write(&self.partitions, SOURCE, "delete")
            .remove(name)
            .is_some())
    }
}

pub struct MemoryCache {
    name: String,
    entries: RwLock<HashMap<CacheKey, OfflineResponse>>,
}

impl MemoryCache {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl CacheHandle for MemoryCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn put(&self, key: &CacheKey, response: OfflineResponse) -> Result<(), OfflineError> {
        rw_write(&self.entries, SOURCE, "put").insert(key.clone(), response);
        Ok(())
    }

    async fn match_key(&self, key: &CacheKey) -> Result<Option<OfflineResponse>, OfflineError> {
        Ok(rw_read(&self.entries, SOURCE, "match")
            .get(key)
            .map(OfflineResponse::duplicate))
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool, OfflineError> {
        Ok(rw_write(&self.entries, SOURCE, "delete.entry")
            .remove(key)
            .is_some())
    }

    async fn len(&self) -> Result<usize, OfflineError> {
        Ok(rw_read(&self.entries, SOURCE, "len").len())
    }
}

// ----- filesystem -----

/// Filesystem-backed partitions rooted at a directory.
#[derive(Debug, Clone)]
pub struct FsCacheStorage {
    root: PathBuf,
}

impl FsCacheStorage {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, std::io::Error> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn partition_dir(&self, name: &str) -> Result<PathBuf, OfflineError> {
        let valid = !name.is_empty()
            && !name.starts_with('.')
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(OfflineError::invalid(format!(
                "invalid cache partition name `{name}`"
            )));
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl CacheStorage for FsCacheStorage {
    async fn open(&self, name: &str) -> Result<Arc<dyn CacheHandle>, OfflineError> {
        let dir = self.partition_dir(name)?;
        fs::create_dir_all(&dir).await?;
        Ok(Arc::new(FsCache {
            name: name.to_string(),
            dir,
        }))
    }

    async fn keys(&self) -> Result<Vec<String>, OfflineError> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir()
                && let Some(name) = entry.file_name().to_str()
            {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn delete(&self, name: &str) -> Result<bool, OfflineError> {
        let dir = self.partition_dir(name)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    key: String,
    status: u16,
    headers: Vec<(String, String)>,
}

struct FsCache {
    name: String,
    dir: PathBuf,
}

const ENTRY_EXTENSION: &str = "entry";

impl FsCache {
    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        let digest = Sha256::digest(key.to_string().as_bytes());
        self.dir
            .join(format!("{}.{ENTRY_EXTENSION}", hex::encode(digest)))
    }
}

/// Layout: big-endian `u32` metadata length, metadata JSON, body bytes.
fn encode_entry(meta: &EntryMeta, body: &[u8]) -> Result<Vec<u8>, OfflineError> {
    let meta = serde_json::to_vec(meta)?;
    let len = u32::try_from(meta.len())
        .map_err(|_| OfflineError::storage("cache entry metadata too large"))?;
    let mut out = Vec::with_capacity(4 + meta.len() + body.len());
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(&meta);
    out.extend_from_slice(body);
    Ok(out)
}

fn decode_entry(raw: Vec<u8>) -> Result<(EntryMeta, Bytes), OfflineError> {
    let truncated = || OfflineError::storage("truncated cache entry");
    let (len, rest) = raw.split_first_chunk::<4>().ok_or_else(truncated)?;
    let len = u32::from_be_bytes(*len) as usize;
    if rest.len() < len {
        return Err(truncated());
    }
    let meta: EntryMeta = serde_json::from_slice(&rest[..len])?;
    let body = Bytes::from(raw).slice(4 + len..);
    Ok((meta, body))
}

#[async_trait]
impl CacheHandle for FsCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn put(&self, key: &CacheKey, response: OfflineResponse) -> Result<(), OfflineError> {
        let meta = EntryMeta {
            key: key.to_string(),
            status: response.status,
            headers: response.headers,
        };
        let entry = encode_entry(&meta, &response.body)?;
        write_atomic(&self.entry_path(key), &entry).await?;
        debug!(target: "todolist::offline::store", partition = %self.name, %key, "stored entry");
        Ok(())
    }

    async fn match_key(&self, key: &CacheKey) -> Result<Option<OfflineResponse>, OfflineError> {
        let Some(raw) = read_optional(&self.entry_path(key)).await? else {
            return Ok(None);
        };
        let (meta, body) = decode_entry(raw)?;
        if meta.key != key.to_string() {
            return Ok(None);
        }
        Ok(Some(OfflineResponse::new(meta.status, meta.headers, body)))
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool, OfflineError> {
        remove_optional(&self.entry_path(key)).await
    }

    async fn len(&self) -> Result<usize, OfflineError> {
        let mut count = 0;
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry
                .path()
                .extension()
                .is_some_and(|ext| ext == ENTRY_EXTENSION)
            {
                count += 1;
            }
        }
        Ok(count)
    }
}

/// Write to a sibling temp file then rename over the target.
pub(crate) async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), OfflineError> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| OfflineError::storage(format!("invalid path {}", path.display())))?;
    let temp = path.with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4()));
    fs::write(&temp, contents).await?;
    if let Err(err) = fs::rename(&temp, path).await {
        let _ = fs::remove_file(&temp).await;
        return Err(err.into());
    }
    Ok(())
}

pub(crate) async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, OfflineError> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

pub(crate) async fn remove_optional(path: &Path) -> Result<bool, OfflineError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err.into()),
    }
}
