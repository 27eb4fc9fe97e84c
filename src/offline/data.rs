//! Last-known task list and profile, written by pages while online and read
//! back when an API call has neither network nor cached response.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::error::OfflineError;
use super::lock::{rw_read, rw_write};
use super::store::{read_optional, write_atomic};

const SOURCE: &str = "offline::data";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OfflineDataKind {
    Tasks,
    Profile,
}

impl OfflineDataKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OfflineDataKind::Tasks => "tasks",
            OfflineDataKind::Profile => "profile",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "tasks" => Some(OfflineDataKind::Tasks),
            "profile" => Some(OfflineDataKind::Profile),
            _ => None,
        }
    }

    /// Which stored record answers an API path, if any.
    pub fn for_path(path: &str) -> Option<Self> {
        if path.contains("/api/user/tasks") {
            Some(OfflineDataKind::Tasks)
        } else if path.contains("/api/user/profile") {
            Some(OfflineDataKind::Profile)
        } else {
            None
        }
    }

    pub fn empty(self) -> Value {
        match self {
            OfflineDataKind::Tasks => json!([]),
            OfflineDataKind::Profile => json!({}),
        }
    }
}

#[async_trait]
pub trait OfflineDataStore: Send + Sync {
    async fn load(&self, kind: OfflineDataKind) -> Result<Option<Value>, OfflineError>;

    async fn save(&self, kind: OfflineDataKind, data: Value) -> Result<(), OfflineError>;
}

/// Data to embed in an offline envelope for `path`. Lookup failures fall back
/// to the empty default.
pub(crate) async fn offline_data_for(store: &dyn OfflineDataStore, path: &str) -> Value {
    let Some(kind) = OfflineDataKind::for_path(path) else {
        return json!([]);
    };
    match store.load(kind).await {
        Ok(Some(value)) => value,
        Ok(None) => kind.empty(),
        Err(err) => {
            tracing::error!(
                target: "todolist::offline::data",
                kind = kind.as_str(),
                error = %err,
                "failed to read offline data"
            );
            kind.empty()
        }
    }
}

#[derive(Default)]
pub struct MemoryOfflineData {
    records: RwLock<HashMap<OfflineDataKind, Value>>,
}

impl MemoryOfflineData {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OfflineDataStore for MemoryOfflineData {
    async fn load(&self, kind: OfflineDataKind) -> Result<Option<Value>, OfflineError> {
        Ok(rw_read(&self.records, SOURCE, "load").get(&kind).cloned())
    }

    async fn save(&self, kind: OfflineDataKind, data: Value) -> Result<(), OfflineError> {
        rw_write(&self.records, SOURCE, "save").insert(kind, data);
        Ok(())
    }
}

/// One JSON file per record under a directory.
#[derive(Debug, Clone)]
pub struct FsOfflineData {
    root: PathBuf,
}

impl FsOfflineData {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, std::io::Error> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path(&self, kind: OfflineDataKind) -> PathBuf {
        self.root.join(format!("{}.json", kind.as_str()))
    }
}

#[async_trait]
impl OfflineDataStore for FsOfflineData {
    async fn load(&self, kind: OfflineDataKind) -> Result<Option<Value>, OfflineError> {
        match read_optional(&self.path(kind)).await? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, kind: OfflineDataKind, data: Value) -> Result<(), OfflineError> {
        write_atomic(&self.path(kind), &serde_json::to_vec(&data)?).await
    }
}
