use std::sync::Arc;

use tracing::warn;

use crate::application::repos::{HistoryRepo, RepoError};
use crate::domain::entities::HistoryRecord;
use crate::domain::types::HistoryKind;

/// Entries returned by the history endpoint.
pub const HISTORY_LIMIT: i64 = 50;

/// Activity history. Recording never fails the surrounding operation.
#[derive(Clone)]
pub struct HistoryService {
    repo: Arc<dyn HistoryRepo>,
}

impl HistoryService {
    pub fn new(repo: Arc<dyn HistoryRepo>) -> Self {
        Self { repo }
    }

    pub async fn record(&self, user_id: i32, kind: HistoryKind, action: &str) {
        self.record_with_details(user_id, kind, action, None).await;
    }

    pub async fn record_with_details(
        &self,
        user_id: i32,
        kind: HistoryKind,
        action: &str,
        details: Option<&str>,
    ) {
        if let Err(err) = self.repo.record_history(user_id, kind, action, details).await {
            warn!(
                target: "todolist::application::history",
                user_id,
                kind = kind.as_str(),
                action,
                error = %err,
                "failed to record history entry"
            );
        }
    }

    pub async fn recent(&self, user_id: i32) -> Result<Vec<HistoryRecord>, RepoError> {
        self.repo.list_history(user_id, HISTORY_LIMIT).await
    }

    pub async fn clear(&self, user_id: i32) -> Result<u64, RepoError> {
        self.repo.clear_history(user_id).await
    }
}
