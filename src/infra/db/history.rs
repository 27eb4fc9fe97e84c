use sqlx::{query, query_as};
use time::OffsetDateTime;

use crate::application::repos::{HistoryRepo, RepoError};
use crate::domain::entities::HistoryRecord;
use crate::domain::types::HistoryKind;

use super::{PostgresRepositories, map_sqlx_error};

#[derive(Debug, sqlx::FromRow)]
struct HistoryRow {
    id: i32,
    user_id: i32,
    kind: String,
    action: String,
    details: Option<String>,
    created_at: OffsetDateTime,
}

impl From<HistoryRow> for HistoryRecord {
    fn from(row: HistoryRow) -> Self {
        HistoryRecord {
            id: row.id,
            user_id: row.user_id,
            kind: row.kind,
            action: row.action,
            details: row.details,
            created_at: row.created_at,
        }
    }
}

#[async_trait::async_trait]
impl HistoryRepo for PostgresRepositories {
    async fn record_history(
        &self,
        user_id: i32,
        kind: HistoryKind,
        action: &str,
        details: Option<&str>,
    ) -> Result<(), RepoError> {
        query("INSERT INTO user_history (user_id, type, action, details) VALUES ($1, $2, $3, $4)")
            .bind(user_id)
            .bind(kind.as_str())
            .bind(action)
            .bind(details)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn list_history(&self, user_id: i32, limit: i64) -> Result<Vec<HistoryRecord>, RepoError> {
        let rows = query_as::<_, HistoryRow>(
            "SELECT id, user_id, type AS kind, action, details, \
             COALESCE(created_at::timestamptz, NOW()) AS created_at \
             FROM user_history WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn clear_history(&self, user_id: i32) -> Result<u64, RepoError> {
        let result = query("DELETE FROM user_history WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }
}
