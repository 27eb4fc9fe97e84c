use sqlx::{Postgres, Transaction, query, query_as};
use time::{Date, OffsetDateTime};
use todolist_api_types::StatisticsView;
use tracing::warn;

use crate::application::repos::{RepoError, TasksRepo};
use crate::domain::entities::TaskRecord;
use crate::domain::tasks::{TaskDraft, statistics_from_counts};
use crate::domain::types::Priority;

use super::{PostgresRepositories, map_sqlx_error};

#[derive(Debug, sqlx::FromRow)]
struct TaskRow {
    id: i32,
    user_id: i32,
    name: String,
    description: Option<String>,
    priority: Option<String>,
    deadline: Option<Date>,
    tags: Option<Vec<String>>,
    completed: Option<bool>,
    created_at: OffsetDateTime,
}

impl From<TaskRow> for TaskRecord {
    fn from(row: TaskRow) -> Self {
        let priority = match row.priority.as_deref() {
            None => Priority::default(),
            Some(raw) => Priority::parse(raw).unwrap_or_else(|| {
                warn!(
                    target: "todolist::infra::db::tasks",
                    task_id = row.id,
                    priority = raw,
                    "unknown stored priority, using default"
                );
                Priority::default()
            }),
        };
        TaskRecord {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            description: row.description,
            priority,
            deadline: row.deadline,
            tags: row.tags.unwrap_or_default(),
            completed: row.completed.unwrap_or(false),
            created_at: row.created_at,
        }
    }
}

impl PostgresRepositories {
    async fn insert_tasks(
        tx: &mut Transaction<'_, Postgres>,
        user_id: i32,
        tasks: &[TaskDraft],
    ) -> Result<usize, RepoError> {
        for task in tasks {
            query(
                "INSERT INTO tasks (user_id, name, description, priority, deadline, tags, completed, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(user_id)
            .bind(&task.name)
            .bind(&task.description)
            .bind(task.priority.as_str())
            .bind(task.deadline)
            .bind(&task.tags)
            .bind(task.completed)
            .bind(task.created_at)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;
        }
        Ok(tasks.len())
    }
}

#[async_trait::async_trait]
impl TasksRepo for PostgresRepositories {
    async fn list_tasks(&self, user_id: i32) -> Result<Vec<TaskRecord>, RepoError> {
        let rows = query_as::<_, TaskRow>(
            "SELECT id, user_id, name, description, priority, deadline, tags, completed, \
             COALESCE(created_at::timestamptz, NOW()) AS created_at \
             FROM tasks WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn replace_tasks(&self, user_id: i32, tasks: &[TaskDraft]) -> Result<usize, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        query("DELETE FROM tasks WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        let inserted = Self::insert_tasks(&mut tx, user_id, tasks).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(inserted)
    }

    async fn append_tasks(&self, user_id: i32, tasks: &[TaskDraft]) -> Result<usize, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        let inserted = Self::insert_tasks(&mut tx, user_id, tasks).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(inserted)
    }

    async fn task_statistics(
        &self,
        user_id: i32,
        today: Date,
    ) -> Result<StatisticsView, RepoError> {
        let (total, completed, active, overdue): (i64, i64, i64, i64) = query_as(
            "SELECT COUNT(*), \
             COUNT(*) FILTER (WHERE completed = TRUE), \
             COUNT(*) FILTER (WHERE completed IS NOT TRUE), \
             COUNT(*) FILTER (WHERE deadline < $2 AND completed IS NOT TRUE) \
             FROM tasks WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(today)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(statistics_from_counts(total, completed, active, overdue))
    }
}
