//! Task list reads, whole-list writes, statistics and import/export.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;
use todolist_api_types::{ExportDocument, StatisticsView, TaskInput};

use crate::application::history::HistoryService;
use crate::application::repos::{RepoError, TasksRepo, UsersRepo};
use crate::domain::csv;
use crate::domain::entities::TaskRecord;
use crate::domain::tasks::TaskDraft;
use crate::domain::types::{HistoryKind, actions};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("tasks must be an array")]
    NotAnArray,
    #[error("task #{index}: {message}")]
    InvalidTask { index: usize, message: String },
    #[error("unsupported export format `{0}`")]
    UnknownFormat(String),
    #[error("import payload could not be read: {0}")]
    UnreadableImport(String),
    #[error("user not found")]
    UserNotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

impl ExportFormat {
    pub fn parse(value: Option<&str>) -> Result<Self, TaskError> {
        match value.map(str::trim) {
            None | Some("") => Ok(Self::Json),
            Some(raw) if raw.eq_ignore_ascii_case("json") => Ok(Self::Json),
            Some(raw) if raw.eq_ignore_ascii_case("csv") => Ok(Self::Csv),
            Some(other) => Err(TaskError::UnknownFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Export {
    Json(ExportDocument),
    Csv(String),
}

/// Body of an import request.
#[derive(Debug, Clone)]
pub enum ImportPayload {
    /// `{"tasks": [...]}` or a bare array.
    Json(Value),
    Csv(String),
}

/// Validate a JSON task list into drafts, reporting the first bad element.
pub fn drafts_from_value(raw: Value, now: OffsetDateTime) -> Result<Vec<TaskDraft>, TaskError> {
    let Value::Array(items) = raw else {
        return Err(TaskError::NotAnArray);
    };
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let input: TaskInput =
                serde_json::from_value(item).map_err(|err| TaskError::InvalidTask {
                    index,
                    message: err.to_string(),
                })?;
            draft(index, input, now)
        })
        .collect()
}

fn draft(index: usize, input: TaskInput, now: OffsetDateTime) -> Result<TaskDraft, TaskError> {
    TaskDraft::from_input(input, now).map_err(|err| TaskError::InvalidTask {
        index,
        message: err.to_string(),
    })
}

#[derive(Clone)]
pub struct TaskService {
    tasks: Arc<dyn TasksRepo>,
    users: Arc<dyn UsersRepo>,
    history: HistoryService,
}

impl TaskService {
    pub fn new(
        tasks: Arc<dyn TasksRepo>,
        users: Arc<dyn UsersRepo>,
        history: HistoryService,
    ) -> Self {
        Self {
            tasks,
            users,
            history,
        }
    }

    pub async fn list(&self, user_id: i32) -> Result<Vec<TaskRecord>, TaskError> {
        Ok(self.tasks.list_tasks(user_id).await?)
    }

    /// Replace the whole list. Nothing is written unless every element is valid.
    pub async fn replace(&self, user_id: i32, raw: Value) -> Result<usize, TaskError> {
        let drafts = drafts_from_value(raw, OffsetDateTime::now_utc())?;
        let stored = self.tasks.replace_tasks(user_id, &drafts).await?;
        self.history
            .record_with_details(
                user_id,
                HistoryKind::Tasks,
                actions::TASKS_UPDATED,
                Some(&format!("{stored} tasks")),
            )
            .await;
        Ok(stored)
    }

    pub async fn statistics(&self, user_id: i32) -> Result<StatisticsView, TaskError> {
        let today = OffsetDateTime::now_utc().date();
        Ok(self.tasks.task_statistics(user_id, today).await?)
    }

    pub async fn export(&self, user_id: i32, format: ExportFormat) -> Result<Export, TaskError> {
        let tasks: Vec<_> = self
            .tasks
            .list_tasks(user_id)
            .await?
            .iter()
            .map(TaskRecord::to_view)
            .collect();

        match format {
            ExportFormat::Csv => Ok(Export::Csv(csv::export_tasks(&tasks))),
            ExportFormat::Json => {
                let user = self
                    .users
                    .find_user(user_id)
                    .await?
                    .ok_or(TaskError::UserNotFound)?;
                Ok(Export::Json(ExportDocument {
                    user: user.to_view(),
                    tasks,
                    export_date: OffsetDateTime::now_utc(),
                }))
            }
        }
    }

    /// Append imported tasks to the existing list.
    pub async fn import(&self, user_id: i32, payload: ImportPayload) -> Result<usize, TaskError> {
        let now = OffsetDateTime::now_utc();
        let drafts = match payload {
            ImportPayload::Json(value) => {
                let list = match value {
                    Value::Object(mut object) => object.remove("tasks").ok_or_else(|| {
                        TaskError::UnreadableImport("missing `tasks` field".to_string())
                    })?,
                    other => other,
                };
                drafts_from_value(list, now)?
            }
            ImportPayload::Csv(text) => csv::import_tasks(&text)
                .into_iter()
                .enumerate()
                .map(|(index, input)| draft(index, input, now))
                .collect::<Result<Vec<_>, _>>()?,
        };

        let imported = self.tasks.append_tasks(user_id, &drafts).await?;
        self.history
            .record_with_details(
                user_id,
                HistoryKind::Tasks,
                actions::TASKS_IMPORTED,
                Some(&format!("{imported} tasks")),
            )
            .await;
        Ok(imported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn only_arrays_are_task_lists() {
        let now = datetime!(2024-05-10 12:00 UTC);
        assert!(matches!(
            drafts_from_value(json!({"name": "x"}), now),
            Err(TaskError::NotAnArray)
        ));
        assert!(drafts_from_value(json!([]), now).unwrap().is_empty());
    }

    #[test]
    fn first_invalid_element_is_reported() {
        let now = datetime!(2024-05-10 12:00 UTC);
        let err = drafts_from_value(json!([{"name": "ok"}, {"priority": "low"}]), now).unwrap_err();
        match err {
            TaskError::InvalidTask { index, message } => {
                assert_eq!(index, 1);
                assert_eq!(message, "Task name is required");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn export_format_defaults_to_json() {
        assert_eq!(ExportFormat::parse(None).unwrap(), ExportFormat::Json);
        assert_eq!(ExportFormat::parse(Some("CSV")).unwrap(), ExportFormat::Csv);
        assert!(ExportFormat::parse(Some("xml")).is_err());
    }
}
