//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use time::Date;
use todolist_api_types::{DatabaseStatus, StatisticsView};

use crate::domain::entities::{HistoryRecord, TaskRecord, UserRecord};
use crate::domain::tasks::TaskDraft;
use crate::domain::types::HistoryKind;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct CreateUserParams {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct UpdateProfileParams {
    pub id: i32,
    pub name: String,
    pub email: String,
}

/// Schema bootstrap switches, mirroring the admin init request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaOptions {
    pub drop_existing: bool,
    pub add_test_data: bool,
    pub fix_only: bool,
}

impl SchemaOptions {
    pub fn fix_only() -> Self {
        Self {
            drop_existing: false,
            add_test_data: false,
            fix_only: true,
        }
    }
}

impl Default for SchemaOptions {
    fn default() -> Self {
        Self {
            drop_existing: false,
            add_test_data: true,
            fix_only: false,
        }
    }
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError>;

    async fn find_user(&self, id: i32) -> Result<Option<UserRecord>, RepoError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError>;

    /// Whether `email` belongs to an account other than `except_id`.
    async fn email_in_use(&self, email: &str, except_id: Option<i32>) -> Result<bool, RepoError>;

    async fn update_profile(&self, params: UpdateProfileParams) -> Result<UserRecord, RepoError>;

    /// Store a new avatar path and return the previous one.
    async fn replace_avatar(&self, id: i32, avatar: &str) -> Result<Option<String>, RepoError>;
}

#[async_trait]
pub trait TasksRepo: Send + Sync {
    /// Newest first.
    async fn list_tasks(&self, user_id: i32) -> Result<Vec<TaskRecord>, RepoError>;

    /// Delete every task of the user and insert `tasks` in one transaction.
    async fn replace_tasks(&self, user_id: i32, tasks: &[TaskDraft]) -> Result<usize, RepoError>;

    async fn append_tasks(&self, user_id: i32, tasks: &[TaskDraft]) -> Result<usize, RepoError>;

    async fn task_statistics(&self, user_id: i32, today: Date)
    -> Result<StatisticsView, RepoError>;
}

#[async_trait]
pub trait HistoryRepo: Send + Sync {
    async fn record_history(
        &self,
        user_id: i32,
        kind: HistoryKind,
        action: &str,
        details: Option<&str>,
    ) -> Result<(), RepoError>;

    /// Newest first, at most `limit` entries.
    async fn list_history(&self, user_id: i32, limit: i64) -> Result<Vec<HistoryRecord>, RepoError>;

    async fn clear_history(&self, user_id: i32) -> Result<u64, RepoError>;
}

#[async_trait]
pub trait PushSubscriptionsRepo: Send + Sync {
    async fn save_subscription(&self, user_id: i32, subscription: &Value) -> Result<(), RepoError>;
}

#[async_trait]
pub trait SchemaRepo: Send + Sync {
    async fn ping(&self) -> Result<(), RepoError>;

    async fn initialize(
        &self,
        options: SchemaOptions,
        test_password_hash: &str,
    ) -> Result<(), RepoError>;

    async fn describe(&self) -> Result<DatabaseStatus, RepoError>;
}
