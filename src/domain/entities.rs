//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::{Date, OffsetDateTime};
use todolist_api_types::{HistoryEntryView, TaskView, UserView};

use crate::domain::types::Priority;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub avatar: String,
    pub registration_date: Date,
    pub role: String,
    pub tfa_enabled: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl UserRecord {
    pub fn to_view(&self) -> UserView {
        UserView {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            avatar: self.avatar.clone(),
            registration_date: self.registration_date,
            role: self.role.clone(),
            tfa_enabled: self.tfa_enabled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskRecord {
    pub id: i32,
    pub user_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub deadline: Option<Date>,
    pub tags: Vec<String>,
    pub completed: bool,
    pub created_at: OffsetDateTime,
}

impl TaskRecord {
    pub fn to_view(&self) -> TaskView {
        TaskView {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            priority: self.priority,
            deadline: self.deadline,
            tags: self.tags.clone(),
            completed: self.completed,
            created_at: self.created_at,
        }
    }

    /// Past its deadline and still open.
    pub fn is_overdue(&self, today: Date) -> bool {
        !self.completed && self.deadline.is_some_and(|deadline| deadline < today)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryRecord {
    pub id: i32,
    pub user_id: i32,
    pub kind: String,
    pub action: String,
    pub details: Option<String>,
    pub created_at: OffsetDateTime,
}

impl HistoryRecord {
    pub fn to_view(&self) -> HistoryEntryView {
        HistoryEntryView {
            id: self.id,
            kind: self.kind.clone(),
            action: self.action.clone(),
            details: self.details.clone(),
            timestamp: self.created_at,
        }
    }
}
