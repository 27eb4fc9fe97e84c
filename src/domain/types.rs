//! Shared domain enumerations and defaults aligned with persisted columns.

use serde::{Deserialize, Serialize};

pub use todolist_api_types::Priority;

pub const DEFAULT_AVATAR: &str = "/placeholder.svg?height=120&width=120";
pub const DEFAULT_ROLE: &str = "user";

/// Category of an activity history entry (`user_history.type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    Auth,
    Profile,
    Avatar,
    Tasks,
}

impl HistoryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            HistoryKind::Auth => "auth",
            HistoryKind::Profile => "profile",
            HistoryKind::Avatar => "avatar",
            HistoryKind::Tasks => "tasks",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "auth" => Some(HistoryKind::Auth),
            "profile" => Some(HistoryKind::Profile),
            "avatar" => Some(HistoryKind::Avatar),
            "tasks" => Some(HistoryKind::Tasks),
            _ => None,
        }
    }
}

/// Fixed history actions written by the services.
pub mod actions {
    pub const REGISTERED: &str = "Account registered";
    pub const SIGNED_IN: &str = "Signed in";
    pub const PROFILE_UPDATED: &str = "Profile updated";
    pub const AVATAR_CHANGED: &str = "Avatar changed";
    pub const TASKS_UPDATED: &str = "Tasks updated";
    pub const TASKS_IMPORTED: &str = "Tasks imported";
}
