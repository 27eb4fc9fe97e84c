//! Wire types shared by the todolist server, its offline layer and clients.
//!
//! Field names follow the camelCase JSON the browser pages already speak.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{Date, OffsetDateTime};

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

// ----- users -----

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub avatar: String,
    #[serde(with = "iso_date")]
    pub registration_date: Date,
    pub role: String,
    pub tfa_enabled: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub message: String,
    pub user: UserView,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    pub user: UserView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub user: UserView,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvatarResponse {
    pub avatar: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ----- tasks -----

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub priority: Priority,
    #[serde(with = "iso_date::option", default)]
    pub deadline: Option<Date>,
    pub tags: Vec<String>,
    pub completed: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A task as submitted by a page. Loosely typed so that offline-edited
/// lists with missing fields still round-trip through the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub deadline: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsView {
    pub total: i64,
    pub completed: i64,
    pub active: i64,
    pub overdue: i64,
    pub completion_rate: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntryView {
    pub id: i32,
    #[serde(rename = "type")]
    pub kind: String,
    pub action: String,
    pub details: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub user: UserView,
    pub tasks: Vec<TaskView>,
    #[serde(with = "time::serde::rfc3339")]
    pub export_date: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportResponse {
    pub message: String,
    pub imported: usize,
}

// ----- push & analytics -----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ----- admin -----

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseInitRequest {
    pub drop_existing: bool,
    pub add_test_data: bool,
    pub fix_only: bool,
}

impl Default for DatabaseInitRequest {
    fn default() -> Self {
        Self {
            drop_existing: false,
            add_test_data: true,
            fix_only: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    pub records: i64,
    pub columns: Vec<ColumnInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseStatus {
    pub tables: Vec<TableInfo>,
    pub total_records: i64,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ----- offline envelopes -----

/// Body synthesized for API reads that could be served neither by the
/// network nor by a cached response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineEnvelope {
    pub error: String,
    pub offline: bool,
    pub data: Value,
}

/// Body synthesized for mutations that were queued for later replay.
/// `success` only means "accepted locally"; the replay may still fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedMutation {
    pub success: bool,
    pub message: String,
    pub offline: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_view_uses_camel_case_and_plain_dates() {
        let view = TaskView {
            id: 7,
            name: "Write report".to_string(),
            description: None,
            priority: Priority::High,
            deadline: Some(time::macros::date!(2024 - 05 - 01)),
            tags: vec!["work".to_string()],
            completed: false,
            created_at: time::macros::datetime!(2024-04-01 10:00 UTC),
        };

        let json = serde_json::to_value(&view).expect("serialize task");
        assert_eq!(json["deadline"], "2024-05-01");
        assert_eq!(json["priority"], "high");
        assert_eq!(json["createdAt"], "2024-04-01T10:00:00Z");
    }

    #[test]
    fn database_init_defaults_match_startup_behaviour() {
        let request: DatabaseInitRequest = serde_json::from_str("{}").expect("parse");
        assert!(!request.drop_existing);
        assert!(request.add_test_data);
        assert!(!request.fix_only);
    }

    #[test]
    fn priority_parse_is_lenient_about_case() {
        assert_eq!(Priority::parse(" High "), Some(Priority::High));
        assert_eq!(Priority::parse("urgent"), None);
    }
}
