use axum::extract::FromRequest;
use axum::extract::rejection::JsonRejection;
use serde::Deserialize;
use serde_json::Value;

use super::error::ApiError;

/// `Json` whose rejections use the API error body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::new(
            rejection.status(),
            super::error::codes::BAD_REQUEST,
            "Malformed JSON body",
        )
        .with_detail(rejection.body_text())
    }
}

/// Body of `POST /api/user/tasks`. Validation happens in the service so a
/// missing or non-array `tasks` gets the same message.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TasksPayload {
    pub tasks: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ExportQuery {
    pub format: Option<String>,
}
