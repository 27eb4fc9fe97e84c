//! Task list, export and import handlers.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Extension, Query, State};
use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::{IntoResponse, Response};
use todolist_api_types::{ImportResponse, MessageResponse, TaskView};

use crate::application::tasks::{Export, ExportFormat, ImportPayload, TaskError};
use crate::domain::entities::TaskRecord;
use crate::infra::http::middleware::CurrentUser;

use super::task_to_api;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::{ExportQuery, JsonBody, TasksPayload};
use crate::infra::http::api::state::ApiState;

pub async fn list_tasks(
    State(state): State<ApiState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let tasks: Vec<TaskView> = state
        .tasks
        .list(user.id)
        .await
        .map_err(task_to_api)?
        .iter()
        .map(TaskRecord::to_view)
        .collect();
    Ok(Json(tasks))
}

pub async fn save_tasks(
    State(state): State<ApiState>,
    Extension(user): Extension<CurrentUser>,
    JsonBody(payload): JsonBody<TasksPayload>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .tasks
        .replace(user.id, payload.tasks)
        .await
        .map_err(task_to_api)?;
    Ok(Json(MessageResponse::new("Tasks saved")))
}

pub async fn export_tasks(
    State(state): State<ApiState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let format = ExportFormat::parse(query.format.as_deref()).map_err(task_to_api)?;
    let export = state
        .tasks
        .export(user.id, format)
        .await
        .map_err(task_to_api)?;

    let mut response = match export {
        Export::Json(document) => Json(document).into_response(),
        Export::Csv(text) => {
            ([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], text).into_response()
        }
    };
    let disposition = match format {
        ExportFormat::Json => "attachment; filename=\"tasks.json\"",
        ExportFormat::Csv => "attachment; filename=\"tasks.csv\"",
    };
    response.headers_mut().insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static(disposition),
    );
    Ok(response)
}

/// JSON bodies are read as `{tasks}` or a bare array, anything else as CSV.
pub async fn import_tasks(
    State(state): State<ApiState>,
    Extension(user): Extension<CurrentUser>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let payload = import_payload(&headers, &body).map_err(task_to_api)?;
    let imported = state
        .tasks
        .import(user.id, payload)
        .await
        .map_err(task_to_api)?;

    Ok(Json(ImportResponse {
        message: format!("Imported {imported} tasks"),
        imported,
    }))
}

fn import_payload(headers: &HeaderMap, body: &[u8]) -> Result<ImportPayload, TaskError> {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|mime| {
            let mime = mime.trim();
            mime == "application/json" || mime.ends_with("+json")
        })
        .unwrap_or(false);

    if is_json {
        serde_json::from_slice(body)
            .map(ImportPayload::Json)
            .map_err(|err| TaskError::UnreadableImport(err.to_string()))
    } else {
        String::from_utf8(body.to_vec())
            .map(ImportPayload::Csv)
            .map_err(|err| TaskError::UnreadableImport(err.to_string()))
    }
}
