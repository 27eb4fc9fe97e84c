//! Database maintenance endpoints behind the admin token.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use todolist_api_types::{DatabaseInitRequest, OperationResult};

use crate::application::error::ErrorReport;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::state::ApiState;

const SOURCE: &str = "infra::http::api::admin";

/// An empty body means the startup defaults.
pub async fn init_database(State(state): State<ApiState>, body: Bytes) -> Result<Response, ApiError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        DatabaseInitRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|err| {
            ApiError::bad_request("Malformed JSON body").with_detail(err.to_string())
        })?
    };

    let result = state.database.initialize(request.into()).await;
    Ok(operation_response(result))
}

pub async fn database_status(State(state): State<ApiState>) -> Response {
    let status = state.database.status().await;
    if status.status == "error" {
        let mut response = (StatusCode::INTERNAL_SERVER_ERROR, Json(&status)).into_response();
        ErrorReport::from_message(
            SOURCE,
            StatusCode::INTERNAL_SERVER_ERROR,
            status.error.clone().unwrap_or_default(),
        )
        .attach(&mut response);
        return response;
    }
    Json(status).into_response()
}

pub async fn fix_database(State(state): State<ApiState>) -> Response {
    operation_response(state.database.fix().await)
}

fn operation_response(result: OperationResult) -> Response {
    if result.success {
        return Json(result).into_response();
    }
    let detail = result.error.clone().unwrap_or_default();
    let mut response = (StatusCode::INTERNAL_SERVER_ERROR, Json(result)).into_response();
    ErrorReport::from_message(SOURCE, StatusCode::INTERNAL_SERVER_ERROR, detail)
        .attach(&mut response);
    response
}
