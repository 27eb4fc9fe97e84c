use std::io::ErrorKind;

use axum::{
    Router,
    body::Body,
    extract::{Path, State},
    http::{Method, Request, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use tracing::error;

use crate::application::error::ErrorReport;
use crate::infra::{assets::build_response, uploads::UploadStorageError};

use super::api::{ApiState, error::ApiError};

const AUTH_PAGE: &str = "/auth.html";

/// Page routes, stored uploads and the static directory fallback.
pub fn build_public_router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/check-auth", get(check_auth))
        .route("/_health/db", get(db_health))
        .route("/uploads/{*path}", get(serve_upload))
        .fallback(fallback)
        .with_state(state)
}

async fn index() -> Response {
    (StatusCode::FOUND, [(header::LOCATION, AUTH_PAGE)]).into_response()
}

async fn check_auth(State(state): State<ApiState>) -> Response {
    state.files.serve(AUTH_PAGE).await
}

async fn db_health(State(state): State<ApiState>) -> Response {
    if state.database.ping().await {
        return StatusCode::NO_CONTENT.into_response();
    }
    let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
    ErrorReport::from_message(
        "infra::http::db_health",
        StatusCode::SERVICE_UNAVAILABLE,
        "database ping failed",
    )
    .attach(&mut response);
    response
}

async fn serve_upload(State(state): State<ApiState>, Path(path): Path<String>) -> Response {
    const SOURCE: &str = "infra::http::public::serve_upload";

    match state.uploads.read(&path).await {
        Ok(bytes) => {
            let mime = mime_guess::from_path(&path).first_or_octet_stream();
            build_response(bytes, &mime, "public, max-age=3600")
        }
        Err(UploadStorageError::InvalidPath) => upload_not_found(SOURCE),
        Err(UploadStorageError::Io(err)) if err.kind() == ErrorKind::NotFound => {
            upload_not_found(SOURCE)
        }
        Err(err) => {
            error!(
                target: SOURCE,
                path = %path,
                error = %err,
                "failed to read stored upload"
            );
            let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
            ErrorReport::from_error(SOURCE, StatusCode::INTERNAL_SERVER_ERROR, &err)
                .attach(&mut response);
            response
        }
    }
}

fn upload_not_found(source: &'static str) -> Response {
    let mut response = StatusCode::NOT_FOUND.into_response();
    ErrorReport::from_message(source, StatusCode::NOT_FOUND, "upload not found")
        .attach(&mut response);
    response
}

/// Static files for reads; otherwise JSON 404 under `/api/` and the
/// sign-in page with 404 everywhere else.
async fn fallback(State(state): State<ApiState>, request: Request<Body>) -> Response {
    let path = request.uri().path();

    if path.starts_with("/api/") {
        return ApiError::not_found("Endpoint not found").into_response();
    }

    if matches!(*request.method(), Method::GET | Method::HEAD)
        && let Some(asset) = state.files.load(path).await
    {
        return asset.into_response();
    }

    state
        .files
        .serve_with_status(AUTH_PAGE, StatusCode::NOT_FOUND)
        .await
}
