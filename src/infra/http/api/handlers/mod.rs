//! API handlers organized by area.
//!
//! Each submodule holds the handlers for one route group. Conversions from
//! service errors to [`ApiError`] live here and are shared across modules.

mod admin;
mod auth;
mod pwa;
mod tasks;
mod user;

pub use admin::*;
pub use auth::*;
pub use pwa::*;
pub use tasks::*;
pub use user::*;

use axum::http::StatusCode;

use crate::application::auth::{AuthError, fields};
use crate::application::profile::ProfileError;
use crate::application::repos::RepoError;
use crate::application::tasks::TaskError;
use crate::infra::uploads::UploadStorageError;

use super::error::{ApiError, codes};

pub(crate) fn repo_to_api(err: RepoError) -> ApiError {
    match err {
        RepoError::Duplicate { constraint } => {
            ApiError::new(StatusCode::CONFLICT, codes::DUPLICATE, "Duplicate record")
                .with_detail(constraint)
        }
        RepoError::NotFound => ApiError::not_found("Resource not found"),
        RepoError::InvalidInput { message } => ApiError::bad_request(message),
        RepoError::Integrity { message } => ApiError::new(
            StatusCode::CONFLICT,
            codes::REPO,
            "Integrity constraint violated",
        )
        .with_detail(message),
        RepoError::Timeout => ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::DB_TIMEOUT,
            "Database timeout",
        ),
        RepoError::Persistence(message) => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::REPO,
            "Internal server error",
        )
        .with_detail(message),
    }
}

pub(crate) fn auth_to_api(err: AuthError) -> ApiError {
    match err {
        AuthError::Validation { message, field } => {
            ApiError::validation(message).with_field(field)
        }
        AuthError::EmailTaken => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::DUPLICATE,
            "A user with this email already exists",
        )
        .with_field(fields::REGISTER_EMAIL),
        AuthError::UnknownEmail { field } => {
            ApiError::validation("No user with this email").with_field(field)
        }
        AuthError::WrongPassword => {
            ApiError::validation("Wrong password").with_field(fields::LOGIN_PASSWORD)
        }
        AuthError::InvalidToken => ApiError::forbidden("Invalid token"),
        AuthError::UserNotFound => ApiError::not_found("User not found"),
        AuthError::Hash(detail) | AuthError::Token(detail) => ApiError::internal(detail),
        AuthError::Repo(err) => repo_to_api(err),
    }
}

pub(crate) fn profile_to_api(err: ProfileError) -> ApiError {
    match err {
        ProfileError::Validation(message) => ApiError::validation(message),
        ProfileError::EmailTaken => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::DUPLICATE,
            "Email is already in use",
        ),
        ProfileError::NotFound => ApiError::not_found("User not found"),
        ProfileError::Repo(err) => repo_to_api(err),
    }
}

pub(crate) fn task_to_api(err: TaskError) -> ApiError {
    match err {
        TaskError::NotAnArray => ApiError::validation("Tasks must be an array"),
        err @ TaskError::InvalidTask { .. } => ApiError::validation(err.to_string()),
        err @ (TaskError::UnknownFormat(_) | TaskError::UnreadableImport(_)) => {
            ApiError::bad_request(err.to_string())
        }
        TaskError::UserNotFound => ApiError::not_found("User not found"),
        TaskError::Repo(err) => repo_to_api(err),
    }
}

pub(crate) fn upload_to_api(err: UploadStorageError) -> ApiError {
    match err {
        UploadStorageError::UnsupportedType => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::UNSUPPORTED_MEDIA,
            "Only images are allowed (jpeg, jpg, png, gif)",
        ),
        UploadStorageError::TooLarge { limit } => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::PAYLOAD_TOO_LARGE,
            "File is too large",
        )
        .with_detail(format!("limit {limit} bytes")),
        UploadStorageError::EmptyPayload => ApiError::bad_request("No file uploaded"),
        UploadStorageError::InvalidPath => ApiError::bad_request("Invalid upload path"),
        err @ UploadStorageError::PayloadStream { .. } => {
            ApiError::bad_request("Failed to read upload").with_detail(err.to_string())
        }
        UploadStorageError::Io(err) => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::UPLOAD,
            "Failed to store upload",
        )
        .with_detail(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_keep_field_hints() {
        let err = auth_to_api(AuthError::UnknownEmail {
            field: fields::FORGOT_EMAIL,
        });
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        assert_eq!(
            auth_to_api(AuthError::InvalidToken).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            auth_to_api(AuthError::EmailTaken).code(),
            codes::DUPLICATE
        );
    }

    #[test]
    fn oversized_avatars_are_client_errors() {
        let err = upload_to_api(UploadStorageError::TooLarge { limit: 10 });
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), codes::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn repo_failures_hide_details() {
        let err = repo_to_api(RepoError::Persistence("connection reset".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            repo_to_api(RepoError::Timeout).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
