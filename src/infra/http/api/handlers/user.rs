//! Profile, avatar, history and statistics handlers.

use axum::Json;
use axum::extract::{Extension, Multipart, State};
use axum::response::IntoResponse;
use futures::TryStreamExt;
use thiserror::Error;
use todolist_api_types::{AvatarResponse, HistoryEntryView, MessageResponse, UpdateProfileRequest};
use tracing::{info, warn};

use crate::application::profile::ProfileError;
use crate::infra::http::middleware::CurrentUser;
use crate::infra::uploads::{UploadStorage, UploadStorageError};

use super::{profile_to_api, repo_to_api, task_to_api, upload_to_api};
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::JsonBody;
use crate::infra::http::api::state::ApiState;

const AVATAR_FIELD: &str = "avatar";

pub async fn get_profile(
    State(state): State<ApiState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state
        .profile
        .profile(user.id)
        .await
        .map_err(profile_to_api)?;
    Ok(Json(record.to_view()))
}

pub async fn update_profile(
    State(state): State<ApiState>,
    Extension(user): Extension<CurrentUser>,
    JsonBody(request): JsonBody<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state
        .profile
        .update(user.id, request)
        .await
        .map_err(profile_to_api)?;
    Ok(Json(record.to_view()))
}

#[derive(Debug, Error)]
pub enum AvatarError {
    #[error("no avatar file in request")]
    Missing,
    #[error("invalid multipart payload: {0}")]
    Multipart(String),
    #[error(transparent)]
    Storage(#[from] UploadStorageError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
}

impl From<AvatarError> for ApiError {
    fn from(err: AvatarError) -> Self {
        match err {
            AvatarError::Missing => ApiError::bad_request("No file uploaded"),
            AvatarError::Multipart(detail) => {
                ApiError::bad_request("Invalid multipart payload").with_detail(detail)
            }
            AvatarError::Storage(err) => upload_to_api(err),
            AvatarError::Profile(err) => profile_to_api(err),
        }
    }
}

pub async fn upload_avatar(
    State(state): State<ApiState>,
    Extension(user): Extension<CurrentUser>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let avatar = replace_avatar(&state, user.id, multipart).await?;
    Ok(Json(AvatarResponse { avatar }))
}

/// Store the uploaded file, point the account at it, then remove the file
/// it replaces. A failed account update removes the new file again.
async fn replace_avatar(
    state: &ApiState,
    user_id: i32,
    mut multipart: Multipart,
) -> Result<String, AvatarError> {
    let stored = loop {
        let Some(field) = multipart
            .next_field()
            .await
            .map_err(|err| AvatarError::Multipart(err.body_text()))?
        else {
            return Err(AvatarError::Missing);
        };
        if field.name() != Some(AVATAR_FIELD) {
            continue;
        }

        let extension =
            UploadStorage::image_extension(field.file_name().unwrap_or_default(), field.content_type())?;
        let chunks = field.map_err(|err| UploadStorageError::PayloadStream {
            source: Box::new(err),
        });
        break state.uploads.store_avatar(&extension, chunks).await?;
    };

    let public_path = stored.public_path();
    let previous = match state.profile.set_avatar(user_id, &public_path).await {
        Ok(previous) => previous,
        Err(err) => {
            let _ = state.uploads.delete_public(&public_path).await;
            return Err(err.into());
        }
    };

    if let Some(previous) = previous.filter(|previous| previous != &public_path)
        && let Err(err) = state.uploads.delete_public(&previous).await
    {
        warn!(
            target: "todolist::http::avatar",
            user_id,
            previous = %previous,
            error = %err,
            "failed to remove replaced avatar"
        );
    }

    info!(
        target: "todolist::http::avatar",
        user_id,
        size_bytes = stored.size_bytes,
        "avatar replaced"
    );
    Ok(public_path)
}

pub async fn get_history(
    State(state): State<ApiState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let entries: Vec<HistoryEntryView> = state
        .history
        .recent(user.id)
        .await
        .map_err(repo_to_api)?
        .iter()
        .map(|entry| entry.to_view())
        .collect();
    Ok(Json(entries))
}

pub async fn clear_history(
    State(state): State<ApiState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    state.history.clear(user.id).await.map_err(repo_to_api)?;
    Ok(Json(MessageResponse::new("History cleared")))
}

pub async fn statistics(
    State(state): State<ApiState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let stats = state
        .tasks
        .statistics(user.id)
        .await
        .map_err(task_to_api)?;
    Ok(Json(stats))
}
