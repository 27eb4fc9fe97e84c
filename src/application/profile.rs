use std::sync::Arc;

use thiserror::Error;
use todolist_api_types::UpdateProfileRequest;

use crate::application::history::HistoryService;
use crate::application::repos::{RepoError, UpdateProfileParams, UsersRepo};
use crate::domain::entities::UserRecord;
use crate::domain::types::{HistoryKind, actions};
use crate::domain::users;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("{0}")]
    Validation(&'static str),
    #[error("email already in use")]
    EmailTaken,
    #[error("user not found")]
    NotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct ProfileService {
    users: Arc<dyn UsersRepo>,
    history: HistoryService,
}

impl ProfileService {
    pub fn new(users: Arc<dyn UsersRepo>, history: HistoryService) -> Self {
        Self { users, history }
    }

    pub async fn profile(&self, user_id: i32) -> Result<UserRecord, ProfileError> {
        self.users
            .find_user(user_id)
            .await?
            .ok_or(ProfileError::NotFound)
    }

    pub async fn update(
        &self,
        user_id: i32,
        request: UpdateProfileRequest,
    ) -> Result<UserRecord, ProfileError> {
        let (Some(name), Some(email)) = (
            users::required(request.name.as_deref()),
            users::required(request.email.as_deref()),
        ) else {
            return Err(ProfileError::Validation("Name and email are required"));
        };
        if !users::is_valid_email(email) {
            return Err(ProfileError::Validation("Enter a valid email"));
        }
        if self.users.email_in_use(email, Some(user_id)).await? {
            return Err(ProfileError::EmailTaken);
        }

        let user = self
            .users
            .update_profile(UpdateProfileParams {
                id: user_id,
                name: name.to_string(),
                email: email.to_string(),
            })
            .await
            .map_err(|err| match err {
                RepoError::NotFound => ProfileError::NotFound,
                RepoError::Duplicate { .. } => ProfileError::EmailTaken,
                other => ProfileError::Repo(other),
            })?;

        self.history
            .record(user_id, HistoryKind::Profile, actions::PROFILE_UPDATED)
            .await;
        Ok(user)
    }

    /// Point the account at a freshly stored avatar. Returns the previous
    /// avatar path so the caller can remove the old file.
    pub async fn set_avatar(
        &self,
        user_id: i32,
        avatar: &str,
    ) -> Result<Option<String>, ProfileError> {
        let previous = self
            .users
            .replace_avatar(user_id, avatar)
            .await
            .map_err(|err| match err {
                RepoError::NotFound => ProfileError::NotFound,
                other => ProfileError::Repo(other),
            })?;
        self.history
            .record(user_id, HistoryKind::Avatar, actions::AVATAR_CHANGED)
            .await;
        Ok(previous)
    }
}
