use sqlx::query_as;
use time::{Date, OffsetDateTime};

use crate::application::repos::{CreateUserParams, RepoError, UpdateProfileParams, UsersRepo};
use crate::domain::entities::UserRecord;
use crate::domain::types::{DEFAULT_AVATAR, DEFAULT_ROLE};

use super::{PostgresRepositories, map_sqlx_error};

// Columns added by the structure fix may be NULL on legacy rows.
const USER_COLUMNS: &str = "id, name, email, password AS password_hash, \
    COALESCE(avatar, '') AS avatar, \
    COALESCE(registration_date, CURRENT_DATE) AS registration_date, \
    COALESCE(role, '') AS role, \
    COALESCE(tfa_enabled, FALSE) AS tfa_enabled, \
    COALESCE(created_at::timestamptz, NOW()) AS created_at, \
    COALESCE(updated_at::timestamptz, NOW()) AS updated_at";

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i32,
    name: String,
    email: String,
    password_hash: String,
    avatar: String,
    registration_date: Date,
    role: String,
    tfa_enabled: bool,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        UserRecord {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            avatar: if row.avatar.is_empty() {
                DEFAULT_AVATAR.to_string()
            } else {
                row.avatar
            },
            registration_date: row.registration_date,
            role: if row.role.is_empty() {
                DEFAULT_ROLE.to_string()
            } else {
                row.role
            },
            tfa_enabled: row.tfa_enabled,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait::async_trait]
impl UsersRepo for PostgresRepositories {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let sql = format!(
            "INSERT INTO users (name, email, password) VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
        );
        let row = query_as::<_, UserRow>(&sql)
            .bind(params.name)
            .bind(params.email)
            .bind(params.password_hash)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn find_user(&self, id: i32) -> Result<Option<UserRecord>, RepoError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(Into::into))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(Into::into))
    }

    async fn email_in_use(&self, email: &str, except_id: Option<i32>) -> Result<bool, RepoError> {
        let (exists,): (bool,) = query_as(
            "SELECT EXISTS (SELECT 1 FROM users WHERE email = $1 AND ($2::int IS NULL OR id <> $2))",
        )
        .bind(email)
        .bind(except_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(exists)
    }

    async fn update_profile(&self, params: UpdateProfileParams) -> Result<UserRecord, RepoError> {
        let sql = format!(
            "UPDATE users SET name = $2, email = $3, updated_at = CURRENT_TIMESTAMP \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let row = query_as::<_, UserRow>(&sql)
            .bind(params.id)
            .bind(params.name)
            .bind(params.email)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .ok_or(RepoError::NotFound)?;
        Ok(row.into())
    }

    async fn replace_avatar(&self, id: i32, avatar: &str) -> Result<Option<String>, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let previous: Option<(Option<String>,)> =
            query_as("SELECT avatar FROM users WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        let Some((previous,)) = previous else {
            return Err(RepoError::NotFound);
        };

        sqlx::query("UPDATE users SET avatar = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $1")
            .bind(id)
            .bind(avatar)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(previous)
    }
}
