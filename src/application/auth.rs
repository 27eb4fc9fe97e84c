//! Account registration, sign-in and bearer token handling.

use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use todolist_api_types::{ForgotPasswordRequest, LoginRequest, RegisterRequest};
use tracing::info;

use crate::application::history::HistoryService;
use crate::application::repos::{CreateUserParams, RepoError, UsersRepo};
use crate::domain::entities::UserRecord;
use crate::domain::types::{HistoryKind, actions};
use crate::domain::users;

/// Form field a failure should be shown next to.
pub mod fields {
    pub const REGISTER_NAME: &str = "registerName";
    pub const REGISTER_EMAIL: &str = "registerEmail";
    pub const REGISTER_PASSWORD: &str = "registerPassword";
    pub const LOGIN_EMAIL: &str = "loginEmail";
    pub const LOGIN_PASSWORD: &str = "loginPassword";
    pub const FORGOT_EMAIL: &str = "forgotEmail";
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{message}")]
    Validation {
        message: &'static str,
        field: &'static str,
    },
    #[error("a user with this email already exists")]
    EmailTaken,
    #[error("no user with this email")]
    UnknownEmail { field: &'static str },
    #[error("wrong password")]
    WrongPassword,
    #[error("invalid token")]
    InvalidToken,
    #[error("user not found")]
    UserNotFound,
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("token signing failed: {0}")]
    Token(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl AuthError {
    fn validation(message: &'static str, field: &'static str) -> Self {
        Self::Validation { message, field }
    }
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthError::Hash(err.to_string()))
}

/// False for a mismatch and for a stored hash that cannot be parsed.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub id: i32,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// HS256 signer and verifier for session tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, user: &UserRecord, now: OffsetDateTime) -> Result<String, AuthError> {
        let claims = Claims {
            id: user.id,
            email: user.email.clone(),
            iat: now.unix_timestamp(),
            exp: (now + self.ttl).unix_timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|err| AuthError::Token(err.to_string()))
    }

    pub fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidToken)
    }
}

#[derive(Debug, Clone)]
pub struct SignedIn {
    pub token: String,
    pub user: UserRecord,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UsersRepo>,
    history: HistoryService,
    tokens: TokenIssuer,
}

impl AuthService {
    pub fn new(users: Arc<dyn UsersRepo>, history: HistoryService, tokens: TokenIssuer) -> Self {
        Self {
            users,
            history,
            tokens,
        }
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<UserRecord, AuthError> {
        let name = users::required(request.name.as_deref());
        let email = users::required(request.email.as_deref());
        let password = request.password.as_deref().filter(|value| !value.is_empty());

        let (Some(name), Some(email), Some(password)) = (name, email, password) else {
            let field = if name.is_none() {
                fields::REGISTER_NAME
            } else if email.is_none() {
                fields::REGISTER_EMAIL
            } else {
                fields::REGISTER_PASSWORD
            };
            return Err(AuthError::validation("All fields are required", field));
        };

        if !users::is_valid_password(password) {
            return Err(AuthError::validation(
                "Password must be at least 6 characters",
                fields::REGISTER_PASSWORD,
            ));
        }
        if !users::is_valid_email(email) {
            return Err(AuthError::validation(
                "Enter a valid email",
                fields::REGISTER_EMAIL,
            ));
        }
        if self.users.find_user_by_email(email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = hash_password(password)?;
        let user = self
            .users
            .create_user(CreateUserParams {
                name: name.to_string(),
                email: email.to_string(),
                password_hash,
            })
            .await
            .map_err(|err| match err {
                RepoError::Duplicate { .. } => AuthError::EmailTaken,
                other => AuthError::Repo(other),
            })?;

        self.history
            .record(user.id, HistoryKind::Auth, actions::REGISTERED)
            .await;
        info!(
            target: "todolist::application::auth",
            user_id = user.id,
            "account registered"
        );
        Ok(user)
    }

    pub async fn login(&self, request: LoginRequest) -> Result<SignedIn, AuthError> {
        let email = users::required(request.email.as_deref());
        let password = request.password.as_deref().filter(|value| !value.is_empty());
        let (Some(email), Some(password)) = (email, password) else {
            let field = if email.is_none() {
                fields::LOGIN_EMAIL
            } else {
                fields::LOGIN_PASSWORD
            };
            return Err(AuthError::validation(
                "Email and password are required",
                field,
            ));
        };

        let user = self
            .users
            .find_user_by_email(email)
            .await?
            .ok_or(AuthError::UnknownEmail {
                field: fields::LOGIN_EMAIL,
            })?;

        if !verify_password(password, &user.password_hash) {
            return Err(AuthError::WrongPassword);
        }

        let token = self.tokens.issue(&user, OffsetDateTime::now_utc())?;
        self.history
            .record(user.id, HistoryKind::Auth, actions::SIGNED_IN)
            .await;
        Ok(SignedIn { token, user })
    }

    /// Resolve a bearer token to its current account.
    pub async fn authenticate(&self, token: &str) -> Result<UserRecord, AuthError> {
        let claims = self.tokens.decode(token)?;
        self.users
            .find_user(claims.id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Confirms the account exists. No mail is sent.
    pub async fn forgot_password(&self, request: ForgotPasswordRequest) -> Result<(), AuthError> {
        let Some(email) = users::required(request.email.as_deref()) else {
            return Err(AuthError::validation(
                "Email is required",
                fields::FORGOT_EMAIL,
            ));
        };
        let user = self
            .users
            .find_user_by_email(email)
            .await?
            .ok_or(AuthError::UnknownEmail {
                field: fields::FORGOT_EMAIL,
            })?;
        info!(
            target: "todolist::application::auth",
            user_id = user.id,
            "password reset requested"
        );
        Ok(())
    }
}
