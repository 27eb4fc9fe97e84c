//! Registration, sign-in and token verification.

use axum::Json;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use todolist_api_types::{
    ForgotPasswordRequest, LoginRequest, LoginResponse, MessageResponse, RegisterRequest,
    RegisterResponse, VerifyResponse,
};

use crate::domain::entities::UserRecord;

use super::auth_to_api;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::JsonBody;
use crate::infra::http::api::state::ApiState;

pub async fn register(
    State(state): State<ApiState>,
    JsonBody(request): JsonBody<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.auth.register(request).await.map_err(auth_to_api)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User created successfully".to_string(),
            user: user.to_view(),
        }),
    ))
}

pub async fn login(
    State(state): State<ApiState>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let signed_in = state.auth.login(request).await.map_err(auth_to_api)?;

    Ok(Json(LoginResponse {
        message: "Signed in successfully".to_string(),
        token: signed_in.token,
        user: signed_in.user.to_view(),
    }))
}

pub async fn verify(Extension(user): Extension<UserRecord>) -> impl IntoResponse {
    Json(VerifyResponse {
        valid: true,
        user: user.to_view(),
    })
}

pub async fn forgot_password(
    State(state): State<ApiState>,
    JsonBody(request): JsonBody<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .auth
        .forgot_password(request)
        .await
        .map_err(auth_to_api)?;

    Ok(Json(MessageResponse::new(
        "Password reset instructions have been sent to your email",
    )))
}
