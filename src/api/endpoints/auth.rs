//! Login and password-reset endpoints.

use axum::extract::State;
use axum::response::Response;
use axum::Json;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ok, ApiContext};
use crate::auth;
use crate::db::repository;
use crate::mailer::reset_mail;
use crate::models::enums::Role;
use crate::models::StaffView;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Staff code or email. Historical clients send it under several
    /// names.
    #[serde(alias = "staffId", alias = "staffID", alias = "identifier")]
    pub username: String,
    pub password: String,
    pub role: Option<Role>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub role: Role,
    pub practice_id: Uuid,
    pub staff: StaffView,
}

/// `POST /auth/login`
///
/// The identifier alone may match accounts in several practices; the
/// password decides which one the caller is.
pub async fn login(
    State(ctx): State<ApiContext>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let conn = ctx.open_db()?;

    let candidates = repository::find_staff_by_identifier(&conn, &payload.username)?;
    let staff = candidates
        .into_iter()
        .filter(|s| payload.role.map_or(true, |r| s.role == r))
        .find(|s| auth::verify_password(&payload.password, &s.password_hash))
        .ok_or(ApiError::InvalidCredentials)?;

    let token = auth::issue_token(
        &ctx.config.token_secret,
        staff.id,
        staff.practice_id,
        staff.role,
        ctx.config.token_ttl_minutes,
    )?;

    tracing::info!(staff = %staff.id, role = %staff.role, "Login");
    Ok(ok(LoginResponse {
        token,
        role: staff.role,
        practice_id: staff.practice_id,
        staff: staff.view(),
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// `POST /auth/forgot-password`
///
/// Always answers success so the endpoint cannot be used to probe
/// which addresses have accounts.
pub async fn forgot_password(
    State(ctx): State<ApiContext>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Response, ApiError> {
    let conn = ctx.open_db()?;
    let expires = Utc::now().naive_utc() + Duration::minutes(ctx.config.reset_ttl_minutes);

    for staff in repository::find_staff_by_email(&conn, &payload.email)? {
        let token = auth::issue_reset_token();
        repository::set_reset_token(&conn, &staff.id, &token.digest, &expires)?;
        ctx.mailer.send(reset_mail(&staff, &token.raw));
    }

    Ok(ok(serde_json::json!({
        "message": "If that address has an account, a reset email has been sent"
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

/// `POST /auth/reset-password`
pub async fn reset_password(
    State(ctx): State<ApiContext>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Response, ApiError> {
    if payload.new_password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let conn = ctx.open_db()?;
    let digest = auth::digest_reset_token(&payload.token);
    let staff = repository::find_staff_by_reset_token(&conn, &digest)?
        .ok_or(ApiError::InvalidCredentials)?;

    let now = Utc::now().naive_utc();
    if staff.reset_token_expires.map_or(true, |exp| exp < now) {
        return Err(ApiError::TokenExpired);
    }

    let hash = auth::hash_password(&payload.new_password)?;
    repository::update_password(&conn, &staff.id, &hash)?;

    tracing::info!(staff = %staff.id, "Password reset");
    Ok(ok(serde_json::json!({ "message": "Password updated" })))
}
