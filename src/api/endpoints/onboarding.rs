//! Practice onboarding: create a practice, join one, invite staff.

use axum::extract::State;
use axum::response::Response;
use axum::{Extension, Json};
use chrono::{Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::endpoints::staff::next_staff_code;
use crate::api::error::ApiError;
use crate::api::types::{created, ok, ApiContext, AuthContext};
use crate::auth::{hash_password, issue_token};
use crate::db::repository;
use crate::models::enums::Role;
use crate::models::{Invitation, Practice, Staff, StaffView};
use crate::permissions::Permission;

const INVITATION_TTL_DAYS: i64 = 7;

/// Human-enterable code, no ambiguous characters.
fn generate_code(len: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMember {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePracticeRequest {
    pub practice_name: String,
    pub admin: NewMember,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingResponse {
    pub practice_id: Uuid,
    pub practice_name: String,
    pub join_code: String,
    pub staff: StaffView,
    pub token: String,
}

fn validate_member(member: &NewMember) -> Result<(), ApiError> {
    if member.first_name.trim().is_empty() || member.last_name.trim().is_empty() {
        return Err(ApiError::Validation("First and last name are required".into()));
    }
    if !member.email.contains('@') {
        return Err(ApiError::Validation("A valid email address is required".into()));
    }
    if member.password.len() < 8 {
        return Err(ApiError::Validation(
            "Password must be at least 8 characters".into(),
        ));
    }
    Ok(())
}

fn build_member(
    practice_id: Uuid,
    staff_code: String,
    member: &NewMember,
    role: Role,
) -> Result<Staff, ApiError> {
    Ok(Staff {
        id: Uuid::new_v4(),
        practice_id,
        staff_code,
        first_name: member.first_name.trim().to_string(),
        last_name: member.last_name.trim().to_string(),
        email: member.email.trim().to_lowercase(),
        role,
        password_hash: hash_password(&member.password)?,
        reset_token_hash: None,
        reset_token_expires: None,
        created_at: Utc::now().naive_utc(),
    })
}

/// `POST /onboarding/practice` — create a practice with its first
/// admin account and log the admin straight in.
pub async fn create_practice(
    State(ctx): State<ApiContext>,
    Json(payload): Json<CreatePracticeRequest>,
) -> Result<Response, ApiError> {
    if payload.practice_name.trim().is_empty() {
        return Err(ApiError::Validation("Practice name is required".into()));
    }
    validate_member(&payload.admin)?;

    let conn = ctx.open_db()?;
    let practice = Practice {
        id: Uuid::new_v4(),
        name: payload.practice_name.trim().to_string(),
        join_code: generate_code(6),
        created_at: Utc::now().naive_utc(),
    };
    repository::insert_practice(&conn, &practice)?;

    let admin = build_member(practice.id, "AD001".into(), &payload.admin, Role::Admin)?;
    repository::insert_staff(&conn, &admin)?;

    let token = issue_token(
        &ctx.config.token_secret,
        admin.id,
        practice.id,
        Role::Admin,
        ctx.config.token_ttl_minutes,
    )?;

    tracing::info!(practice = %practice.id, name = %practice.name, "Practice created");
    Ok(created(OnboardingResponse {
        practice_id: practice.id,
        practice_name: practice.name,
        join_code: practice.join_code,
        staff: admin.view(),
        token,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    /// Practice join code or a single-use invitation code.
    pub code: String,
    #[serde(flatten)]
    pub member: NewMember,
}

/// `POST /onboarding/join`
///
/// An invitation code carries a role and is consumed; the practice
/// join code enrolls as receptionist.
pub async fn join(
    State(ctx): State<ApiContext>,
    Json(payload): Json<JoinRequest>,
) -> Result<Response, ApiError> {
    validate_member(&payload.member)?;

    let conn = ctx.open_db()?;
    let now = Utc::now().naive_utc();
    let code = payload.code.trim().to_uppercase();

    let (practice, role) = if let Some(invitation) = repository::get_invitation(&conn, &code)? {
        if !invitation.is_usable(now) {
            return Err(ApiError::Validation("Invitation code is expired or used".into()));
        }
        let practice = repository::get_practice(&conn, &invitation.practice_id)?
            .ok_or_else(|| ApiError::NotFound("Practice not found".into()))?;
        repository::mark_invitation_used(&conn, &code, &now)?;
        (practice, invitation.role)
    } else if let Some(practice) = repository::get_practice_by_join_code(&conn, &code)? {
        (practice, Role::Receptionist)
    } else {
        return Err(ApiError::NotFound("Unknown join code".into()));
    };

    let staff_code = next_staff_code(&conn, &practice.id, role)?;
    let staff = build_member(practice.id, staff_code, &payload.member, role)?;
    repository::insert_staff(&conn, &staff)?;

    let token = issue_token(
        &ctx.config.token_secret,
        staff.id,
        practice.id,
        role,
        ctx.config.token_ttl_minutes,
    )?;

    tracing::info!(staff = %staff.id, practice = %practice.id, "Staff joined practice");
    Ok(created(OnboardingResponse {
        practice_id: practice.id,
        practice_name: practice.name,
        join_code: practice.join_code,
        staff: staff.view(),
        token,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteRequest {
    pub role: Role,
}

/// `POST /onboarding/invite` — issue a single-use invitation code.
pub async fn invite(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<InviteRequest>,
) -> Result<Response, ApiError> {
    auth.require(Permission::ManageStaff)?;

    let conn = ctx.open_db()?;
    let now = Utc::now().naive_utc();
    let invitation = Invitation {
        code: generate_code(8),
        practice_id: auth.practice_id,
        role: payload.role,
        created_by: Some(auth.staff_id),
        expires_at: now + Duration::days(INVITATION_TTL_DAYS),
        used_at: None,
    };
    repository::insert_invitation(&conn, &invitation)?;

    Ok(created(serde_json::json!({
        "code": invitation.code,
        "role": invitation.role,
        "expiresAt": invitation.expires_at,
    })))
}

/// `GET /onboarding/practice` — the caller's practice details.
pub async fn practice_info(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Response, ApiError> {
    let conn = ctx.open_db()?;
    let practice = repository::get_practice(&conn, &auth.practice_id)?
        .ok_or_else(|| ApiError::NotFound("Practice not found".into()))?;
    Ok(ok(practice))
}
