//! Staff management endpoints.

use axum::extract::State;
use axum::response::Response;
use axum::{Extension, Json};
use chrono::Utc;
use rand::Rng;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{created, ok_with_total, ApiContext, AuthContext};
use crate::auth::hash_password;
use crate::db::repository;
use crate::db::DatabaseError;
use crate::mailer::welcome_mail;
use crate::models::enums::Role;
use crate::models::{Staff, StaffView};
use crate::permissions::Permission;

/// Next human-readable staff code for a role, e.g. DR003. Codes are
/// unique per practice; a collision surfaces as a duplicate error.
pub(crate) fn next_staff_code(
    conn: &Connection,
    practice_id: &Uuid,
    role: Role,
) -> Result<String, DatabaseError> {
    let prefix = match role {
        Role::Admin => "AD",
        Role::Doctor => "DR",
        Role::Nurse => "NR",
        Role::Receptionist => "RC",
        Role::Patient => "PT",
    };
    let count = repository::list_staff(conn, practice_id)?
        .iter()
        .filter(|s| s.role == role)
        .count();
    Ok(format!("{prefix}{:03}", count + 1))
}

/// Random temporary password sent in the welcome mail.
pub(crate) fn generate_temp_password() -> String {
    const CHARSET: &[u8] = b"abcdefghjkmnpqrstuvwxyzABCDEFGHJKMNPQRSTUVWXYZ23456789";
    let mut rng = rand::thread_rng();
    (0..12)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStaffRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStaffResponse {
    pub staff: StaffView,
    /// Returned once so the admin can hand it over if the email does
    /// not arrive.
    pub temp_password: String,
}

/// `POST /staff/create` — create an account with a generated
/// credential and send a welcome mail.
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<CreateStaffRequest>,
) -> Result<Response, ApiError> {
    auth.require(Permission::ManageStaff)?;
    if payload.first_name.trim().is_empty() || payload.last_name.trim().is_empty() {
        return Err(ApiError::Validation("First and last name are required".into()));
    }
    if !payload.email.contains('@') {
        return Err(ApiError::Validation("A valid email address is required".into()));
    }

    let conn = ctx.open_db()?;
    let now = Utc::now().naive_utc();
    let temp_password = generate_temp_password();

    let staff = Staff {
        id: Uuid::new_v4(),
        practice_id: auth.practice_id,
        staff_code: next_staff_code(&conn, &auth.practice_id, payload.role)?,
        first_name: payload.first_name.trim().to_string(),
        last_name: payload.last_name.trim().to_string(),
        email: payload.email.trim().to_lowercase(),
        role: payload.role,
        password_hash: hash_password(&temp_password)?,
        reset_token_hash: None,
        reset_token_expires: None,
        created_at: now,
    };
    repository::insert_staff(&conn, &staff)?;

    let practice_name = repository::get_practice(&conn, &auth.practice_id)?
        .map(|p| p.name)
        .unwrap_or_default();
    ctx.mailer.send(welcome_mail(&staff, &practice_name, &temp_password));

    tracing::info!(staff = %staff.id, code = %staff.staff_code, "Staff account created");
    Ok(created(CreateStaffResponse {
        staff: staff.view(),
        temp_password,
    }))
}

/// `GET /staff/all`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Response, ApiError> {
    auth.require(Permission::ViewStaff)?;
    let conn = ctx.open_db()?;
    let staff: Vec<StaffView> = repository::list_staff(&conn, &auth.practice_id)?
        .iter()
        .map(Staff::view)
        .collect();
    let total = staff.len();
    Ok(ok_with_total(staff, total))
}

/// `GET /staff/doctors`
pub async fn doctors(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Response, ApiError> {
    auth.require(Permission::ViewStaff)?;
    let conn = ctx.open_db()?;
    let doctors: Vec<StaffView> = repository::list_doctors(&conn, &auth.practice_id)?
        .iter()
        .map(Staff::view)
        .collect();
    let total = doctors.len();
    Ok(ok_with_total(doctors, total))
}
