//! Patient registry endpoints.

use axum::extract::{Path, State};
use axum::response::Response;
use axum::{Extension, Json};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{created, ok, ok_with_total, ApiContext, AuthContext};
use crate::db::repository;
use crate::models::{Patient, PatientPayload};
use crate::permissions::Permission;

/// Validate the registration payload and normalize it into a new
/// patient record. Both historical payload shapes arrive here.
fn build_patient(practice_id: Uuid, payload: &PatientPayload) -> Result<Patient, ApiError> {
    if payload.first_name.trim().is_empty() || payload.last_name.trim().is_empty() {
        return Err(ApiError::Validation("First and last name are required".into()));
    }
    let phone = payload
        .phone
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::Validation("Phone number is required".into()))?;
    let address = payload
        .address
        .as_ref()
        .map(|a| a.to_line())
        .filter(|a| !a.is_empty())
        .ok_or_else(|| ApiError::Validation("Address is required".into()))?;
    let id_number = payload
        .id_number
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::Validation("ID number is required".into()))?;

    let now = Utc::now().naive_utc();
    Ok(Patient {
        id: Uuid::new_v4(),
        practice_id,
        first_name: payload.first_name.trim().to_string(),
        last_name: payload.last_name.trim().to_string(),
        date_of_birth: payload.date_of_birth,
        gender: payload.gender.clone(),
        address,
        phone: phone.to_string(),
        email: payload.email.clone(),
        id_number: id_number.to_string(),
        medical_history: payload.medical_history.clone(),
        insurance: payload.insurance.clone(),
        has_file: false,
        created_at: now,
        updated_at: now,
    })
}

/// `POST /patients` — register a patient. A duplicate national ID in
/// the same practice is rejected without creating a second record.
pub async fn register(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<PatientPayload>,
) -> Result<Response, ApiError> {
    auth.require(Permission::ManagePatients)?;

    let patient = build_patient(auth.practice_id, &payload)?;
    let conn = ctx.open_db()?;
    repository::insert_patient(&conn, &patient)?;

    tracing::info!(patient = %patient.id, "Patient registered");
    Ok(created(patient))
}

/// `GET /patients`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Response, ApiError> {
    auth.require(Permission::ViewPatients)?;
    let conn = ctx.open_db()?;
    let patients = repository::list_patients(&conn, &auth.practice_id)?;
    let total = patients.len();
    Ok(ok_with_total(patients, total))
}

/// `GET /patients/idNumber/:id_number`
pub async fn get_by_id_number(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id_number): Path<String>,
) -> Result<Response, ApiError> {
    auth.require(Permission::ViewPatients)?;
    let conn = ctx.open_db()?;
    let patient = repository::get_patient_by_id_number(&conn, &auth.practice_id, &id_number)?
        .ok_or_else(|| ApiError::NotFound(format!("No patient with ID number {id_number}")))?;
    Ok(ok(patient))
}

/// `PUT /patients/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PatientPayload>,
) -> Result<Response, ApiError> {
    auth.require(Permission::ManagePatients)?;

    let conn = ctx.open_db()?;
    let existing = repository::get_patient(&conn, &auth.practice_id, &id)?
        .ok_or_else(|| ApiError::NotFound(format!("Patient {id} not found")))?;

    let mut updated = build_patient(auth.practice_id, &payload)?;
    updated.id = existing.id;
    updated.has_file = existing.has_file;
    updated.created_at = existing.created_at;
    repository::update_patient(&conn, &updated)?;

    Ok(ok(updated))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub deleted: Uuid,
}

/// `DELETE /patients/:id` — administrative hard delete.
pub async fn delete(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    auth.require(Permission::DeletePatients)?;
    let conn = ctx.open_db()?;
    repository::delete_patient(&conn, &auth.practice_id, &id)?;
    tracing::warn!(patient = %id, by = %auth.staff_id, "Patient record deleted");
    Ok(ok(DeleteResponse { deleted: id }))
}
