//! Appointment booking, queue, and visit lifecycle endpoints.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::{Extension, Json};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{created, ok, ok_with_total, ApiContext, AuthContext};
use crate::db::repository;
use crate::models::{NewAppointment, NewWalkIn};
use crate::permissions::Permission;
use crate::scheduling;

/// `POST /appointments` — book a scheduled appointment.
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<NewAppointment>,
) -> Result<Response, ApiError> {
    auth.require(Permission::ManageAppointments)?;

    let conn = ctx.open_db()?;
    repository::get_patient(&conn, &auth.practice_id, &payload.patient_id)?
        .ok_or_else(|| ApiError::NotFound("Patient not found".into()))?;
    repository::get_staff(&conn, &auth.practice_id, &payload.doctor_id)?
        .ok_or_else(|| ApiError::NotFound("Doctor not found".into()))?;

    let appt = scheduling::book(&conn, &auth.practice_id, &payload, Utc::now().naive_utc())?;
    Ok(created(appt))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayQuery {
    pub doctor_id: Option<Uuid>,
}

/// `GET /appointments/today`
pub async fn today(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<DayQuery>,
) -> Result<Response, ApiError> {
    auth.require(Permission::ViewAppointments)?;
    let conn = ctx.open_db()?;
    let appts = repository::list_for_day(
        &conn,
        &auth.practice_id,
        Utc::now().date_naive(),
        query.doctor_id.as_ref(),
    )?;
    let total = appts.len();
    Ok(ok_with_total(appts, total))
}

/// `GET /appointments/queue` — today's waiting room in check-in order.
pub async fn queue(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Response, ApiError> {
    auth.require(Permission::ViewAppointments)?;
    let conn = ctx.open_db()?;
    let waiting = repository::list_queue(&conn, &auth.practice_id, Utc::now().date_naive())?;
    let total = waiting.len();
    Ok(ok_with_total(waiting, total))
}

/// `POST /appointments/:id/checkin`
pub async fn check_in(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    auth.require(Permission::ManageAppointments)?;
    let mut conn = ctx.open_db()?;
    let appt = scheduling::check_in(
        &mut conn,
        &auth.practice_id,
        &id,
        Some(&auth.staff_id),
        Utc::now().naive_utc(),
    )?;
    Ok(ok(appt))
}

/// `POST /appointments/:id/start`
pub async fn start(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    auth.require(Permission::RunVisits)?;
    let mut conn = ctx.open_db()?;
    let appt =
        scheduling::start_visit(&mut conn, &auth.practice_id, &id, Utc::now().naive_utc())?;
    Ok(ok(appt))
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRequest {
    pub notes: Option<String>,
}

/// `POST /appointments/:id/complete`
pub async fn complete(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    payload: Option<Json<CompleteRequest>>,
) -> Result<Response, ApiError> {
    auth.require(Permission::RunVisits)?;
    let notes = payload.and_then(|Json(p)| p.notes);
    let mut conn = ctx.open_db()?;
    let appt = scheduling::complete_visit(
        &mut conn,
        &auth.practice_id,
        &id,
        notes.as_deref(),
        Utc::now().naive_utc(),
    )?;
    Ok(ok(appt))
}

/// `POST /appointments/:id/noshow`
pub async fn no_show(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    auth.require(Permission::ManageAppointments)?;
    let mut conn = ctx.open_db()?;
    let appt =
        scheduling::mark_no_show(&mut conn, &auth.practice_id, &id, Utc::now().naive_utc())?;
    Ok(ok(appt))
}

/// `POST /appointments/:id/cancel`
pub async fn cancel(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    auth.require(Permission::ManageAppointments)?;
    let mut conn = ctx.open_db()?;
    let appt = scheduling::cancel(&mut conn, &auth.practice_id, &id, Utc::now().naive_utc())?;
    Ok(ok(appt))
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CallNextRequest {
    pub doctor_id: Option<Uuid>,
}

/// `POST /appointments/queue/next` — take the lowest queue number into
/// the room. An empty queue answers success with no appointment.
pub async fn call_next(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    payload: Option<Json<CallNextRequest>>,
) -> Result<Response, ApiError> {
    auth.require(Permission::RunVisits)?;
    let doctor_id = payload.and_then(|Json(p)| p.doctor_id);
    let mut conn = ctx.open_db()?;
    let called = scheduling::call_next(
        &mut conn,
        &auth.practice_id,
        doctor_id.as_ref(),
        Utc::now().naive_utc(),
    )?;
    Ok(ok(serde_json::json!({ "appointment": called })))
}

/// `POST /appointments/walkin` — register and check in a walk-in as
/// one atomic operation.
pub async fn walk_in(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<NewWalkIn>,
) -> Result<Response, ApiError> {
    auth.require(Permission::ManageAppointments)?;

    let mut conn = ctx.open_db()?;
    repository::get_patient(&conn, &auth.practice_id, &payload.patient_id)?
        .ok_or_else(|| ApiError::NotFound("Patient not found".into()))?;
    repository::get_staff(&conn, &auth.practice_id, &payload.doctor_id)?
        .ok_or_else(|| ApiError::NotFound("Doctor not found".into()))?;

    let appt = scheduling::create_walk_in(
        &mut conn,
        &auth.practice_id,
        &payload,
        Some(&auth.staff_id),
        Utc::now().naive_utc(),
    )?;
    Ok(created(appt))
}
