//! File upload, duplicate checking, and download endpoints.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{created, ok, ok_with_total, ApiContext, AuthContext};
use crate::auth::verify_download;
use crate::db::repository;
use crate::files::{
    sanitize_filename, signed_download_url, store_upload, stored_path, DuplicateResolution,
    NewUpload,
};
use crate::models::enums::FileStatus;
use crate::permissions::Permission;

/// `POST /files/upload` — multipart upload.
///
/// Fields: `patientId`, the file part, and optionally `resolution`
/// (JSON) when the caller is resolving a detected duplicate.
pub async fn upload(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    auth.require(Permission::UploadFiles)?;

    let mut patient_id: Option<Uuid> = None;
    let mut resolution: Option<DuplicateResolution> = None;
    let mut file_name: Option<String> = None;
    let mut bytes: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("Malformed multipart body: {e}")))?
    {
        match field.name() {
            Some("patientId") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::Validation(e.to_string()))?;
                patient_id = Some(
                    Uuid::parse_str(text.trim())
                        .map_err(|_| ApiError::Validation("Invalid patientId".into()))?,
                );
            }
            Some("resolution") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::Validation(e.to_string()))?;
                resolution = Some(
                    serde_json::from_str(&text)
                        .map_err(|e| ApiError::Validation(format!("Invalid resolution: {e}")))?,
                );
            }
            Some("file") => {
                file_name = field.file_name().map(str::to_string);
                bytes = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::Validation(format!("Upload read failed: {e}")))?
                        .to_vec(),
                );
            }
            _ => {}
        }
    }

    let patient_id =
        patient_id.ok_or_else(|| ApiError::Validation("patientId is required".into()))?;
    let bytes = bytes.ok_or_else(|| ApiError::Validation("file part is required".into()))?;
    let file_name =
        file_name.ok_or_else(|| ApiError::Validation("file name is required".into()))?;

    let mut conn = ctx.open_db()?;
    repository::get_patient(&conn, &auth.practice_id, &patient_id)?
        .ok_or_else(|| ApiError::NotFound("Patient not found".into()))?;

    let record = store_upload(
        &mut conn,
        &ctx.config.files_dir,
        &auth.practice_id,
        &NewUpload {
            patient_id,
            file_name: &file_name,
            bytes: &bytes,
            uploaded_by: Some(auth.staff_id),
        },
        resolution,
        ctx.config.max_upload_bytes,
        Utc::now().naive_utc(),
    )?;

    Ok(created(record))
}

/// `GET /files/patient/:id`
pub async fn list_for_patient(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(patient_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    auth.require(Permission::ViewFiles)?;
    let conn = ctx.open_db()?;
    let files = repository::list_files_for_patient(&conn, &auth.practice_id, &patient_id)?;
    let total = files.len();
    Ok(ok_with_total(files, total))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckDuplicateRequest {
    pub patient_id: Uuid,
    pub file_name: String,
    pub file_size: i64,
}

/// `POST /files/check-duplicate` — pre-flight check before uploading.
pub async fn check_duplicate(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<CheckDuplicateRequest>,
) -> Result<Response, ApiError> {
    auth.require(Permission::UploadFiles)?;
    let conn = ctx.open_db()?;
    let matches = repository::find_duplicates(
        &conn,
        &auth.practice_id,
        &payload.patient_id,
        &sanitize_filename(&payload.file_name),
        payload.file_size,
    )?;
    Ok(ok(serde_json::json!({
        "isDuplicate": !matches.is_empty(),
        "duplicates": matches,
    })))
}

/// `GET /files/:id/signed-url` — mint a time-limited download link.
pub async fn signed_url(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    auth.require(Permission::ViewFiles)?;
    let conn = ctx.open_db()?;
    repository::get_file(&conn, &auth.practice_id, &id)?
        .ok_or_else(|| ApiError::NotFound(format!("File {id} not found")))?;

    Ok(ok(serde_json::json!({
        "url": signed_download_url(&ctx.config, &id),
        "expiresIn": ctx.config.signed_url_ttl_secs,
    })))
}

#[derive(Deserialize)]
pub struct DownloadQuery {
    pub id: Uuid,
    pub expires: i64,
    pub sig: String,
}

/// `GET /files/download` — signature-checked, no bearer token. The
/// signature covers the file id and expiry.
pub async fn download(
    State(ctx): State<ApiContext>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    if !verify_download(&ctx.config.token_secret, &query.id, query.expires, &query.sig) {
        return Err(ApiError::Unauthorized);
    }

    let conn = ctx.open_db()?;
    // Signature-authenticated: look the file up without a tenant scope
    let record = find_file_any_practice(&conn, &query.id)?
        .ok_or_else(|| ApiError::NotFound(format!("File {} not found", query.id)))?;

    let path = stored_path(&ctx.config.files_dir, &record.practice_id, &record);
    let contents = std::fs::read(&path).map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, record.mime_type.clone()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", record.file_name),
            ),
        ],
        contents,
    )
        .into_response())
}

fn find_file_any_practice(
    conn: &rusqlite::Connection,
    id: &Uuid,
) -> Result<Option<crate::models::FileRecord>, ApiError> {
    let practice_id: Option<String> = conn
        .query_row(
            "SELECT practice_id FROM files WHERE id = ?1",
            rusqlite::params![id.to_string()],
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            e => Err(ApiError::Internal(e.to_string())),
        })?;
    match practice_id {
        Some(pid) => {
            let pid = Uuid::parse_str(&pid).map_err(|e| ApiError::Internal(e.to_string()))?;
            Ok(repository::get_file(conn, &pid, id)?)
        }
        None => Ok(None),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub status: FileStatus,
    pub ocr_text: Option<String>,
    pub ocr_confidence: Option<f64>,
}

/// `POST /files/:id/status` — processing report from the digitization
/// service.
pub async fn report_status(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StatusReport>,
) -> Result<Response, ApiError> {
    auth.require(Permission::ReportFileStatus)?;
    let conn = ctx.open_db()?;
    repository::update_file_status(
        &conn,
        &auth.practice_id,
        &id,
        payload.status,
        payload.ocr_text.as_deref(),
        payload.ocr_confidence,
    )?;
    let record = repository::get_file(&conn, &auth.practice_id, &id)?
        .ok_or_else(|| ApiError::NotFound(format!("File {id} not found")))?;
    Ok(ok(record))
}

/// `GET /files/stats`
pub async fn stats(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Response, ApiError> {
    auth.require(Permission::ViewFiles)?;
    let conn = ctx.open_db()?;
    Ok(ok(repository::file_stats(&conn, &auth.practice_id)?))
}
