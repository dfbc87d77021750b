//! File intake: validation, duplicate detection, and storage.
//!
//! Uploaded documents land on disk under one directory per practice;
//! the database keeps the metadata and processing status. OCR itself
//! runs elsewhere and reports back through the status endpoint.

use std::path::{Path, PathBuf};

use chrono::{NaiveDateTime, Utc};
use rusqlite::{Connection, TransactionBehavior};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth;
use crate::config::Config;
use crate::db::repository;
use crate::db::DatabaseError;
use crate::models::enums::FileStatus;
use crate::models::FileRecord;

#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error("Failed to store file: {0}")]
    Io(#[from] std::io::Error),
    #[error("A file with the same name and size already exists for this patient")]
    Duplicate(Vec<FileRecord>),
    #[error("File exceeds the maximum upload size of {max} bytes")]
    TooLarge { size: usize, max: usize },
    #[error("File is empty")]
    Empty,
    #[error("File not found: {0}")]
    NotFound(Uuid),
    #[error("Replacement target does not belong to this patient")]
    ReplaceMismatch,
}

// Raw rusqlite errors from transaction begin/commit route through the
// database taxonomy, same as repository calls.
impl From<rusqlite::Error> for FileError {
    fn from(err: rusqlite::Error) -> Self {
        FileError::Database(err.into())
    }
}

/// How the caller wants a detected duplicate handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum DuplicateResolution {
    /// Keep both records.
    UploadAnyway,
    /// Supersede one existing record with the new upload.
    Replace {
        #[serde(rename = "fileId")]
        file_id: Uuid,
    },
}

pub struct NewUpload<'a> {
    pub patient_id: Uuid,
    pub file_name: &'a str,
    pub bytes: &'a [u8],
    pub uploaded_by: Option<Uuid>,
}

/// Accept an upload: validate, resolve duplicates, write the bytes to
/// disk and the record to the database.
pub fn store_upload(
    conn: &mut Connection,
    files_dir: &Path,
    practice_id: &Uuid,
    upload: &NewUpload<'_>,
    resolution: Option<DuplicateResolution>,
    max_bytes: usize,
    now: NaiveDateTime,
) -> Result<FileRecord, FileError> {
    if upload.bytes.is_empty() {
        return Err(FileError::Empty);
    }
    if upload.bytes.len() > max_bytes {
        return Err(FileError::TooLarge {
            size: upload.bytes.len(),
            max: max_bytes,
        });
    }

    let file_name = sanitize_filename(upload.file_name);
    let file_size = upload.bytes.len() as i64;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let duplicates = repository::find_duplicates(
        &tx,
        practice_id,
        &upload.patient_id,
        &file_name,
        file_size,
    )?;
    if !duplicates.is_empty() && resolution.is_none() {
        return Err(FileError::Duplicate(duplicates));
    }

    let record = FileRecord {
        id: Uuid::new_v4(),
        practice_id: *practice_id,
        patient_id: upload.patient_id,
        file_name: file_name.clone(),
        file_type: extension_of(&file_name),
        mime_type: detect_mime(upload.bytes, &file_name),
        file_size,
        status: FileStatus::Pending,
        ocr_text: None,
        ocr_confidence: None,
        superseded_by: None,
        uploaded_by: upload.uploaded_by,
        uploaded_at: now,
    };
    repository::insert_file(&tx, &record)?;

    if let Some(DuplicateResolution::Replace { file_id }) = resolution {
        let existing = repository::get_file(&tx, practice_id, &file_id)?
            .ok_or(FileError::NotFound(file_id))?;
        if existing.patient_id != upload.patient_id {
            return Err(FileError::ReplaceMismatch);
        }
        repository::mark_superseded(&tx, practice_id, &file_id, &record.id)?;
    }

    repository::set_has_file(&tx, &upload.patient_id)?;

    let path = stored_path(files_dir, practice_id, &record);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, upload.bytes)?;

    if let Err(err) = tx.commit() {
        // The record never landed; don't leave its bytes behind.
        let _ = std::fs::remove_file(&path);
        return Err(err.into());
    }
    tracing::info!(file = %record.id, name = %record.file_name, size = file_size, "File stored");
    Ok(record)
}

/// On-disk location of a stored file.
pub fn stored_path(files_dir: &Path, practice_id: &Uuid, record: &FileRecord) -> PathBuf {
    let name = match &record.file_type {
        Some(ext) => format!("{}.{ext}", record.id),
        None => record.id.to_string(),
    };
    files_dir.join(practice_id.to_string()).join(name)
}

/// A time-limited download link for a stored file.
pub fn signed_download_url(config: &Config, file_id: &Uuid) -> String {
    let expires = Utc::now().timestamp() + config.signed_url_ttl_secs;
    let signature = auth::sign_download(&config.token_secret, file_id, expires);
    format!("/files/download?id={file_id}&expires={expires}&sig={signature}")
}

/// Strip path components and anything outside a conservative character
/// set. Uploaded names come straight from browsers.
pub fn sanitize_filename(raw: &str) -> String {
    let base = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(raw)
        .trim();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_' | ' ' | '(' | ')') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches(['.', ' ']).to_string();
    if cleaned.is_empty() {
        "unnamed".into()
    } else {
        cleaned
    }
}

fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
}

/// Content sniffing from magic bytes, falling back to the extension.
pub fn detect_mime(bytes: &[u8], file_name: &str) -> String {
    if bytes.starts_with(b"%PDF") {
        return "application/pdf".into();
    }
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        return "image/png".into();
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return "image/jpeg".into();
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return "image/gif".into();
    }
    if bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*") {
        return "image/tiff".into();
    }
    mime_guess::from_path(file_name)
        .first_raw()
        .unwrap_or("application/octet-stream")
        .into()
}
