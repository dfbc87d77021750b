use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::FileStatus;

/// A digitized-document record tracked against a patient.
///
/// The bytes themselves live on disk (or with the external OCR
/// service); this row tracks identity, processing status and the
/// duplicate-detection key (patient_id, file_name, file_size).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub practice_id: Uuid,
    pub patient_id: Uuid,
    pub file_name: String,
    pub file_type: Option<String>,
    pub mime_type: String,
    pub file_size: i64,
    pub status: FileStatus,
    pub ocr_text: Option<String>,
    pub ocr_confidence: Option<f64>,
    /// Set when a replacement upload supersedes this record.
    pub superseded_by: Option<Uuid>,
    pub uploaded_by: Option<Uuid>,
    pub uploaded_at: NaiveDateTime,
}

/// Aggregate counts for the files dashboard.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStats {
    pub total: i64,
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub error: i64,
    pub total_bytes: i64,
}
