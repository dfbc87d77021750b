use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::FileStatus;
use crate::models::{FileRecord, FileStats};

use super::{fmt_dt, parse_dt, parse_uuid};

const FILE_COLUMNS: &str = "id, practice_id, patient_id, file_name, file_type, mime_type,
    file_size, status, ocr_text, ocr_confidence, superseded_by, uploaded_by, uploaded_at";

pub fn insert_file(conn: &Connection, file: &FileRecord) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO files (id, practice_id, patient_id, file_name, file_type, mime_type,
         file_size, status, ocr_text, ocr_confidence, superseded_by, uploaded_by, uploaded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            file.id.to_string(),
            file.practice_id.to_string(),
            file.patient_id.to_string(),
            file.file_name,
            file.file_type,
            file.mime_type,
            file.file_size,
            file.status.as_str(),
            file.ocr_text,
            file.ocr_confidence,
            file.superseded_by.map(|id| id.to_string()),
            file.uploaded_by.map(|id| id.to_string()),
            fmt_dt(&file.uploaded_at),
        ],
    )?;
    Ok(())
}

pub fn get_file(
    conn: &Connection,
    practice_id: &Uuid,
    id: &Uuid,
) -> Result<Option<FileRecord>, DatabaseError> {
    let sql = format!("SELECT {FILE_COLUMNS} FROM files WHERE practice_id = ?1 AND id = ?2");
    let result = conn.query_row(&sql, params![practice_id.to_string(), id.to_string()], file_row);
    match result {
        Ok(row) => Ok(Some(file_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_files_for_patient(
    conn: &Connection,
    practice_id: &Uuid,
    patient_id: &Uuid,
) -> Result<Vec<FileRecord>, DatabaseError> {
    let sql = format!(
        "SELECT {FILE_COLUMNS} FROM files WHERE practice_id = ?1 AND patient_id = ?2
         ORDER BY uploaded_at DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![practice_id.to_string(), patient_id.to_string()],
        file_row,
    )?;

    let mut result = Vec::new();
    for row in rows {
        result.push(file_from_row(row?)?);
    }
    Ok(result)
}

/// Duplicate candidates for one patient by the (file_name, file_size)
/// key. Superseded records are excluded; a replaced file no longer
/// counts as a live duplicate.
pub fn find_duplicates(
    conn: &Connection,
    practice_id: &Uuid,
    patient_id: &Uuid,
    file_name: &str,
    file_size: i64,
) -> Result<Vec<FileRecord>, DatabaseError> {
    let sql = format!(
        "SELECT {FILE_COLUMNS} FROM files
         WHERE practice_id = ?1 AND patient_id = ?2 AND file_name = ?3 AND file_size = ?4
           AND superseded_by IS NULL
         ORDER BY uploaded_at ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![
            practice_id.to_string(),
            patient_id.to_string(),
            file_name,
            file_size,
        ],
        file_row,
    )?;

    let mut result = Vec::new();
    for row in rows {
        result.push(file_from_row(row?)?);
    }
    Ok(result)
}

/// Mark `old_id` superseded by `new_id`. The replaced record keeps its
/// patient association but drops out of duplicate detection and stats.
pub fn mark_superseded(
    conn: &Connection,
    practice_id: &Uuid,
    old_id: &Uuid,
    new_id: &Uuid,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE files SET superseded_by = ?3 WHERE practice_id = ?1 AND id = ?2",
        params![
            practice_id.to_string(),
            old_id.to_string(),
            new_id.to_string(),
        ],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "File".into(),
            id: old_id.to_string(),
        });
    }
    Ok(())
}

/// Processing-status report from the external digitization service.
pub fn update_file_status(
    conn: &Connection,
    practice_id: &Uuid,
    id: &Uuid,
    status: FileStatus,
    ocr_text: Option<&str>,
    ocr_confidence: Option<f64>,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE files SET status = ?3,
         ocr_text = COALESCE(?4, ocr_text),
         ocr_confidence = COALESCE(?5, ocr_confidence)
         WHERE practice_id = ?1 AND id = ?2",
        params![
            practice_id.to_string(),
            id.to_string(),
            status.as_str(),
            ocr_text,
            ocr_confidence,
        ],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "File".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Aggregate counts for the dashboard, live records only.
pub fn file_stats(conn: &Connection, practice_id: &Uuid) -> Result<FileStats, DatabaseError> {
    conn.query_row(
        "SELECT COUNT(*),
                COALESCE(SUM(status = 'pending'), 0),
                COALESCE(SUM(status = 'processing'), 0),
                COALESCE(SUM(status = 'completed'), 0),
                COALESCE(SUM(status = 'error'), 0),
                COALESCE(SUM(file_size), 0)
         FROM files WHERE practice_id = ?1 AND superseded_by IS NULL",
        params![practice_id.to_string()],
        |row| {
            Ok(FileStats {
                total: row.get(0)?,
                pending: row.get(1)?,
                processing: row.get(2)?,
                completed: row.get(3)?,
                error: row.get(4)?,
                total_bytes: row.get(5)?,
            })
        },
    )
    .map_err(Into::into)
}

struct FileRow {
    id: String,
    practice_id: String,
    patient_id: String,
    file_name: String,
    file_type: Option<String>,
    mime_type: String,
    file_size: i64,
    status: String,
    ocr_text: Option<String>,
    ocr_confidence: Option<f64>,
    superseded_by: Option<String>,
    uploaded_by: Option<String>,
    uploaded_at: String,
}

fn file_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileRow> {
    Ok(FileRow {
        id: row.get(0)?,
        practice_id: row.get(1)?,
        patient_id: row.get(2)?,
        file_name: row.get(3)?,
        file_type: row.get(4)?,
        mime_type: row.get(5)?,
        file_size: row.get(6)?,
        status: row.get(7)?,
        ocr_text: row.get(8)?,
        ocr_confidence: row.get(9)?,
        superseded_by: row.get(10)?,
        uploaded_by: row.get(11)?,
        uploaded_at: row.get(12)?,
    })
}

fn file_from_row(row: FileRow) -> Result<FileRecord, DatabaseError> {
    Ok(FileRecord {
        id: parse_uuid(&row.id)?,
        practice_id: parse_uuid(&row.practice_id)?,
        patient_id: parse_uuid(&row.patient_id)?,
        file_name: row.file_name,
        file_type: row.file_type,
        mime_type: row.mime_type,
        file_size: row.file_size,
        status: FileStatus::from_str(&row.status)?,
        ocr_text: row.ocr_text,
        ocr_confidence: row.ocr_confidence,
        superseded_by: row.superseded_by.and_then(|s| Uuid::parse_str(&s).ok()),
        uploaded_by: row.uploaded_by.and_then(|s| Uuid::parse_str(&s).ok()),
        uploaded_at: parse_dt(&row.uploaded_at),
    })
}

#[cfg(test)]
pub(crate) fn sample_file(
    practice_id: Uuid,
    patient_id: Uuid,
    name: &str,
    size: i64,
) -> FileRecord {
    let now: NaiveDateTime = chrono::Utc::now().naive_utc();
    FileRecord {
        id: Uuid::new_v4(),
        practice_id,
        patient_id,
        file_name: name.into(),
        file_type: Some("pdf".into()),
        mime_type: "application/pdf".into(),
        file_size: size,
        status: FileStatus::Pending,
        ocr_text: None,
        ocr_confidence: None,
        superseded_by: None,
        uploaded_by: None,
        uploaded_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::appointment::clinic_fixture;

    #[test]
    fn insert_and_list() {
        let (conn, practice_id, _, patient_id) = clinic_fixture();
        insert_file(&conn, &sample_file(practice_id, patient_id, "referral.pdf", 2048)).unwrap();
        insert_file(&conn, &sample_file(practice_id, patient_id, "xray.pdf", 4096)).unwrap();

        let files = list_files_for_patient(&conn, &practice_id, &patient_id).unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn duplicates_match_on_name_and_size() {
        let (conn, practice_id, _, patient_id) = clinic_fixture();
        insert_file(&conn, &sample_file(practice_id, patient_id, "referral.pdf", 2048)).unwrap();

        let dups =
            find_duplicates(&conn, &practice_id, &patient_id, "referral.pdf", 2048).unwrap();
        assert_eq!(dups.len(), 1);

        // Different size: not a duplicate
        let dups =
            find_duplicates(&conn, &practice_id, &patient_id, "referral.pdf", 9999).unwrap();
        assert!(dups.is_empty());
    }

    #[test]
    fn superseded_files_drop_out_of_duplicates_and_stats() {
        let (conn, practice_id, _, patient_id) = clinic_fixture();
        let old = sample_file(practice_id, patient_id, "referral.pdf", 2048);
        let new = sample_file(practice_id, patient_id, "referral.pdf", 2048);
        insert_file(&conn, &old).unwrap();
        insert_file(&conn, &new).unwrap();
        mark_superseded(&conn, &practice_id, &old.id, &new.id).unwrap();

        let dups =
            find_duplicates(&conn, &practice_id, &patient_id, "referral.pdf", 2048).unwrap();
        assert_eq!(dups.len(), 1);
        assert_eq!(dups[0].id, new.id);

        let stats = file_stats(&conn, &practice_id).unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.total_bytes, 2048);

        // The replaced record keeps its patient association
        let old_loaded = get_file(&conn, &practice_id, &old.id).unwrap().unwrap();
        assert_eq!(old_loaded.patient_id, patient_id);
        assert_eq!(old_loaded.superseded_by, Some(new.id));
    }

    #[test]
    fn status_update_records_ocr_output() {
        let (conn, practice_id, _, patient_id) = clinic_fixture();
        let file = sample_file(practice_id, patient_id, "referral.pdf", 2048);
        insert_file(&conn, &file).unwrap();

        update_file_status(
            &conn,
            &practice_id,
            &file.id,
            FileStatus::Completed,
            Some("Dear colleague..."),
            Some(0.93),
        )
        .unwrap();

        let loaded = get_file(&conn, &practice_id, &file.id).unwrap().unwrap();
        assert_eq!(loaded.status, FileStatus::Completed);
        assert_eq!(loaded.ocr_text.as_deref(), Some("Dear colleague..."));
        assert!(loaded.ocr_confidence.unwrap() > 0.9);
    }

    #[test]
    fn stats_bucket_by_status() {
        let (conn, practice_id, _, patient_id) = clinic_fixture();
        insert_file(&conn, &sample_file(practice_id, patient_id, "a.pdf", 100)).unwrap();
        let mut processing = sample_file(practice_id, patient_id, "b.pdf", 200);
        processing.status = FileStatus::Processing;
        insert_file(&conn, &processing).unwrap();

        let stats = file_stats(&conn, &practice_id).unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.processing, 1);
        assert_eq!(stats.completed, 0);
        assert_eq!(stats.total_bytes, 300);
    }
}
