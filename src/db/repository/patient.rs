use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::Patient;

use super::{fmt_dt, parse_dt, parse_uuid};

const PATIENT_COLUMNS: &str = "id, practice_id, first_name, last_name, date_of_birth, gender,
    address, phone, email, id_number, medical_history, insurance, has_file, created_at, updated_at";

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, practice_id, first_name, last_name, date_of_birth, gender,
         address, phone, email, id_number, medical_history, insurance, has_file, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            patient.id.to_string(),
            patient.practice_id.to_string(),
            patient.first_name,
            patient.last_name,
            patient.date_of_birth.to_string(),
            patient.gender,
            patient.address,
            patient.phone,
            patient.email,
            patient.id_number,
            patient.medical_history.as_ref().map(|v| v.to_string()),
            patient.insurance.as_ref().map(|v| v.to_string()),
            patient.has_file as i32,
            fmt_dt(&patient.created_at),
            fmt_dt(&patient.updated_at),
        ],
    )
    .map_err(|e| {
        DatabaseError::classify_unique(e, "patients.practice_id, patients.id_number", "idNumber", &patient.id_number)
    })?;
    Ok(())
}

pub fn get_patient(
    conn: &Connection,
    practice_id: &Uuid,
    id: &Uuid,
) -> Result<Option<Patient>, DatabaseError> {
    let sql = format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE practice_id = ?1 AND id = ?2");
    let result = conn.query_row(
        &sql,
        params![practice_id.to_string(), id.to_string()],
        patient_row,
    );
    match result {
        Ok(row) => Ok(Some(patient_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_patient_by_id_number(
    conn: &Connection,
    practice_id: &Uuid,
    id_number: &str,
) -> Result<Option<Patient>, DatabaseError> {
    let sql =
        format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE practice_id = ?1 AND id_number = ?2");
    let result = conn.query_row(&sql, params![practice_id.to_string(), id_number], patient_row);
    match result {
        Ok(row) => Ok(Some(patient_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_patients(conn: &Connection, practice_id: &Uuid) -> Result<Vec<Patient>, DatabaseError> {
    let sql = format!(
        "SELECT {PATIENT_COLUMNS} FROM patients WHERE practice_id = ?1
         ORDER BY last_name ASC, first_name ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![practice_id.to_string()], patient_row)?;

    let mut result = Vec::new();
    for row in rows {
        result.push(patient_from_row(row?)?);
    }
    Ok(result)
}

pub fn update_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    let rows = conn
        .execute(
            "UPDATE patients SET first_name = ?3, last_name = ?4, date_of_birth = ?5, gender = ?6,
             address = ?7, phone = ?8, email = ?9, id_number = ?10, medical_history = ?11,
             insurance = ?12, updated_at = ?13
             WHERE practice_id = ?1 AND id = ?2",
            params![
                patient.practice_id.to_string(),
                patient.id.to_string(),
                patient.first_name,
                patient.last_name,
                patient.date_of_birth.to_string(),
                patient.gender,
                patient.address,
                patient.phone,
                patient.email,
                patient.id_number,
                patient.medical_history.as_ref().map(|v| v.to_string()),
                patient.insurance.as_ref().map(|v| v.to_string()),
                fmt_dt(&patient.updated_at),
            ],
        )
        .map_err(|e| {
            DatabaseError::classify_unique(e, "patients.practice_id, patients.id_number", "idNumber", &patient.id_number)
        })?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Patient".into(),
            id: patient.id.to_string(),
        });
    }
    Ok(())
}

/// Administrative hard delete. Normal flows never remove patients.
pub fn delete_patient(
    conn: &Connection,
    practice_id: &Uuid,
    id: &Uuid,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "DELETE FROM patients WHERE practice_id = ?1 AND id = ?2",
        params![practice_id.to_string(), id.to_string()],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Patient".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Flip the has_file flag once a document has been digitized for
/// this patient.
pub fn set_has_file(conn: &Connection, patient_id: &Uuid) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE patients SET has_file = 1 WHERE id = ?1",
        params![patient_id.to_string()],
    )?;
    Ok(())
}

pub fn count_patients(conn: &Connection, practice_id: &Uuid) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM patients WHERE practice_id = ?1",
        params![practice_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}

struct PatientRow {
    id: String,
    practice_id: String,
    first_name: String,
    last_name: String,
    date_of_birth: String,
    gender: Option<String>,
    address: String,
    phone: String,
    email: Option<String>,
    id_number: String,
    medical_history: Option<String>,
    insurance: Option<String>,
    has_file: i32,
    created_at: String,
    updated_at: String,
}

fn patient_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PatientRow> {
    Ok(PatientRow {
        id: row.get(0)?,
        practice_id: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        date_of_birth: row.get(4)?,
        gender: row.get(5)?,
        address: row.get(6)?,
        phone: row.get(7)?,
        email: row.get(8)?,
        id_number: row.get(9)?,
        medical_history: row.get(10)?,
        insurance: row.get(11)?,
        has_file: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

fn patient_from_row(row: PatientRow) -> Result<Patient, DatabaseError> {
    Ok(Patient {
        id: parse_uuid(&row.id)?,
        practice_id: parse_uuid(&row.practice_id)?,
        first_name: row.first_name,
        last_name: row.last_name,
        date_of_birth: NaiveDate::parse_from_str(&row.date_of_birth, "%Y-%m-%d")
            .unwrap_or_default(),
        gender: row.gender,
        address: row.address,
        phone: row.phone,
        email: row.email,
        id_number: row.id_number,
        medical_history: row.medical_history.and_then(|s| serde_json::from_str(&s).ok()),
        insurance: row.insurance.and_then(|s| serde_json::from_str(&s).ok()),
        has_file: row.has_file != 0,
        created_at: parse_dt(&row.created_at),
        updated_at: parse_dt(&row.updated_at),
    })
}

#[cfg(test)]
pub(crate) fn sample_patient(practice_id: Uuid, id_number: &str) -> Patient {
    let now: NaiveDateTime = chrono::Utc::now().naive_utc();
    Patient {
        id: Uuid::new_v4(),
        practice_id,
        first_name: "Anna".into(),
        last_name: "Botha".into(),
        date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
        gender: Some("female".into()),
        address: "12 Main Rd, Cape Town".into(),
        phone: "0821234567".into(),
        email: None,
        id_number: id_number.into(),
        medical_history: None,
        insurance: None,
        has_file: false,
        created_at: now,
        updated_at: now,
    }
}
