use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::Role;
use crate::models::Staff;

use super::{fmt_dt, parse_dt, parse_uuid};

const STAFF_COLUMNS: &str = "id, practice_id, staff_code, first_name, last_name, email, role,
    password_hash, reset_token_hash, reset_token_expires, created_at";

pub fn insert_staff(conn: &Connection, staff: &Staff) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO staff (id, practice_id, staff_code, first_name, last_name, email, role,
         password_hash, reset_token_hash, reset_token_expires, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            staff.id.to_string(),
            staff.practice_id.to_string(),
            staff.staff_code,
            staff.first_name,
            staff.last_name,
            staff.email,
            staff.role.as_str(),
            staff.password_hash,
            staff.reset_token_hash,
            staff.reset_token_expires.as_ref().map(fmt_dt),
            fmt_dt(&staff.created_at),
        ],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(code, Some(ref msg))
            if code.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            if msg.contains("staff.practice_id, staff.email") || msg.contains("idx_staff_email") {
                DatabaseError::Duplicate {
                    field: "email".into(),
                    value: staff.email.clone(),
                }
            } else if msg.contains("staff_code") {
                DatabaseError::Duplicate {
                    field: "staffCode".into(),
                    value: staff.staff_code.clone(),
                }
            } else {
                DatabaseError::ConstraintViolation(msg.clone())
            }
        }
        other => other.into(),
    })?;
    Ok(())
}

pub fn get_staff(
    conn: &Connection,
    practice_id: &Uuid,
    id: &Uuid,
) -> Result<Option<Staff>, DatabaseError> {
    let sql = format!("SELECT {STAFF_COLUMNS} FROM staff WHERE practice_id = ?1 AND id = ?2");
    let result = conn.query_row(
        &sql,
        params![practice_id.to_string(), id.to_string()],
        staff_row,
    );
    match result {
        Ok(row) => Ok(Some(staff_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// All staff whose staff code or email matches the login identifier.
///
/// Login carries no practice id, and natural keys are unique only per
/// practice, so the same identifier can exist in several tenants. The
/// caller disambiguates by password verification.
pub fn find_staff_by_identifier(
    conn: &Connection,
    identifier: &str,
) -> Result<Vec<Staff>, DatabaseError> {
    let sql = format!(
        "SELECT {STAFF_COLUMNS} FROM staff WHERE staff_code = ?1 OR email = ?1
         ORDER BY created_at ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![identifier], staff_row)?;

    let mut result = Vec::new();
    for row in rows {
        result.push(staff_from_row(row?)?);
    }
    Ok(result)
}

pub fn find_staff_by_email(conn: &Connection, email: &str) -> Result<Vec<Staff>, DatabaseError> {
    let sql = format!("SELECT {STAFF_COLUMNS} FROM staff WHERE email = ?1 ORDER BY created_at ASC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![email], staff_row)?;

    let mut result = Vec::new();
    for row in rows {
        result.push(staff_from_row(row?)?);
    }
    Ok(result)
}

pub fn list_staff(conn: &Connection, practice_id: &Uuid) -> Result<Vec<Staff>, DatabaseError> {
    let sql = format!(
        "SELECT {STAFF_COLUMNS} FROM staff WHERE practice_id = ?1
         ORDER BY last_name ASC, first_name ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![practice_id.to_string()], staff_row)?;

    let mut result = Vec::new();
    for row in rows {
        result.push(staff_from_row(row?)?);
    }
    Ok(result)
}

pub fn list_doctors(conn: &Connection, practice_id: &Uuid) -> Result<Vec<Staff>, DatabaseError> {
    let sql = format!(
        "SELECT {STAFF_COLUMNS} FROM staff WHERE practice_id = ?1 AND role = 'doctor'
         ORDER BY last_name ASC, first_name ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![practice_id.to_string()], staff_row)?;

    let mut result = Vec::new();
    for row in rows {
        result.push(staff_from_row(row?)?);
    }
    Ok(result)
}

/// Store a new reset token hash, replacing any outstanding one.
pub fn set_reset_token(
    conn: &Connection,
    staff_id: &Uuid,
    token_hash: &str,
    expires: &NaiveDateTime,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE staff SET reset_token_hash = ?2, reset_token_expires = ?3 WHERE id = ?1",
        params![staff_id.to_string(), token_hash, fmt_dt(expires)],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Staff".into(),
            id: staff_id.to_string(),
        });
    }
    Ok(())
}

/// Find the staff member holding this reset token hash, if the token
/// is still outstanding.
pub fn find_staff_by_reset_token(
    conn: &Connection,
    token_hash: &str,
) -> Result<Option<Staff>, DatabaseError> {
    let sql = format!("SELECT {STAFF_COLUMNS} FROM staff WHERE reset_token_hash = ?1");
    let result = conn.query_row(&sql, params![token_hash], staff_row);
    match result {
        Ok(row) => Ok(Some(staff_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Set a new password hash and clear any outstanding reset token.
pub fn update_password(
    conn: &Connection,
    staff_id: &Uuid,
    password_hash: &str,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE staff SET password_hash = ?2, reset_token_hash = NULL, reset_token_expires = NULL
         WHERE id = ?1",
        params![staff_id.to_string(), password_hash],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Staff".into(),
            id: staff_id.to_string(),
        });
    }
    Ok(())
}

struct StaffRow {
    id: String,
    practice_id: String,
    staff_code: String,
    first_name: String,
    last_name: String,
    email: String,
    role: String,
    password_hash: String,
    reset_token_hash: Option<String>,
    reset_token_expires: Option<String>,
    created_at: String,
}

fn staff_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StaffRow> {
    Ok(StaffRow {
        id: row.get(0)?,
        practice_id: row.get(1)?,
        staff_code: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        email: row.get(5)?,
        role: row.get(6)?,
        password_hash: row.get(7)?,
        reset_token_hash: row.get(8)?,
        reset_token_expires: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn staff_from_row(row: StaffRow) -> Result<Staff, DatabaseError> {
    Ok(Staff {
        id: parse_uuid(&row.id)?,
        practice_id: parse_uuid(&row.practice_id)?,
        staff_code: row.staff_code,
        first_name: row.first_name,
        last_name: row.last_name,
        email: row.email,
        role: Role::from_str(&row.role)?,
        password_hash: row.password_hash,
        reset_token_hash: row.reset_token_hash,
        reset_token_expires: row.reset_token_expires.map(|s| parse_dt(&s)),
        created_at: parse_dt(&row.created_at),
    })
}
