use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::Role;
use crate::models::{Invitation, Practice};

use super::{fmt_dt, parse_dt, parse_uuid};

pub fn insert_practice(conn: &Connection, practice: &Practice) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO practices (id, name, join_code, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            practice.id.to_string(),
            practice.name,
            practice.join_code,
            fmt_dt(&practice.created_at),
        ],
    )
    .map_err(|e| {
        DatabaseError::classify_unique(e, "practices.join_code", "joinCode", &practice.join_code)
    })?;
    Ok(())
}

pub fn get_practice(conn: &Connection, id: &Uuid) -> Result<Option<Practice>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, name, join_code, created_at FROM practices WHERE id = ?1",
        params![id.to_string()],
        practice_row,
    );
    match result {
        Ok(row) => Ok(Some(practice_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_practice_by_join_code(
    conn: &Connection,
    join_code: &str,
) -> Result<Option<Practice>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, name, join_code, created_at FROM practices WHERE join_code = ?1",
        params![join_code],
        practice_row,
    );
    match result {
        Ok(row) => Ok(Some(practice_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn insert_invitation(conn: &Connection, invitation: &Invitation) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO invitations (code, practice_id, role, created_by, expires_at, used_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            invitation.code,
            invitation.practice_id.to_string(),
            invitation.role.as_str(),
            invitation.created_by.map(|id| id.to_string()),
            fmt_dt(&invitation.expires_at),
            invitation.used_at.as_ref().map(fmt_dt),
        ],
    )?;
    Ok(())
}

pub fn get_invitation(conn: &Connection, code: &str) -> Result<Option<Invitation>, DatabaseError> {
    let result = conn.query_row(
        "SELECT code, practice_id, role, created_by, expires_at, used_at
         FROM invitations WHERE code = ?1",
        params![code],
        |row| {
            Ok(InvitationRow {
                code: row.get(0)?,
                practice_id: row.get(1)?,
                role: row.get(2)?,
                created_by: row.get(3)?,
                expires_at: row.get(4)?,
                used_at: row.get(5)?,
            })
        },
    );
    match result {
        Ok(row) => Ok(Some(invitation_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Mark an invitation consumed. A code is single-use; the WHERE clause
/// makes a double consume a no-op that reports NotFound.
pub fn mark_invitation_used(
    conn: &Connection,
    code: &str,
    at: &NaiveDateTime,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE invitations SET used_at = ?2 WHERE code = ?1 AND used_at IS NULL",
        params![code, fmt_dt(at)],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Invitation".into(),
            id: code.into(),
        });
    }
    Ok(())
}

struct PracticeRow {
    id: String,
    name: String,
    join_code: String,
    created_at: String,
}

fn practice_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PracticeRow> {
    Ok(PracticeRow {
        id: row.get(0)?,
        name: row.get(1)?,
        join_code: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn practice_from_row(row: PracticeRow) -> Result<Practice, DatabaseError> {
    Ok(Practice {
        id: parse_uuid(&row.id)?,
        name: row.name,
        join_code: row.join_code,
        created_at: parse_dt(&row.created_at),
    })
}

struct InvitationRow {
    code: String,
    practice_id: String,
    role: String,
    created_by: Option<String>,
    expires_at: String,
    used_at: Option<String>,
}

fn invitation_from_row(row: InvitationRow) -> Result<Invitation, DatabaseError> {
    Ok(Invitation {
        code: row.code,
        practice_id: parse_uuid(&row.practice_id)?,
        role: Role::from_str(&row.role)?,
        created_by: row.created_by.and_then(|s| Uuid::parse_str(&s).ok()),
        expires_at: parse_dt(&row.expires_at),
        used_at: row.used_at.map(|s| parse_dt(&s)),
    })
}
