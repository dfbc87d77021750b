use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::{AppointmentStatus, AppointmentType};
use crate::models::Appointment;

use super::{fmt_dt, parse_dt, parse_uuid};

const APPOINTMENT_COLUMNS: &str = "id, practice_id, patient_id, doctor_id, date, start_time,
    end_time, duration_minutes, appointment_type, status, reason, notes, is_walk_in,
    queue_number, checked_in_at, checked_in_by, created_at, updated_at";

pub fn insert_appointment(conn: &Connection, appt: &Appointment) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO appointments (id, practice_id, patient_id, doctor_id, date, start_time,
         end_time, duration_minutes, appointment_type, status, reason, notes, is_walk_in,
         queue_number, checked_in_at, checked_in_by, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
        params![
            appt.id.to_string(),
            appt.practice_id.to_string(),
            appt.patient_id.to_string(),
            appt.doctor_id.to_string(),
            appt.date.to_string(),
            appt.start_time.format("%H:%M:%S").to_string(),
            appt.end_time.map(|t| t.format("%H:%M:%S").to_string()),
            appt.duration_minutes,
            appt.appointment_type.as_str(),
            appt.status.as_str(),
            appt.reason,
            appt.notes,
            appt.is_walk_in as i32,
            appt.queue_number,
            appt.checked_in_at.as_ref().map(fmt_dt),
            appt.checked_in_by.map(|id| id.to_string()),
            fmt_dt(&appt.created_at),
            fmt_dt(&appt.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_appointment(
    conn: &Connection,
    practice_id: &Uuid,
    id: &Uuid,
) -> Result<Option<Appointment>, DatabaseError> {
    let sql =
        format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE practice_id = ?1 AND id = ?2");
    let result = conn.query_row(
        &sql,
        params![practice_id.to_string(), id.to_string()],
        appointment_row,
    );
    match result {
        Ok(row) => Ok(Some(appointment_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// All appointments on one calendar day, optionally narrowed to one
/// doctor, ordered by scheduled start time.
pub fn list_for_day(
    conn: &Connection,
    practice_id: &Uuid,
    date: NaiveDate,
    doctor_id: Option<&Uuid>,
) -> Result<Vec<Appointment>, DatabaseError> {
    let sql = format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE practice_id = ?1 AND date = ?2
           AND (?3 IS NULL OR doctor_id = ?3)
         ORDER BY start_time ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![
            practice_id.to_string(),
            date.to_string(),
            doctor_id.map(|id| id.to_string()),
        ],
        appointment_row,
    )?;

    let mut result = Vec::new();
    for row in rows {
        result.push(appointment_from_row(row?)?);
    }
    Ok(result)
}

/// The waiting room: in-queue appointments for the day in check-in
/// order (FIFO by queue number, not by scheduled time).
pub fn list_queue(
    conn: &Connection,
    practice_id: &Uuid,
    date: NaiveDate,
) -> Result<Vec<Appointment>, DatabaseError> {
    let sql = format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE practice_id = ?1 AND date = ?2 AND status = 'in-queue'
         ORDER BY queue_number ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![practice_id.to_string(), date.to_string()],
        appointment_row,
    )?;

    let mut result = Vec::new();
    for row in rows {
        result.push(appointment_from_row(row?)?);
    }
    Ok(result)
}

/// Next queue number for (practice, day): max existing + 1, starting
/// at 1. Callers must hold an IMMEDIATE transaction; the partial
/// unique index backs this up if they do not.
pub fn next_queue_number(
    conn: &Connection,
    practice_id: &Uuid,
    date: NaiveDate,
) -> Result<i64, DatabaseError> {
    let next = conn.query_row(
        "SELECT COALESCE(MAX(queue_number), 0) + 1 FROM appointments
         WHERE practice_id = ?1 AND date = ?2",
        params![practice_id.to_string(), date.to_string()],
        |row| row.get(0),
    )?;
    Ok(next)
}

/// The in-queue appointment with the smallest queue number, optionally
/// for a specific doctor.
pub fn first_in_queue(
    conn: &Connection,
    practice_id: &Uuid,
    date: NaiveDate,
    doctor_id: Option<&Uuid>,
) -> Result<Option<Appointment>, DatabaseError> {
    let sql = format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE practice_id = ?1 AND date = ?2 AND status = 'in-queue'
           AND (?3 IS NULL OR doctor_id = ?3)
         ORDER BY queue_number ASC LIMIT 1"
    );
    let result = conn.query_row(
        &sql,
        params![
            practice_id.to_string(),
            date.to_string(),
            doctor_id.map(|id| id.to_string()),
        ],
        appointment_row,
    );
    match result {
        Ok(row) => Ok(Some(appointment_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn doctor_has_active_visit(
    conn: &Connection,
    doctor_id: &Uuid,
) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM appointments WHERE doctor_id = ?1 AND status = 'in-progress'",
        params![doctor_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Write the check-in result: status, queue number and audit fields
/// in one statement.
pub fn record_check_in(
    conn: &Connection,
    id: &Uuid,
    queue_number: i64,
    at: &NaiveDateTime,
    by: Option<&Uuid>,
) -> Result<(), DatabaseError> {
    let rows = conn
        .execute(
            "UPDATE appointments SET status = 'in-queue', queue_number = ?2,
             checked_in_at = ?3, checked_in_by = ?4, updated_at = ?3
             WHERE id = ?1",
            params![
                id.to_string(),
                queue_number,
                fmt_dt(at),
                by.map(|b| b.to_string()),
            ],
        )
        .map_err(|e| {
            DatabaseError::classify_unique(
                e,
                "appointments.practice_id, appointments.date, appointments.queue_number",
                "queueNumber",
                &queue_number.to_string(),
            )
        })?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Appointment".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Plain status write. The partial unique index on in-progress visits
/// turns a double-start for the same doctor into a constraint error.
pub fn set_status(
    conn: &Connection,
    id: &Uuid,
    status: AppointmentStatus,
    at: &NaiveDateTime,
) -> Result<(), DatabaseError> {
    let rows = conn
        .execute(
            "UPDATE appointments SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![id.to_string(), status.as_str(), fmt_dt(at)],
        )
        .map_err(|e| {
            DatabaseError::classify_unique(e, "appointments.doctor_id", "doctorId", "in-progress")
        })?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Appointment".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Add a line to the visit notes, keeping anything already recorded.
pub fn append_notes(
    conn: &Connection,
    id: &Uuid,
    notes: &str,
    at: &NaiveDateTime,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE appointments
         SET notes = CASE WHEN notes IS NULL OR notes = '' THEN ?2
                     ELSE notes || char(10) || ?2 END,
             updated_at = ?3
         WHERE id = ?1",
        params![id.to_string(), notes, fmt_dt(at)],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Appointment".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

struct AppointmentRow {
    id: String,
    practice_id: String,
    patient_id: String,
    doctor_id: String,
    date: String,
    start_time: String,
    end_time: Option<String>,
    duration_minutes: i64,
    appointment_type: String,
    status: String,
    reason: Option<String>,
    notes: Option<String>,
    is_walk_in: i32,
    queue_number: Option<i64>,
    checked_in_at: Option<String>,
    checked_in_by: Option<String>,
    created_at: String,
    updated_at: String,
}

fn appointment_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AppointmentRow> {
    Ok(AppointmentRow {
        id: row.get(0)?,
        practice_id: row.get(1)?,
        patient_id: row.get(2)?,
        doctor_id: row.get(3)?,
        date: row.get(4)?,
        start_time: row.get(5)?,
        end_time: row.get(6)?,
        duration_minutes: row.get(7)?,
        appointment_type: row.get(8)?,
        status: row.get(9)?,
        reason: row.get(10)?,
        notes: row.get(11)?,
        is_walk_in: row.get(12)?,
        queue_number: row.get(13)?,
        checked_in_at: row.get(14)?,
        checked_in_by: row.get(15)?,
        created_at: row.get(16)?,
        updated_at: row.get(17)?,
    })
}

fn appointment_from_row(row: AppointmentRow) -> Result<Appointment, DatabaseError> {
    Ok(Appointment {
        id: parse_uuid(&row.id)?,
        practice_id: parse_uuid(&row.practice_id)?,
        patient_id: parse_uuid(&row.patient_id)?,
        doctor_id: parse_uuid(&row.doctor_id)?,
        date: NaiveDate::parse_from_str(&row.date, "%Y-%m-%d").unwrap_or_default(),
        start_time: NaiveTime::parse_from_str(&row.start_time, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(&row.start_time, "%H:%M"))
            .unwrap_or_default(),
        end_time: row
            .end_time
            .and_then(|t| NaiveTime::parse_from_str(&t, "%H:%M:%S").ok()),
        duration_minutes: row.duration_minutes,
        appointment_type: AppointmentType::from_str(&row.appointment_type)?,
        status: AppointmentStatus::from_str(&row.status)?,
        reason: row.reason,
        notes: row.notes,
        is_walk_in: row.is_walk_in != 0,
        queue_number: row.queue_number,
        checked_in_at: row.checked_in_at.map(|s| parse_dt(&s)),
        checked_in_by: row.checked_in_by.and_then(|s| Uuid::parse_str(&s).ok()),
        created_at: parse_dt(&row.created_at),
        updated_at: parse_dt(&row.updated_at),
    })
}

/// Shared fixture for queue/scheduling tests: one practice, one
/// doctor, one registered patient.
#[cfg(test)]
pub(crate) fn clinic_fixture() -> (Connection, Uuid, Uuid, Uuid) {
    use crate::db::open_memory_database;
    use crate::db::repository::patient::sample_patient;
    use crate::models::enums::Role;
    use crate::models::{Practice, Staff};
    use chrono::Utc;

    let conn = open_memory_database().unwrap();
    let now = Utc::now().naive_utc();
    let practice = Practice {
        id: Uuid::new_v4(),
        name: "Test Clinic".into(),
        join_code: "TEST01".into(),
        created_at: now,
    };
    super::insert_practice(&conn, &practice).unwrap();

    let doctor = Staff {
        id: Uuid::new_v4(),
        practice_id: practice.id,
        staff_code: "DR001".into(),
        first_name: "Thandi".into(),
        last_name: "Mokoena".into(),
        email: "doc@x.test".into(),
        role: Role::Doctor,
        password_hash: "stub".into(),
        reset_token_hash: None,
        reset_token_expires: None,
        created_at: now,
    };
    super::insert_staff(&conn, &doctor).unwrap();

    let patient = sample_patient(practice.id, "9001015009087");
    super::insert_patient(&conn, &patient).unwrap();

    (conn, practice.id, doctor.id, patient.id)
}

#[cfg(test)]
pub(crate) fn sample_appointment(
    practice_id: Uuid,
    patient_id: Uuid,
    doctor_id: Uuid,
    date: NaiveDate,
    start: &str,
) -> Appointment {
    let now = chrono::Utc::now().naive_utc();
    Appointment {
        id: Uuid::new_v4(),
        practice_id,
        patient_id,
        doctor_id,
        date,
        start_time: NaiveTime::parse_from_str(start, "%H:%M").unwrap(),
        end_time: None,
        duration_minutes: 15,
        appointment_type: AppointmentType::Checkup,
        status: AppointmentStatus::Scheduled,
        reason: None,
        notes: None,
        is_walk_in: false,
        queue_number: None,
        checked_in_at: None,
        checked_in_by: None,
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn setup() -> (Connection, Uuid, Uuid, Uuid) {
        clinic_fixture()
    }

    #[test]
    fn insert_and_fetch() {
        let (conn, practice_id, doctor_id, patient_id) = setup();
        let today = Utc::now().date_naive();
        let appt = sample_appointment(practice_id, patient_id, doctor_id, today, "09:00");
        insert_appointment(&conn, &appt).unwrap();

        let fetched = get_appointment(&conn, &practice_id, &appt.id).unwrap().unwrap();
        assert_eq!(fetched.status, AppointmentStatus::Scheduled);
        assert_eq!(fetched.start_time.format("%H:%M").to_string(), "09:00");
        assert!(fetched.queue_number.is_none());
    }

    #[test]
    fn queue_number_computation_starts_at_one() {
        let (conn, practice_id, doctor_id, patient_id) = setup();
        let today = Utc::now().date_naive();

        assert_eq!(next_queue_number(&conn, &practice_id, today).unwrap(), 1);

        let appt = sample_appointment(practice_id, patient_id, doctor_id, today, "09:00");
        insert_appointment(&conn, &appt).unwrap();
        record_check_in(&conn, &appt.id, 1, &Utc::now().naive_utc(), None).unwrap();

        assert_eq!(next_queue_number(&conn, &practice_id, today).unwrap(), 2);
    }

    #[test]
    fn duplicate_queue_number_same_day_rejected_by_index() {
        let (conn, practice_id, doctor_id, patient_id) = setup();
        let today = Utc::now().date_naive();
        let now = Utc::now().naive_utc();

        let a = sample_appointment(practice_id, patient_id, doctor_id, today, "09:00");
        let b = sample_appointment(practice_id, patient_id, doctor_id, today, "09:30");
        insert_appointment(&conn, &a).unwrap();
        insert_appointment(&conn, &b).unwrap();

        record_check_in(&conn, &a.id, 1, &now, None).unwrap();
        let err = record_check_in(&conn, &b.id, 1, &now, None).unwrap_err();
        assert!(matches!(err, DatabaseError::Duplicate { .. }));
    }

    #[test]
    fn queue_lists_in_fifo_order() {
        let (conn, practice_id, doctor_id, patient_id) = setup();
        let today = Utc::now().date_naive();
        let now = Utc::now().naive_utc();

        // Later start time checks in first: queue order must follow
        // check-in order, not the schedule.
        let late = sample_appointment(practice_id, patient_id, doctor_id, today, "11:00");
        let early = sample_appointment(practice_id, patient_id, doctor_id, today, "09:00");
        insert_appointment(&conn, &late).unwrap();
        insert_appointment(&conn, &early).unwrap();

        record_check_in(&conn, &late.id, 1, &now, None).unwrap();
        record_check_in(&conn, &early.id, 2, &now, None).unwrap();

        let queue = list_queue(&conn, &practice_id, today).unwrap();
        assert_eq!(queue.len(), 2);
        assert_eq!(queue[0].id, late.id);
        assert_eq!(queue[1].id, early.id);

        let first = first_in_queue(&conn, &practice_id, today, None).unwrap().unwrap();
        assert_eq!(first.id, late.id);
    }

    #[test]
    fn notes_accumulate_instead_of_overwriting() {
        let (conn, practice_id, doctor_id, patient_id) = setup();
        let today = Utc::now().date_naive();
        let now = Utc::now().naive_utc();

        let appt = sample_appointment(practice_id, patient_id, doctor_id, today, "09:00");
        insert_appointment(&conn, &appt).unwrap();

        append_notes(&conn, &appt.id, "BP 120/80", &now).unwrap();
        append_notes(&conn, &appt.id, "Prescribed rest", &now).unwrap();

        let stored = get_appointment(&conn, &practice_id, &appt.id).unwrap().unwrap();
        assert_eq!(stored.notes.as_deref(), Some("BP 120/80\nPrescribed rest"));
    }

    #[test]
    fn double_start_for_one_doctor_rejected_by_index() {
        let (conn, practice_id, doctor_id, patient_id) = setup();
        let today = Utc::now().date_naive();
        let now = Utc::now().naive_utc();

        let a = sample_appointment(practice_id, patient_id, doctor_id, today, "09:00");
        let b = sample_appointment(practice_id, patient_id, doctor_id, today, "09:30");
        insert_appointment(&conn, &a).unwrap();
        insert_appointment(&conn, &b).unwrap();

        set_status(&conn, &a.id, AppointmentStatus::InProgress, &now).unwrap();
        assert!(doctor_has_active_visit(&conn, &doctor_id).unwrap());

        let err = set_status(&conn, &b.id, AppointmentStatus::InProgress, &now).unwrap_err();
        assert!(matches!(err, DatabaseError::Duplicate { .. }));
    }

    #[test]
    fn day_listing_filters_by_doctor() {
        let (conn, practice_id, doctor_id, patient_id) = setup();
        let today = Utc::now().date_naive();

        let appt = sample_appointment(practice_id, patient_id, doctor_id, today, "09:00");
        insert_appointment(&conn, &appt).unwrap();

        assert_eq!(list_for_day(&conn, &practice_id, today, None).unwrap().len(), 1);
        assert_eq!(
            list_for_day(&conn, &practice_id, today, Some(&doctor_id)).unwrap().len(),
            1
        );
        let other = Uuid::new_v4();
        assert!(list_for_day(&conn, &practice_id, today, Some(&other)).unwrap().is_empty());
    }
}
