//! Queue operations: check-in, call-next, visit start/finish.
//!
//! Every status write happens inside an IMMEDIATE transaction so the
//! read (current status, next queue number) and the write commit as
//! one unit. The partial unique indexes on queue numbers and active
//! visits back this up if two writers ever race past the transaction.

use chrono::{Duration, NaiveDateTime};
use rusqlite::{Connection, TransactionBehavior};
use uuid::Uuid;

use crate::db::repository;
use crate::db::DatabaseError;
use crate::models::enums::{AppointmentStatus, AppointmentType};
use crate::models::{Appointment, NewAppointment, NewWalkIn};

use super::state::{apply, Event, TransitionContext, TransitionError};

const DEFAULT_DURATION_MINUTES: i64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("Appointment not found: {0}")]
    NotFound(Uuid),
    #[error("Doctor already has a visit in progress")]
    DoctorBusy,
}

// Raw rusqlite errors from transaction begin/commit route through the
// database taxonomy, same as repository calls.
impl From<rusqlite::Error> for SchedulingError {
    fn from(err: rusqlite::Error) -> Self {
        SchedulingError::Database(err.into())
    }
}

/// The doctor-busy condition surfaces two ways: the pre-check inside
/// the transaction, or the partial unique index if a concurrent writer
/// slipped past it.
fn map_status_error(err: DatabaseError) -> SchedulingError {
    match err {
        DatabaseError::Duplicate { ref field, .. } if field == "doctorId" => {
            SchedulingError::DoctorBusy
        }
        e => e.into(),
    }
}

fn guard_context(appt: &Appointment, now: NaiveDateTime) -> TransitionContext {
    TransitionContext {
        today: now.date(),
        appointment_date: appt.date,
        is_walk_in: appt.is_walk_in,
        already_checked_in: appt.queue_number.is_some(),
    }
}

fn load(
    conn: &Connection,
    practice_id: &Uuid,
    id: &Uuid,
) -> Result<Appointment, SchedulingError> {
    repository::get_appointment(conn, practice_id, id)?.ok_or(SchedulingError::NotFound(*id))
}

/// Book a scheduled appointment.
pub fn book(
    conn: &Connection,
    practice_id: &Uuid,
    new: &NewAppointment,
    now: NaiveDateTime,
) -> Result<Appointment, SchedulingError> {
    let duration = new.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES);
    let appt = Appointment {
        id: Uuid::new_v4(),
        practice_id: *practice_id,
        patient_id: new.patient_id,
        doctor_id: new.doctor_id,
        date: new.date,
        start_time: new.start_time,
        end_time: Some(new.start_time + Duration::minutes(duration)),
        duration_minutes: duration,
        appointment_type: new.appointment_type,
        status: AppointmentStatus::Scheduled,
        reason: new.reason.clone(),
        notes: None,
        is_walk_in: false,
        queue_number: None,
        checked_in_at: None,
        checked_in_by: None,
        created_at: now,
        updated_at: now,
    };
    repository::insert_appointment(conn, &appt)?;
    Ok(appt)
}

/// Check a patient in: assign the next queue number for (practice,
/// today) and move the appointment to in-queue, atomically.
pub fn check_in(
    conn: &mut Connection,
    practice_id: &Uuid,
    id: &Uuid,
    by: Option<&Uuid>,
    now: NaiveDateTime,
) -> Result<Appointment, SchedulingError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let appt = load(&tx, practice_id, id)?;
    apply(appt.status, Event::CheckIn, &guard_context(&appt, now))?;

    let queue_number = repository::next_queue_number(&tx, practice_id, now.date())?;
    repository::record_check_in(&tx, id, queue_number, &now, by)?;
    tx.commit()?;

    tracing::info!(appointment = %id, queue_number, "Checked in");
    load(conn, practice_id, id)
}

/// Call the next patient: the in-queue appointment with the smallest
/// queue number, optionally narrowed to one doctor. An empty queue is
/// a no-op success.
pub fn call_next(
    conn: &mut Connection,
    practice_id: &Uuid,
    doctor_id: Option<&Uuid>,
    now: NaiveDateTime,
) -> Result<Option<Appointment>, SchedulingError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let Some(next) = repository::first_in_queue(&tx, practice_id, now.date(), doctor_id)? else {
        return Ok(None);
    };
    if repository::doctor_has_active_visit(&tx, &next.doctor_id)? {
        return Err(SchedulingError::DoctorBusy);
    }
    apply(next.status, Event::StartVisit, &guard_context(&next, now))?;
    repository::set_status(&tx, &next.id, AppointmentStatus::InProgress, &now)
        .map_err(map_status_error)?;
    tx.commit()?;

    tracing::info!(appointment = %next.id, queue_number = ?next.queue_number, "Called next patient");
    load(conn, practice_id, &next.id).map(Some)
}

/// Start a specific visit by appointment id.
pub fn start_visit(
    conn: &mut Connection,
    practice_id: &Uuid,
    id: &Uuid,
    now: NaiveDateTime,
) -> Result<Appointment, SchedulingError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let appt = load(&tx, practice_id, id)?;
    apply(appt.status, Event::StartVisit, &guard_context(&appt, now))?;
    if repository::doctor_has_active_visit(&tx, &appt.doctor_id)? {
        return Err(SchedulingError::DoctorBusy);
    }
    repository::set_status(&tx, id, AppointmentStatus::InProgress, &now)
        .map_err(map_status_error)?;
    tx.commit()?;

    load(conn, practice_id, id)
}

pub fn complete_visit(
    conn: &mut Connection,
    practice_id: &Uuid,
    id: &Uuid,
    notes: Option<&str>,
    now: NaiveDateTime,
) -> Result<Appointment, SchedulingError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let appt = load(&tx, practice_id, id)?;
    apply(appt.status, Event::Complete, &guard_context(&appt, now))?;
    repository::set_status(&tx, id, AppointmentStatus::Completed, &now)?;
    if let Some(notes) = notes {
        repository::append_notes(&tx, id, notes, &now)?;
    }
    tx.commit()?;

    load(conn, practice_id, id)
}

pub fn mark_no_show(
    conn: &mut Connection,
    practice_id: &Uuid,
    id: &Uuid,
    now: NaiveDateTime,
) -> Result<Appointment, SchedulingError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let appt = load(&tx, practice_id, id)?;
    apply(appt.status, Event::MarkNoShow, &guard_context(&appt, now))?;
    repository::set_status(&tx, id, AppointmentStatus::NoShow, &now)?;
    tx.commit()?;

    load(conn, practice_id, id)
}

pub fn cancel(
    conn: &mut Connection,
    practice_id: &Uuid,
    id: &Uuid,
    now: NaiveDateTime,
) -> Result<Appointment, SchedulingError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let appt = load(&tx, practice_id, id)?;
    apply(appt.status, Event::Cancel, &guard_context(&appt, now))?;
    repository::set_status(&tx, id, AppointmentStatus::Cancelled, &now)?;
    tx.commit()?;

    load(conn, practice_id, id)
}

/// Register a walk-in: create the appointment confirmed and check it
/// in within the same transaction, so a walk-in is never observable
/// without a queue number.
pub fn create_walk_in(
    conn: &mut Connection,
    practice_id: &Uuid,
    new: &NewWalkIn,
    by: Option<&Uuid>,
    now: NaiveDateTime,
) -> Result<Appointment, SchedulingError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let appt = Appointment {
        id: Uuid::new_v4(),
        practice_id: *practice_id,
        patient_id: new.patient_id,
        doctor_id: new.doctor_id,
        date: now.date(),
        start_time: now.time(),
        end_time: None,
        duration_minutes: DEFAULT_DURATION_MINUTES,
        appointment_type: new.appointment_type.unwrap_or(AppointmentType::Consultation),
        status: AppointmentStatus::Confirmed,
        reason: new.reason.clone(),
        notes: None,
        is_walk_in: true,
        queue_number: None,
        checked_in_at: None,
        checked_in_by: None,
        created_at: now,
        updated_at: now,
    };
    repository::insert_appointment(&tx, &appt)?;

    let queue_number = repository::next_queue_number(&tx, practice_id, now.date())?;
    repository::record_check_in(&tx, &appt.id, queue_number, &now, by)?;
    tx.commit()?;

    tracing::info!(appointment = %appt.id, queue_number, "Walk-in registered");
    load(conn, practice_id, &appt.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::appointment::{clinic_fixture, sample_appointment};
    use chrono::Utc;

    fn setup() -> (Connection, Uuid, Uuid, Uuid) {
        clinic_fixture()
    }

    fn booked_today(
        conn: &Connection,
        practice_id: Uuid,
        patient_id: Uuid,
        doctor_id: Uuid,
        start: &str,
    ) -> Appointment {
        let appt = sample_appointment(
            practice_id,
            patient_id,
            doctor_id,
            Utc::now().date_naive(),
            start,
        );
        repository::insert_appointment(conn, &appt).unwrap();
        appt
    }

    #[test]
    fn check_in_assigns_sequential_numbers() {
        let (mut conn, practice_id, doctor_id, patient_id) = setup();
        let now = Utc::now().naive_utc();

        let a = booked_today(&conn, practice_id, patient_id, doctor_id, "09:00");
        let b = booked_today(&conn, practice_id, patient_id, doctor_id, "09:30");

        let a = check_in(&mut conn, &practice_id, &a.id, None, now).unwrap();
        let b = check_in(&mut conn, &practice_id, &b.id, None, now).unwrap();

        assert_eq!(a.queue_number, Some(1));
        assert_eq!(b.queue_number, Some(2));
        assert_eq!(a.status, AppointmentStatus::InQueue);
        assert!(a.checked_in_at.is_some());
    }

    #[test]
    fn double_check_in_rejected_and_number_kept() {
        let (mut conn, practice_id, doctor_id, patient_id) = setup();
        let now = Utc::now().naive_utc();

        let appt = booked_today(&conn, practice_id, patient_id, doctor_id, "09:00");
        check_in(&mut conn, &practice_id, &appt.id, None, now).unwrap();

        let err = check_in(&mut conn, &practice_id, &appt.id, None, now).unwrap_err();
        assert!(matches!(
            err,
            SchedulingError::Transition(TransitionError::AlreadyCheckedIn)
        ));

        let stored = load(&conn, &practice_id, &appt.id).unwrap();
        assert_eq!(stored.queue_number, Some(1));
    }

    #[test]
    fn check_in_rejected_for_future_appointment() {
        let (mut conn, practice_id, doctor_id, patient_id) = setup();
        let now = Utc::now().naive_utc();
        let tomorrow = now.date() + Duration::days(1);

        let appt = sample_appointment(practice_id, patient_id, doctor_id, tomorrow, "09:00");
        repository::insert_appointment(&conn, &appt).unwrap();

        let err = check_in(&mut conn, &practice_id, &appt.id, None, now).unwrap_err();
        assert!(matches!(
            err,
            SchedulingError::Transition(TransitionError::NotToday)
        ));
    }

    #[test]
    fn call_next_is_fifo_and_completion_clears_queue() {
        let (mut conn, practice_id, doctor_id, patient_id) = setup();
        let now = Utc::now().naive_utc();

        let first = booked_today(&conn, practice_id, patient_id, doctor_id, "10:00");
        let second = booked_today(&conn, practice_id, patient_id, doctor_id, "09:00");
        check_in(&mut conn, &practice_id, &first.id, None, now).unwrap();
        check_in(&mut conn, &practice_id, &second.id, None, now).unwrap();

        // Queue order follows check-in, not schedule.
        let called = call_next(&mut conn, &practice_id, None, now).unwrap().unwrap();
        assert_eq!(called.id, first.id);
        assert_eq!(called.status, AppointmentStatus::InProgress);

        complete_visit(&mut conn, &practice_id, &first.id, Some("BP normal"), now).unwrap();

        let queue = repository::list_queue(&conn, &practice_id, now.date()).unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].id, second.id);

        let called = call_next(&mut conn, &practice_id, None, now).unwrap().unwrap();
        assert_eq!(called.id, second.id);
    }

    #[test]
    fn call_next_on_empty_queue_is_noop() {
        let (mut conn, practice_id, _, _) = setup();
        let now = Utc::now().naive_utc();
        assert!(call_next(&mut conn, &practice_id, None, now).unwrap().is_none());
    }

    #[test]
    fn call_next_refuses_while_doctor_busy() {
        let (mut conn, practice_id, doctor_id, patient_id) = setup();
        let now = Utc::now().naive_utc();

        let a = booked_today(&conn, practice_id, patient_id, doctor_id, "09:00");
        let b = booked_today(&conn, practice_id, patient_id, doctor_id, "09:30");
        check_in(&mut conn, &practice_id, &a.id, None, now).unwrap();
        check_in(&mut conn, &practice_id, &b.id, None, now).unwrap();

        call_next(&mut conn, &practice_id, None, now).unwrap();
        let err = call_next(&mut conn, &practice_id, None, now).unwrap_err();
        assert!(matches!(err, SchedulingError::DoctorBusy));
    }

    #[test]
    fn walk_in_lands_in_queue_immediately() {
        let (mut conn, practice_id, doctor_id, patient_id) = setup();
        let now = Utc::now().naive_utc();

        let walk_in = NewWalkIn {
            patient_id,
            doctor_id,
            appointment_type: None,
            reason: Some("Acute pain".into()),
        };
        let appt = create_walk_in(&mut conn, &practice_id, &walk_in, None, now).unwrap();

        assert!(appt.is_walk_in);
        assert_eq!(appt.status, AppointmentStatus::InQueue);
        assert_eq!(appt.queue_number, Some(1));
        assert_eq!(appt.appointment_type, AppointmentType::Consultation);
    }

    #[test]
    fn cancelled_appointment_cannot_be_checked_in() {
        let (mut conn, practice_id, doctor_id, patient_id) = setup();
        let now = Utc::now().naive_utc();

        let appt = booked_today(&conn, practice_id, patient_id, doctor_id, "09:00");
        cancel(&mut conn, &practice_id, &appt.id, now).unwrap();

        let err = check_in(&mut conn, &practice_id, &appt.id, None, now).unwrap_err();
        assert!(matches!(
            err,
            SchedulingError::Transition(TransitionError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn no_show_marks_missed_appointment() {
        let (mut conn, practice_id, doctor_id, patient_id) = setup();
        let now = Utc::now().naive_utc();

        let appt = booked_today(&conn, practice_id, patient_id, doctor_id, "08:00");
        let updated = mark_no_show(&mut conn, &practice_id, &appt.id, now).unwrap();
        assert_eq!(updated.status, AppointmentStatus::NoShow);
    }

    #[test]
    fn raw_sqlite_errors_fold_into_database_variant() {
        let err = SchedulingError::from(rusqlite::Error::QueryReturnedNoRows);
        assert!(matches!(
            err,
            SchedulingError::Database(DatabaseError::Sqlite(_))
        ));
    }

    #[test]
    fn book_computes_end_time() {
        let (conn, practice_id, doctor_id, patient_id) = setup();
        let now = Utc::now().naive_utc();

        let new = NewAppointment {
            patient_id,
            doctor_id,
            date: now.date(),
            start_time: chrono::NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            duration_minutes: Some(20),
            appointment_type: AppointmentType::Checkup,
            reason: None,
        };
        let appt = book(&conn, &practice_id, &new, now).unwrap();
        assert_eq!(
            appt.end_time,
            chrono::NaiveTime::from_hms_opt(9, 20, 0)
        );
        assert_eq!(appt.status, AppointmentStatus::Scheduled);
    }
}
