//! Appointment lifecycle as a pure transition function.
//!
//! All status changes in the crate go through [`apply`]; the database
//! layer never decides whether a move is legal, it only records it.

use chrono::NaiveDate;

use crate::models::enums::AppointmentStatus;

/// What the caller is trying to do to an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    CheckIn,
    StartVisit,
    Complete,
    MarkNoShow,
    Cancel,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::CheckIn => "check-in",
            Event::StartVisit => "start-visit",
            Event::Complete => "complete",
            Event::MarkNoShow => "mark-no-show",
            Event::Cancel => "cancel",
        }
    }
}

/// Guard inputs the transition table needs beside the current status.
#[derive(Debug, Clone, Copy)]
pub struct TransitionContext {
    pub today: NaiveDate,
    pub appointment_date: NaiveDate,
    pub is_walk_in: bool,
    pub already_checked_in: bool,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Cannot {event} an appointment that is {status}")]
    InvalidTransition {
        status: &'static str,
        event: &'static str,
    },
    #[error("Appointment is not scheduled for today")]
    NotToday,
    #[error("Appointment is already checked in")]
    AlreadyCheckedIn,
    #[error("Appointment date is in the future")]
    DateInFuture,
}

/// The transition table. Lifecycle moves forward only; terminal states
/// absorb every event.
pub fn apply(
    status: AppointmentStatus,
    event: Event,
    ctx: &TransitionContext,
) -> Result<AppointmentStatus, TransitionError> {
    use AppointmentStatus::*;
    use Event::*;

    let invalid = || TransitionError::InvalidTransition {
        status: status.as_str(),
        event: event.as_str(),
    };

    match (status, event) {
        (Scheduled | Confirmed, CheckIn) => {
            if ctx.already_checked_in {
                return Err(TransitionError::AlreadyCheckedIn);
            }
            if ctx.appointment_date != ctx.today {
                return Err(TransitionError::NotToday);
            }
            Ok(InQueue)
        }
        (Scheduled | Confirmed, MarkNoShow) => {
            if ctx.appointment_date > ctx.today {
                return Err(TransitionError::DateInFuture);
            }
            Ok(NoShow)
        }
        // Holding a queue number already; the second swipe at the desk.
        (InQueue | InProgress, CheckIn) => Err(TransitionError::AlreadyCheckedIn),
        // A walk-in may be taken straight into the room without
        // passing through the queue.
        (Scheduled | Confirmed, StartVisit) if ctx.is_walk_in => Ok(InProgress),
        (InQueue, StartVisit) => Ok(InProgress),
        (InProgress, Complete) => Ok(Completed),
        (s, Cancel) if !s.is_terminal() => Ok(Cancelled),
        _ => Err(invalid()),
    }
}
