use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{AppointmentStatus, AppointmentType};

/// An appointment — the one entity with real lifecycle logic.
///
/// `queue_number` is assigned exactly once, at the transition into
/// `in-queue`, and is unique per (practice, calendar day). It is never
/// reassigned or reused within that day.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub practice_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: Option<NaiveTime>,
    pub duration_minutes: i64,
    #[serde(rename = "type")]
    pub appointment_type: AppointmentType,
    pub status: AppointmentStatus,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub is_walk_in: bool,
    pub queue_number: Option<i64>,
    pub checked_in_at: Option<NaiveDateTime>,
    pub checked_in_by: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Payload for booking a scheduled appointment.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: Option<i64>,
    #[serde(rename = "type")]
    pub appointment_type: AppointmentType,
    pub reason: Option<String>,
}

/// Payload for registering a walk-in: no scheduled slot, the patient
/// is standing at the desk, so it goes straight through check-in.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWalkIn {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    #[serde(rename = "type")]
    pub appointment_type: Option<AppointmentType>,
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appointment_type_field_serializes_as_type() {
        let now = chrono::Utc::now().naive_utc();
        let appt = Appointment {
            id: Uuid::new_v4(),
            practice_id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            date: now.date(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
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
        };
        let json = serde_json::to_value(&appt).unwrap();
        assert_eq!(json["type"], "checkup");
        assert_eq!(json["status"], "scheduled");
        assert!(json["queueNumber"].is_null());
    }

    #[test]
    fn new_appointment_parses_minimal_payload() {
        let payload: NewAppointment = serde_json::from_str(
            r#"{
                "patientId": "8f0a2f3e-33aa-4f6c-9f3e-6d2b6f5c0c11",
                "doctorId": "7a0a2f3e-33aa-4f6c-9f3e-6d2b6f5c0c22",
                "date": "2026-08-29",
                "startTime": "09:00:00",
                "type": "follow-up"
            }"#,
        )
        .unwrap();
        assert_eq!(payload.appointment_type, AppointmentType::FollowUp);
        assert!(payload.duration_minutes.is_none());
    }
}
