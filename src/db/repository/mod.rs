pub mod appointment;
pub mod file;
pub mod patient;
pub mod practice;
pub mod staff;

pub use appointment::*;
pub use file::*;
pub use patient::*;
pub use practice::*;
pub use staff::*;

use chrono::NaiveDateTime;

use super::DatabaseError;

/// Datetime storage format. SQLite has no datetime type; every
/// timestamp column holds this exact text form.
pub(crate) const DT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub(crate) fn fmt_dt(dt: &NaiveDateTime) -> String {
    dt.format(DT_FORMAT).to_string()
}

pub(crate) fn parse_dt(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, DT_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .unwrap_or_default()
}

pub(crate) fn parse_uuid(s: &str) -> Result<uuid::Uuid, DatabaseError> {
    uuid::Uuid::parse_str(s).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datetime_round_trips() {
        let dt = chrono::NaiveDate::from_ymd_opt(2026, 8, 29)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        assert_eq!(parse_dt(&fmt_dt(&dt)), dt);
    }

    #[test]
    fn iso_t_separator_accepted() {
        let dt = parse_dt("2026-08-29T09:30:00");
        assert_eq!(dt.format("%H:%M").to_string(), "09:30");
    }
}
