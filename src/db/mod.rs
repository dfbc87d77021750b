pub mod repository;
pub mod sqlite;

pub use repository::*;
pub use sqlite::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Duplicate {field}: {value}")]
    Duplicate { field: String, value: String },

    #[error("Constraint violated: {0}")]
    ConstraintViolation(String),
}

impl DatabaseError {
    /// Classify a raw SQLite error against a known natural-key index.
    ///
    /// Uniqueness failures surface as `SQLITE_CONSTRAINT_UNIQUE` with the
    /// index column list in the message; anything matching `index_hint`
    /// becomes a `Duplicate` carrying the offending value so controllers
    /// can answer with a specific conflict code instead of a generic 500.
    pub fn classify_unique(err: rusqlite::Error, index_hint: &str, field: &str, value: &str) -> Self {
        if let rusqlite::Error::SqliteFailure(code, Some(ref msg)) = err {
            if code.code == rusqlite::ErrorCode::ConstraintViolation && msg.contains(index_hint) {
                return DatabaseError::Duplicate {
                    field: field.into(),
                    value: value.into(),
                };
            }
        }
        DatabaseError::Sqlite(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_error_message_names_field() {
        let err = DatabaseError::Duplicate {
            field: "id_number".into(),
            value: "9001015009087".into(),
        };
        assert_eq!(err.to_string(), "Duplicate id_number: 9001015009087");
    }
}
