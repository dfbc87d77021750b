//! API error taxonomy with the structured JSON error envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::auth::AuthError;
use crate::db::DatabaseError;
use crate::files::FileError;
use crate::models::FileRecord;
use crate::scheduling::SchedulingError;

/// Error envelope: `{success:false, error:{code,message,details?}, timestamp}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: ErrorDetail,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Validation failed: {0}")]
    Validation(String),
    /// Uniqueness conflicts, one code per natural key so clients can
    /// branch on them.
    #[error("{message}")]
    Conflict {
        code: &'static str,
        message: String,
    },
    #[error("Duplicate file detected")]
    DuplicateFile(Vec<FileRecord>),
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Authentication required")]
    Unauthorized,
    #[error("Token expired")]
    TokenExpired,
    #[error("Forbidden")]
    Forbidden,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut details = None;
        let (status, code, message) = match &self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION", msg.clone()),
            ApiError::Conflict { code, message } => {
                (StatusCode::BAD_REQUEST, *code, message.clone())
            }
            ApiError::DuplicateFile(matches) => {
                details = serde_json::to_value(matches)
                    .ok()
                    .map(|files| serde_json::json!({ "duplicates": files }));
                (
                    StatusCode::BAD_REQUEST,
                    "DUPLICATE_FILE",
                    "A file with the same name and size already exists for this patient"
                        .to_string(),
                )
            }
            ApiError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                "Invalid credentials".to_string(),
            ),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REQUIRED",
                "Authentication required".to_string(),
            ),
            ApiError::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                "TOKEN_EXPIRED",
                "Token expired, re-authenticate".to_string(),
            ),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "Your role does not allow this action".to_string(),
            ),
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail.clone()),
            ApiError::InvalidTransition(detail) => (
                StatusCode::BAD_REQUEST,
                "INVALID_TRANSITION",
                detail.clone(),
            ),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            success: false,
            error: ErrorDetail {
                code,
                message,
                details,
            },
            timestamp: Utc::now().to_rfc3339(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Duplicate { field, value } => {
                let code = match field.as_str() {
                    "idNumber" => "DUPLICATE_ID_NUMBER",
                    "email" => "DUPLICATE_EMAIL",
                    "staffCode" => "DUPLICATE_STAFF_CODE",
                    "joinCode" => "DUPLICATE_JOIN_CODE",
                    _ => "DUPLICATE",
                };
                ApiError::Conflict {
                    code,
                    message: format!("A record with {field} '{value}' already exists"),
                }
            }
            DatabaseError::NotFound { entity_type, id } => {
                ApiError::NotFound(format!("{entity_type} {id} not found"))
            }
            e => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => ApiError::InvalidCredentials,
            AuthError::TokenExpired => ApiError::TokenExpired,
            AuthError::InvalidToken => ApiError::Unauthorized,
            AuthError::Hashing(detail) => ApiError::Internal(detail),
        }
    }
}

impl From<SchedulingError> for ApiError {
    fn from(err: SchedulingError) -> Self {
        match err {
            SchedulingError::Database(e) => e.into(),
            SchedulingError::Transition(e) => ApiError::InvalidTransition(e.to_string()),
            SchedulingError::NotFound(id) => ApiError::NotFound(format!("Appointment {id} not found")),
            SchedulingError::DoctorBusy => ApiError::Conflict {
                code: "DOCTOR_BUSY",
                message: "Doctor already has a visit in progress".into(),
            },
        }
    }
}

impl From<FileError> for ApiError {
    fn from(err: FileError) -> Self {
        match err {
            FileError::Database(e) => e.into(),
            FileError::Duplicate(matches) => ApiError::DuplicateFile(matches),
            FileError::NotFound(id) => ApiError::NotFound(format!("File {id} not found")),
            FileError::Io(e) => ApiError::Internal(e.to_string()),
            e @ (FileError::TooLarge { .. } | FileError::Empty | FileError::ReplaceMismatch) => {
                ApiError::Validation(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 8192).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn duplicate_id_number_maps_to_400_with_code() {
        let err: ApiError = DatabaseError::Duplicate {
            field: "idNumber".into(),
            value: "9001015009087".into(),
        }
        .into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "DUPLICATE_ID_NUMBER");
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn unauthorized_returns_401() {
        let response = ApiError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "AUTH_REQUIRED");
    }

    #[tokio::test]
    async fn internal_hides_detail_from_client() {
        let response = ApiError::Internal("connection pool exploded".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"]["message"], "An internal error occurred");
    }

    #[tokio::test]
    async fn invalid_transition_maps_to_400() {
        let err: ApiError = SchedulingError::Transition(
            crate::scheduling::TransitionError::AlreadyCheckedIn,
        )
        .into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "INVALID_TRANSITION");
    }

    #[tokio::test]
    async fn duplicate_file_carries_matches_in_details() {
        let record = crate::db::repository::file::sample_file(
            uuid::Uuid::new_v4(),
            uuid::Uuid::new_v4(),
            "referral.pdf",
            2048,
        );
        let response = ApiError::DuplicateFile(vec![record]).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "DUPLICATE_FILE");
        assert_eq!(json["error"]["details"]["duplicates"][0]["fileName"], "referral.pdf");
    }
}
