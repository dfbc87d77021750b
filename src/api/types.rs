//! Shared types for the HTTP API layer.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::config::Config;
use crate::db::open_database;
use crate::mailer::Mailer;
use crate::models::enums::Role;
use crate::permissions::{allows, Permission};

// ─────────────────────────────────────────────────────────────────────
// API context
// ─────────────────────────────────────────────────────────────────────

/// Shared context for all routes and middleware: configuration plus
/// the outbound-mail seam. Database connections are opened per call.
#[derive(Clone)]
pub struct ApiContext {
    pub config: Arc<Config>,
    pub mailer: Arc<dyn Mailer>,
}

impl ApiContext {
    pub fn new(config: Config, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            config: Arc::new(config),
            mailer,
        }
    }

    pub fn open_db(&self) -> Result<Connection, ApiError> {
        open_database(&self.config.db_path).map_err(|e| ApiError::Internal(e.to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────
// Auth context — injected by the auth middleware
// ─────────────────────────────────────────────────────────────────────

/// The authenticated caller, injected into request extensions after
/// token validation. Every tenant-scoped query uses `practice_id`.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub staff_id: Uuid,
    pub practice_id: Uuid,
    pub role: Role,
}

impl AuthContext {
    pub fn require(&self, permission: Permission) -> Result<(), ApiError> {
        if allows(self.role, permission) {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────
// Success envelope
// ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct Meta {
    pub total: usize,
}

fn envelope<T: Serialize>(status: StatusCode, data: T, meta: Option<Meta>) -> Response {
    let body = Envelope {
        success: true,
        data,
        meta,
        timestamp: Utc::now().to_rfc3339(),
    };
    (status, Json(body)).into_response()
}

/// `200 {success:true, data, timestamp}`
pub fn ok<T: Serialize>(data: T) -> Response {
    envelope(StatusCode::OK, data, None)
}

/// `200` with a `meta.total` count for list responses.
pub fn ok_with_total<T: Serialize>(data: T, total: usize) -> Response {
    envelope(StatusCode::OK, data, Some(Meta { total }))
}

/// `201` for creations.
pub fn created<T: Serialize>(data: T) -> Response {
    envelope(StatusCode::CREATED, data, None)
}
