//! Frontdesk — multi-tenant clinic management backend.
//!
//! One SQLite database serves every practice; every query is scoped by
//! practice id. The HTTP surface lives in [`api`], domain logic in
//! [`scheduling`] and [`files`], persistence in [`db`].

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod files;
pub mod mailer;
pub mod models;
pub mod outbox;
pub mod permissions;
pub mod scheduling;
