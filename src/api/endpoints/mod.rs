pub mod appointments;
pub mod auth;
pub mod files;
pub mod health;
pub mod onboarding;
pub mod patients;
pub mod staff;
