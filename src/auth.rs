//! Credential handling: Argon2 password hashing, HS256 access tokens,
//! and one-shot password-reset tokens.
//!
//! The reset token itself is random and only its SHA-256 digest is
//! stored, so a database leak does not expose usable tokens.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::enums::Role;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Token expired")]
    TokenExpired,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Password hashing failed: {0}")]
    Hashing(String),
}

// ─────────────────────────────────────────────────────────────────────
// Passwords
// ─────────────────────────────────────────────────────────────────────

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

// ─────────────────────────────────────────────────────────────────────
// Access tokens
// ─────────────────────────────────────────────────────────────────────

/// Bearer-token payload. `sub` is the staff id; `practice` scopes every
/// subsequent query to one tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub practice: Uuid,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

pub fn issue_token(
    secret: &str,
    staff_id: Uuid,
    practice_id: Uuid,
    role: Role,
    ttl_minutes: i64,
) -> Result<String, AuthError> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: staff_id,
        practice: practice_id,
        role,
        iat: now,
        exp: now + ttl_minutes * 60,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AuthError::Hashing(e.to_string()))
}

pub fn validate_token(secret: &str, token: &str) -> Result<Claims, AuthError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    })
}

// ─────────────────────────────────────────────────────────────────────
// Reset tokens
// ─────────────────────────────────────────────────────────────────────

/// A freshly issued reset token: the raw value goes into the email,
/// the digest into the database.
pub struct ResetToken {
    pub raw: String,
    pub digest: String,
}

pub fn issue_reset_token() -> ResetToken {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let raw = URL_SAFE_NO_PAD.encode(bytes);
    let digest = digest_reset_token(&raw);
    ResetToken { raw, digest }
}

pub fn digest_reset_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex_encode(&hasher.finalize())
}

/// Signature for a time-limited download URL. Covers the file id and
/// the expiry timestamp so neither can be swapped.
pub fn sign_download(secret: &str, file_id: &Uuid, expires: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(file_id.as_bytes());
    hasher.update(expires.to_be_bytes());
    hex_encode(&hasher.finalize())
}

pub fn verify_download(secret: &str, file_id: &Uuid, expires: i64, signature: &str) -> bool {
    if expires < Utc::now().timestamp() {
        return false;
    }
    // Constant-time comparison of the hex digests
    let expected = sign_download(secret, file_id, expires);
    if expected.len() != signature.len() {
        return false;
    }
    expected
        .bytes()
        .zip(signature.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
