use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Role;

/// A staff member (or patient login) within one practice.
///
/// `staff_code` and `email` are natural keys, unique per practice.
/// The password hash and reset-token fields never leave the server;
/// API responses use [`StaffView`].
#[derive(Debug, Clone)]
pub struct Staff {
    pub id: Uuid,
    pub practice_id: Uuid,
    pub staff_code: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
    pub password_hash: String,
    /// SHA-256 of the outstanding reset token, if any. Cleared after
    /// use or replaced on new issuance.
    pub reset_token_hash: Option<String>,
    pub reset_token_expires: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl Staff {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn view(&self) -> StaffView {
        StaffView {
            id: self.id,
            staff_code: self.staff_code.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            role: self.role,
            created_at: self.created_at,
        }
    }
}

/// Credential-free projection of a staff member, safe to serialize.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffView {
    pub id: Uuid,
    pub staff_code: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
    pub created_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn view_excludes_credentials() {
        let staff = Staff {
            id: Uuid::new_v4(),
            practice_id: Uuid::new_v4(),
            staff_code: "DR001".into(),
            first_name: "Thandi".into(),
            last_name: "Mokoena".into(),
            email: "thandi@example.test".into(),
            role: Role::Doctor,
            password_hash: "$argon2id$...".into(),
            reset_token_hash: None,
            reset_token_expires: None,
            created_at: Utc::now().naive_utc(),
        };

        let json = serde_json::to_value(staff.view()).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("resetTokenHash").is_none());
        assert_eq!(json["staffCode"], "DR001");
    }

    #[test]
    fn full_name_joins_parts() {
        let staff = Staff {
            id: Uuid::new_v4(),
            practice_id: Uuid::new_v4(),
            staff_code: "RC001".into(),
            first_name: "Sipho".into(),
            last_name: "Dlamini".into(),
            email: "sipho@example.test".into(),
            role: Role::Receptionist,
            password_hash: String::new(),
            reset_token_hash: None,
            reset_token_expires: None,
            created_at: Utc::now().naive_utc(),
        };
        assert_eq!(staff.full_name(), "Sipho Dlamini");
    }
}
