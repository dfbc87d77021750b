use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tenant. Every other entity belongs to exactly one practice and
/// is never visible across practice boundaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Practice {
    pub id: Uuid,
    pub name: String,
    /// Human-enterable code staff use to join this practice.
    pub join_code: String,
    pub created_at: NaiveDateTime,
}

use super::enums::Role;

/// Single-use, role-carrying invitation code issued by an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    pub code: String,
    pub practice_id: Uuid,
    pub role: Role,
    pub created_by: Option<Uuid>,
    pub expires_at: NaiveDateTime,
    pub used_at: Option<NaiveDateTime>,
}

impl Invitation {
    pub fn is_usable(&self, now: NaiveDateTime) -> bool {
        self.used_at.is_none() && now <= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn invitation(expires_in: Duration, used: bool) -> Invitation {
        let now = Utc::now().naive_utc();
        Invitation {
            code: "ABC123".into(),
            practice_id: Uuid::new_v4(),
            role: Role::Nurse,
            created_by: None,
            expires_at: now + expires_in,
            used_at: used.then_some(now),
        }
    }

    #[test]
    fn fresh_invitation_is_usable() {
        let inv = invitation(Duration::hours(1), false);
        assert!(inv.is_usable(Utc::now().naive_utc()));
    }

    #[test]
    fn expired_invitation_is_not_usable() {
        let inv = invitation(Duration::hours(-1), false);
        assert!(!inv.is_usable(Utc::now().naive_utc()));
    }

    #[test]
    fn used_invitation_is_not_usable() {
        let inv = invitation(Duration::hours(1), true);
        assert!(!inv.is_usable(Utc::now().naive_utc()));
    }
}
