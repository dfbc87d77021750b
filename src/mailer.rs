//! Outbound email seam.
//!
//! Actual delivery is handled by an external collaborator; the server
//! only needs a place to hand messages to. The default implementation
//! writes them to the log, which is also what the tests observe.

use std::sync::Mutex;

use crate::models::Staff;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

pub trait Mailer: Send + Sync {
    fn send(&self, mail: OutgoingMail);
}

/// Tracing-backed mailer used in production builds until a real
/// transport is wired in.
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, mail: OutgoingMail) {
        tracing::info!(to = %mail.to, subject = %mail.subject, "Outgoing mail");
    }
}

/// Captures mail for assertions.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<OutgoingMail>>,
}

impl Mailer for RecordingMailer {
    fn send(&self, mail: OutgoingMail) {
        self.sent.lock().unwrap().push(mail);
    }
}

pub fn welcome_mail(staff: &Staff, practice_name: &str, temp_password: &str) -> OutgoingMail {
    OutgoingMail {
        to: staff.email.clone(),
        subject: format!("Your {practice_name} account"),
        body: format!(
            "Hello {},\n\nAn account was created for you at {practice_name}.\n\
             Staff code: {}\nTemporary password: {temp_password}\n\n\
             Please sign in and change your password.",
            staff.full_name(),
            staff.staff_code,
        ),
    }
}

pub fn reset_mail(staff: &Staff, reset_token: &str) -> OutgoingMail {
    OutgoingMail {
        to: staff.email.clone(),
        subject: "Password reset".into(),
        body: format!(
            "Hello {},\n\nUse this code to reset your password: {reset_token}\n\
             It expires shortly. If you did not request a reset, ignore this message.",
            staff.full_name(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::Role;
    use chrono::Utc;
    use uuid::Uuid;

    fn staff() -> Staff {
        Staff {
            id: Uuid::new_v4(),
            practice_id: Uuid::new_v4(),
            staff_code: "DR001".into(),
            first_name: "Thandi".into(),
            last_name: "Mokoena".into(),
            email: "thandi@example.test".into(),
            role: Role::Doctor,
            password_hash: String::new(),
            reset_token_hash: None,
            reset_token_expires: None,
            created_at: Utc::now().naive_utc(),
        }
    }

    #[test]
    fn welcome_mail_carries_credentials() {
        let mail = welcome_mail(&staff(), "Hillside Family Clinic", "tmp-pass-123");
        assert_eq!(mail.to, "thandi@example.test");
        assert!(mail.body.contains("DR001"));
        assert!(mail.body.contains("tmp-pass-123"));
    }

    #[test]
    fn recording_mailer_collects_sends() {
        let mailer = RecordingMailer::default();
        mailer.send(reset_mail(&staff(), "reset-token"));
        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].body.contains("reset-token"));
    }
}
