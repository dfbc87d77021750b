//! Role/permission matrix.
//!
//! Every protected handler asks [`allows`] exactly one question; no
//! role string comparisons exist anywhere else in the crate.

use crate::models::enums::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Register and update patient records.
    ManagePatients,
    /// Read patient records and lists.
    ViewPatients,
    /// Hard-delete a patient record (administrative).
    DeletePatients,
    /// Create staff accounts and invitations.
    ManageStaff,
    /// List staff and doctors.
    ViewStaff,
    /// Create, check in, cancel, and queue appointments.
    ManageAppointments,
    /// View today's schedule and the live queue.
    ViewAppointments,
    /// Start, complete, and no-show visits.
    RunVisits,
    /// Upload files and resolve duplicates.
    UploadFiles,
    /// Read file lists, stats, and download links.
    ViewFiles,
    /// Report processing results for a file.
    ReportFileStatus,
}

pub fn allows(role: Role, permission: Permission) -> bool {
    use Permission::*;
    match role {
        Role::Admin => true,
        Role::Doctor => matches!(
            permission,
            ManagePatients
                | ViewPatients
                | ViewStaff
                | ViewAppointments
                | RunVisits
                | UploadFiles
                | ViewFiles
                | ReportFileStatus
        ),
        Role::Nurse => matches!(
            permission,
            ManagePatients
                | ViewPatients
                | ViewStaff
                | ManageAppointments
                | ViewAppointments
                | UploadFiles
                | ViewFiles
        ),
        Role::Receptionist => matches!(
            permission,
            ManagePatients
                | ViewPatients
                | ViewStaff
                | ManageAppointments
                | ViewAppointments
                | UploadFiles
                | ViewFiles
        ),
        Role::Patient => matches!(permission, ViewAppointments),
    }
}
