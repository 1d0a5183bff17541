//! Role-based operation authorization.
//!
//! Every mutating or listing operation the service exposes is named by an
//! [`Operation`]. [`authorize`] maps (role, operation) to a decision before
//! any handler runs:
//! 1. Inactive account → DENY
//! 2. Operation open to every role → ALLOW
//! 3. Role holds the capability the operation needs → ALLOW
//! 4. Default → DENY
//!
//! Capabilities are pure functions of the role.

use serde::Serialize;

use crate::models::enums::Role;
use crate::models::Account;

// ═══════════════════════════════════════════════════════════
// Capabilities
// ═══════════════════════════════════════════════════════════

/// Assistants cannot delete patients.
pub fn can_delete_patient(role: Role) -> bool {
    matches!(role, Role::Admin | Role::Doctor)
}

/// Assistants cannot import or export.
pub fn can_import_export(role: Role) -> bool {
    matches!(role, Role::Admin | Role::Doctor)
}

pub fn can_create_assistant(role: Role) -> bool {
    matches!(role, Role::Admin | Role::Doctor)
}

pub fn can_manage_all_users(role: Role) -> bool {
    role == Role::Admin
}

/// Capability flags for a role, as reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub can_delete_patient: bool,
    pub can_import_export: bool,
    pub can_create_assistant: bool,
    pub can_manage_all_users: bool,
}

impl Capabilities {
    pub fn for_role(role: Role) -> Self {
        Self {
            can_delete_patient: can_delete_patient(role),
            can_import_export: can_import_export(role),
            can_create_assistant: can_create_assistant(role),
            can_manage_all_users: can_manage_all_users(role),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Operations
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ViewOwnAccount,
    ChangeOwnPassword,
    ListPatients,
    ViewPatient,
    CreatePatient,
    EditPatient,
    DeletePatient,
    RecordVisit,
    ViewVisit,
    AddDiagnosis,
    DeleteVisit,
    ImportPatients,
    ExportPatients,
    ManageAssistants,
    ManageUsers,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ViewOwnAccount => "view_own_account",
            Self::ChangeOwnPassword => "change_own_password",
            Self::ListPatients => "list_patients",
            Self::ViewPatient => "view_patient",
            Self::CreatePatient => "create_patient",
            Self::EditPatient => "edit_patient",
            Self::DeletePatient => "delete_patient",
            Self::RecordVisit => "record_visit",
            Self::ViewVisit => "view_visit",
            Self::AddDiagnosis => "add_diagnosis",
            Self::DeleteVisit => "delete_visit",
            Self::ImportPatients => "import_patients",
            Self::ExportPatients => "export_patients",
            Self::ManageAssistants => "manage_assistants",
            Self::ManageUsers => "manage_users",
        }
    }
}

/// Why access was granted (or denied): for the audit trail and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessReason {
    /// Operation available to every active account.
    OpenToAllRoles,
    /// Role carries the capability the operation requires.
    RoleCapability,
    /// Account is deactivated.
    InactiveAccount,
    /// No matching rule: access denied.
    Denied,
}

/// Result of an authorization check.
#[derive(Debug, Clone, Copy)]
pub struct AccessDecision {
    pub allowed: bool,
    pub reason: AccessReason,
}

impl AccessDecision {
    fn allow(reason: AccessReason) -> Self {
        Self {
            allowed: true,
            reason,
        }
    }

    fn deny(reason: AccessReason) -> Self {
        Self {
            allowed: false,
            reason,
        }
    }
}

/// Decide whether `role` may perform `operation`.
pub fn authorize(role: Role, operation: Operation) -> AccessDecision {
    use Operation::*;

    let permitted = match operation {
        ViewOwnAccount | ChangeOwnPassword | ListPatients | ViewPatient | CreatePatient
        | EditPatient | RecordVisit | ViewVisit | AddDiagnosis => {
            return AccessDecision::allow(AccessReason::OpenToAllRoles);
        }
        DeletePatient | DeleteVisit => can_delete_patient(role),
        ImportPatients | ExportPatients => can_import_export(role),
        ManageAssistants => can_create_assistant(role),
        ManageUsers => can_manage_all_users(role),
    };

    if permitted {
        AccessDecision::allow(AccessReason::RoleCapability)
    } else {
        AccessDecision::deny(AccessReason::Denied)
    }
}

/// Authorize a concrete account, denying deactivated accounts outright.
pub fn authorize_account(account: &Account, operation: Operation) -> AccessDecision {
    if !account.is_active {
        return AccessDecision::deny(AccessReason::InactiveAccount);
    }
    authorize(account.role, operation)
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
