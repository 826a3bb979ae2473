//! Role permission table and the policy every mutation goes through

use std::fmt;
use thiserror::Error;

use crate::models::{CurrentUser, Role, Task};

/// Capabilities granted to a role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permissions {
    pub can_view_all_tasks: bool,
    pub can_create_task: bool,
    pub can_edit_task: bool,
    pub can_delete_task: bool,
    pub can_change_status: bool,
    pub can_assign_task: bool,
    pub can_change_color: bool,
    pub can_create_employee: bool,
    pub can_edit_employee: bool,
    pub can_delete_employee: bool,
    pub can_view_audit_log: bool,
    pub can_restore_from_audit_log: bool,
}

impl Permissions {
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Admin => Self {
                can_view_all_tasks: true,
                can_create_task: true,
                can_edit_task: true,
                can_delete_task: true,
                can_change_status: true,
                can_assign_task: true,
                can_change_color: true,
                can_create_employee: true,
                can_edit_employee: true,
                can_delete_employee: true,
                can_view_audit_log: true,
                can_restore_from_audit_log: true,
            },
            Role::Manager => Self {
                can_view_all_tasks: true,
                can_create_task: true,
                can_edit_task: true,
                can_delete_task: false,
                can_change_status: true,
                can_assign_task: true,
                can_change_color: true,
                can_create_employee: true,
                can_edit_employee: true,
                can_delete_employee: false,
                can_view_audit_log: true,
                can_restore_from_audit_log: false,
            },
            Role::Employee => Self {
                can_view_all_tasks: false,
                can_create_task: false,
                can_edit_task: false,
                can_delete_task: false,
                can_change_status: true,
                can_assign_task: false,
                can_change_color: true,
                can_create_employee: false,
                can_edit_employee: false,
                can_delete_employee: false,
                can_view_audit_log: false,
                can_restore_from_audit_log: false,
            },
        }
    }

    /// Whether `user_id` may see `task` on the board
    pub fn can_view_task(&self, task: &Task, user_id: &str) -> bool {
        self.can_view_all_tasks || task.is_assigned_to(user_id)
    }

    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::ViewTask => true,
            Action::CreateTask => self.can_create_task,
            Action::EditTask => self.can_edit_task,
            Action::DeleteTask => self.can_delete_task,
            Action::ChangeStatus => self.can_change_status,
            Action::AssignTask => self.can_assign_task,
            Action::ChangeColor => self.can_change_color,
            Action::CreateEmployee => self.can_create_employee,
            Action::EditEmployee => self.can_edit_employee,
            Action::DeleteEmployee => self.can_delete_employee,
            Action::ViewAuditLog => self.can_view_audit_log,
            Action::RestoreFromAuditLog => self.can_restore_from_audit_log,
        }
    }
}

/// Permission table for a raw stored role value; unknown roles get the employee table
pub fn get_role_permissions(role: &str) -> Permissions {
    Permissions::for_role(Role::parse_lenient(role))
}

/// Something a user may attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    ViewTask,
    CreateTask,
    EditTask,
    DeleteTask,
    ChangeStatus,
    AssignTask,
    ChangeColor,
    CreateEmployee,
    EditEmployee,
    DeleteEmployee,
    ViewAuditLog,
    RestoreFromAuditLog,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Action::ViewTask => "view this task",
            Action::CreateTask => "create tasks",
            Action::EditTask => "edit tasks",
            Action::DeleteTask => "delete tasks",
            Action::ChangeStatus => "change task status",
            Action::AssignTask => "assign tasks",
            Action::ChangeColor => "change task colors",
            Action::CreateEmployee => "create employees",
            Action::EditEmployee => "edit employees",
            Action::DeleteEmployee => "delete employees",
            Action::ViewAuditLog => "view the audit log",
            Action::RestoreFromAuditLog => "restore changes from the audit log",
        };
        f.write_str(text)
    }
}

/// Why the policy refused an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeniedReason {
    #[error("You don't have permission to {0}")]
    MissingCapability(Action),
    #[error("You can only modify tasks assigned to you")]
    NotAssignee,
}

/// What an action is performed on
#[derive(Debug, Clone, Copy)]
pub enum Subject<'a> {
    None,
    Task(&'a Task),
}

/// Single decision path for every gated action
#[derive(Debug, Clone, Copy)]
pub struct Policy {
    permissions: Permissions,
}

impl Policy {
    pub fn for_role(role: Role) -> Self {
        Self {
            permissions: Permissions::for_role(role),
        }
    }

    pub fn with_permissions(permissions: Permissions) -> Self {
        Self { permissions }
    }

    pub fn permissions(&self) -> &Permissions {
        &self.permissions
    }

    /// Capability first, then row-level ownership for task subjects.
    pub fn can(
        &self,
        action: Action,
        subject: Subject<'_>,
        actor: &CurrentUser,
    ) -> Result<(), DeniedReason> {
        if !self.permissions.allows(action) {
            return Err(DeniedReason::MissingCapability(action));
        }

        if let Subject::Task(task) = subject
            && !self.permissions.can_view_task(task, &actor.id)
        {
            return Err(DeniedReason::NotAssignee);
        }

        Ok(())
    }
}
