//! Board context: session, caches, audit log and the gated mutation handlers
//!
//! Every handler follows the same path: policy check, form validation,
//! backend call, cache update, local mirror, audit entry. A refused or
//! invalid request never reaches the backend.
//!
//! Concurrent mutations of the same record are not serialized; whichever
//! response arrives last is what the cache keeps.

use anyhow::Context;
use std::sync::Arc;
use thiserror::Error;

use crate::audit::{self, AuditLog};
use crate::drag::{DragOutcome, DragSession};
use crate::filter::{self, TaskFilter};
use crate::gateway::{GatewayError, TaskBackend};
use crate::migrate::{self, StoredTask};
use crate::models::{
    ActionType, CurrentUser, Employee, EmployeeDraft, EntityType, NewAuditEntry, Role, Task,
    TaskDraft, TaskStatus, Theme, ValidationError,
};
use crate::permissions::{Action, DeniedReason, Permissions, Policy, Subject};
use crate::retry::{self, RetryPolicy};
use crate::storage::{LocalStore, Session, TASKS_KEY};

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("{0}")]
    Denied(#[from] DeniedReason),
    #[error("{0}")]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },
    #[error("Not signed in")]
    NotSignedIn,
    #[error("Audit entry '{0}' is not a restorable status change")]
    NotRestorable(String),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub type BoardResult<T> = Result<T, BoardError>;

pub struct Board<B> {
    backend: B,
    store: Arc<LocalStore>,
    session: Session,
    audit: AuditLog,
    tasks: Vec<Task>,
    employees: Vec<Employee>,
    retry: RetryPolicy,
}

impl<B: TaskBackend> Board<B> {
    /// Load the session, audit log and last task mirror from the local store
    pub fn open(
        backend: B,
        store: Arc<LocalStore>,
        max_audit_entries: usize,
        retry: RetryPolicy,
    ) -> Self {
        let session = Session::load(&store);
        let audit = AuditLog::load(store.clone(), max_audit_entries);
        let stored = store
            .get_json::<Vec<StoredTask>>(TASKS_KEY)
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Ignoring stored task mirror");
                None
            })
            .unwrap_or_default();
        let tasks = migrate::migrate_all(stored);

        Self {
            backend,
            store,
            session,
            audit,
            tasks,
            employees: Vec::new(),
            retry,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn employees(&self) -> &[Employee] {
        &self.employees
    }

    pub fn permissions(&self) -> Permissions {
        Permissions::for_role(self.session.role)
    }

    fn policy(&self) -> Policy {
        Policy::for_role(self.session.role)
    }

    /// Reload employees and tasks from the backend
    pub async fn refresh(&mut self) -> BoardResult<()> {
        let backend = &self.backend;
        let employees =
            retry::with_retry(&self.retry, "list_employees", || backend.list_employees()).await?;
        let tasks = retry::with_retry(&self.retry, "list_tasks", || backend.list_tasks()).await?;

        tracing::info!(
            employees = employees.len(),
            tasks = tasks.len(),
            "Board refreshed"
        );
        self.employees = employees;
        self.tasks = tasks;
        self.mirror_tasks();
        Ok(())
    }

    /// Tasks the signed-in user may see that match `filter`
    pub fn visible_tasks(&self, filter: &TaskFilter) -> Vec<Task> {
        let Some(actor) = self.session.actor() else {
            return Vec::new();
        };
        let visible: Vec<Task> = filter::visible_tasks(&self.tasks, &self.permissions(), &actor.id)
            .into_iter()
            .cloned()
            .collect();
        filter::filter_tasks(&visible, filter, &self.employees)
    }

    // Session

    pub fn login(&mut self, employee_id: &str) -> BoardResult<CurrentUser> {
        let employee = self
            .employees
            .iter()
            .find(|e| e.id == employee_id)
            .ok_or_else(|| not_found("employee", employee_id))?;
        let user = CurrentUser::from(employee);
        self.session.login(&self.store, user.clone())?;
        Ok(user)
    }

    pub fn logout(&mut self) -> BoardResult<()> {
        self.session.logout(&self.store)?;
        Ok(())
    }

    /// Act under a different role (demo role switcher)
    pub fn switch_role(&mut self, role: Role) -> BoardResult<()> {
        let actor = self.session.actor().ok_or(BoardError::NotSignedIn)?;
        if actor.role == role {
            return Ok(());
        }
        self.session.set_role(&self.store, role)?;
        self.record(
            &actor,
            ActionType::RoleChanged,
            EntityType::System,
            &actor.id,
            &actor.name,
            format!("Role switched from {} to {}", actor.role, role),
            Some(actor.role.to_string()),
            Some(role.to_string()),
        );
        Ok(())
    }

    pub fn set_theme(&mut self, theme: Theme) -> BoardResult<()> {
        self.session.set_theme(&self.store, theme)?;
        Ok(())
    }

    // Audit log

    pub fn audit_log(&self) -> BoardResult<&AuditLog> {
        self.authorize(Action::ViewAuditLog, None)?;
        Ok(&self.audit)
    }

    pub fn import_audit_log(&mut self, json: &str) -> BoardResult<usize> {
        self.authorize(Action::RestoreFromAuditLog, None)?;
        Ok(self.audit.import_logs(json)?)
    }

    pub fn clear_audit_log(&mut self) -> BoardResult<()> {
        self.authorize(Action::RestoreFromAuditLog, None)?;
        self.audit.clear_logs();
        Ok(())
    }

    /// Put a task back into the status it had before a recorded status change.
    ///
    /// The task is looked up in the board cache, the same data the board
    /// displays, not in the local mirror.
    pub async fn restore_status_change(&mut self, entry_id: &str) -> BoardResult<Task> {
        let actor = self.authorize(Action::RestoreFromAuditLog, None)?;
        let entry = self
            .audit
            .get_log(entry_id)
            .cloned()
            .ok_or_else(|| not_found("audit entry", entry_id))?;
        let (previous, recorded) = audit::status_change_of(&entry)
            .ok_or_else(|| BoardError::NotRestorable(entry_id.to_string()))?;

        let task = self.cached_task(&entry.entity_id)?;
        if task.status != recorded {
            tracing::warn!(
                task_id = %task.id,
                current = %task.status,
                recorded = %recorded,
                "Task moved since the audited change; restoring anyway"
            );
        }

        let mut updated = task.clone();
        updated.status = previous;
        let saved = self.backend.update_task(&updated).await?;
        self.store_task(saved.clone());

        self.record(
            &actor,
            ActionType::StatusRestored,
            EntityType::Task,
            &saved.id,
            &saved.title,
            format!(
                "Restored status from {} to {} (audit entry {})",
                task.status.title(),
                previous.title(),
                entry.id
            ),
            Some(task.status.to_string()),
            Some(previous.to_string()),
        );
        Ok(saved)
    }

    // Task handlers

    pub async fn handle_create_task(&mut self, draft: TaskDraft) -> BoardResult<Task> {
        let actor = self.authorize(Action::CreateTask, None)?;
        draft.validate()?;

        let task = self.backend.create_task(&draft).await?;
        self.store_task(task.clone());
        self.record(
            &actor,
            ActionType::TaskCreated,
            EntityType::Task,
            &task.id,
            &task.title,
            format!("Created task in {}", task.status.title()),
            None,
            Some(task.status.to_string()),
        );
        Ok(task)
    }

    pub async fn handle_task_status_change(
        &mut self,
        task_id: &str,
        status: TaskStatus,
    ) -> BoardResult<Task> {
        let task = self.cached_task(task_id)?;
        let actor = self.authorize(Action::ChangeStatus, Some(&task))?;
        if task.status == status {
            return Ok(task);
        }

        let mut updated = task.clone();
        updated.status = status;
        let saved = self.backend.update_task(&updated).await?;
        self.store_task(saved.clone());

        self.record(
            &actor,
            ActionType::TaskStatusChanged,
            EntityType::Task,
            &saved.id,
            &saved.title,
            format!(
                "Status changed from {} to {}",
                task.status.title(),
                status.title()
            ),
            Some(task.status.to_string()),
            Some(status.to_string()),
        );
        Ok(saved)
    }

    pub async fn handle_edit_task(&mut self, task_id: &str, draft: TaskDraft) -> BoardResult<Task> {
        let task = self.cached_task(task_id)?;
        let actor = self.authorize(Action::EditTask, Some(&task))?;
        draft.validate()?;

        let mut updated = task.clone();
        draft.apply_to(&mut updated);
        let saved = self.backend.update_task(&updated).await?;
        self.store_task(saved.clone());

        self.record(
            &actor,
            ActionType::TaskUpdated,
            EntityType::Task,
            &saved.id,
            &saved.title,
            "Task details updated".to_string(),
            Some(task.title.clone()),
            Some(saved.title.clone()),
        );
        Ok(saved)
    }

    pub async fn handle_assign_task(
        &mut self,
        task_id: &str,
        assignee_ids: Vec<String>,
    ) -> BoardResult<Task> {
        let task = self.cached_task(task_id)?;
        let actor = self.authorize(Action::AssignTask, Some(&task))?;
        if let Some(unknown) = assignee_ids
            .iter()
            .find(|id| !self.employees.iter().any(|e| &e.id == *id))
        {
            return Err(not_found("employee", unknown));
        }

        let mut updated = task.clone();
        updated.assignee_ids = assignee_ids;
        let saved = self.backend.update_task(&updated).await?;
        self.store_task(saved.clone());

        let names = |ids: &[String]| -> String {
            ids.iter()
                .map(|id| {
                    self.employees
                        .iter()
                        .find(|e| &e.id == id)
                        .map_or(id.as_str(), |e| e.name.as_str())
                })
                .collect::<Vec<_>>()
                .join(", ")
        };
        let details = format!("Assignees set to [{}]", names(&saved.assignee_ids));
        self.record(
            &actor,
            ActionType::TaskAssigned,
            EntityType::Task,
            &saved.id,
            &saved.title,
            details,
            Some(task.assignee_ids.join(",")),
            Some(saved.assignee_ids.join(",")),
        );
        Ok(saved)
    }

    /// `None` clears the custom color
    pub async fn handle_color_change(
        &mut self,
        task_id: &str,
        color: Option<String>,
    ) -> BoardResult<Task> {
        let task = self.cached_task(task_id)?;
        let actor = self.authorize(Action::ChangeColor, Some(&task))?;

        let mut updated = task.clone();
        updated.custom_color = color;
        let saved = self.backend.update_task(&updated).await?;
        self.store_task(saved.clone());

        self.record(
            &actor,
            ActionType::TaskColorChanged,
            EntityType::Task,
            &saved.id,
            &saved.title,
            "Card color changed".to_string(),
            task.custom_color.clone(),
            saved.custom_color.clone(),
        );
        Ok(saved)
    }

    pub async fn handle_delete_task(&mut self, task_id: &str) -> BoardResult<()> {
        let task = self.cached_task(task_id)?;
        let actor = self.authorize(Action::DeleteTask, Some(&task))?;

        self.backend.delete_task(&task.id).await?;
        self.tasks.retain(|t| t.id != task.id);
        self.mirror_tasks();

        self.record(
            &actor,
            ActionType::TaskDeleted,
            EntityType::Task,
            &task.id,
            &task.title,
            "Task deleted".to_string(),
            Some(task.status.to_string()),
            None,
        );
        Ok(())
    }

    // Drag and drop

    /// Start dragging a card; refused up front if the status may not change
    pub fn begin_drag(&self, task_id: &str) -> BoardResult<DragSession> {
        let task = self.cached_task(task_id)?;
        self.authorize(Action::ChangeStatus, Some(&task))?;
        Ok(DragSession::begin(task.id, task.status))
    }

    /// Persist a committed drop; rollbacks never touch the backend
    pub async fn handle_drag_end(
        &mut self,
        session: DragSession,
        drop_target: Option<TaskStatus>,
    ) -> BoardResult<DragOutcome> {
        let outcome = session.finish(drop_target);
        match &outcome {
            DragOutcome::Commit { task_id, to, .. } => {
                self.handle_task_status_change(task_id, *to).await?;
            }
            DragOutcome::Rollback { task_id, status } => {
                tracing::debug!(task_id = %task_id, status = %status, "Drag cancelled");
            }
            DragOutcome::Unchanged { task_id } => {
                tracing::debug!(task_id = %task_id, "Dropped on original column");
            }
        }
        Ok(outcome)
    }

    // Employee handlers

    pub async fn handle_create_employee(&mut self, draft: EmployeeDraft) -> BoardResult<Employee> {
        let actor = self.authorize(Action::CreateEmployee, None)?;
        draft.validate()?;

        let employee = self.backend.create_employee(&draft).await?;
        self.employees.push(employee.clone());
        self.record(
            &actor,
            ActionType::EmployeeCreated,
            EntityType::Employee,
            &employee.id,
            &employee.name,
            format!("Added {} as {}", employee.email, employee.role),
            None,
            Some(employee.role.to_string()),
        );
        Ok(employee)
    }

    pub async fn handle_update_employee(
        &mut self,
        employee_id: &str,
        draft: EmployeeDraft,
    ) -> BoardResult<Employee> {
        let actor = self.authorize(Action::EditEmployee, None)?;
        let existing = self
            .employees
            .iter()
            .find(|e| e.id == employee_id)
            .cloned()
            .ok_or_else(|| not_found("employee", employee_id))?;
        draft.validate()?;

        let employee = draft.into_employee(employee_id.to_string());
        let saved = self.backend.update_employee(&employee).await?;
        if let Some(slot) = self.employees.iter_mut().find(|e| e.id == saved.id) {
            *slot = saved.clone();
        }
        if saved.id == actor.id {
            self.session.refresh_user(&self.store, CurrentUser::from(&saved))?;
        }

        self.record(
            &actor,
            ActionType::EmployeeUpdated,
            EntityType::Employee,
            &saved.id,
            &saved.name,
            "Employee details updated".to_string(),
            Some(existing.role.to_string()),
            Some(saved.role.to_string()),
        );
        Ok(saved)
    }

    pub async fn handle_delete_employee(&mut self, employee_id: &str) -> BoardResult<()> {
        let actor = self.authorize(Action::DeleteEmployee, None)?;
        let existing = self
            .employees
            .iter()
            .find(|e| e.id == employee_id)
            .cloned()
            .ok_or_else(|| not_found("employee", employee_id))?;

        self.backend.delete_employee(&existing.id).await?;
        self.employees.retain(|e| e.id != existing.id);

        self.record(
            &actor,
            ActionType::EmployeeDeleted,
            EntityType::Employee,
            &existing.id,
            &existing.name,
            format!("Removed {}", existing.email),
            Some(existing.role.to_string()),
            None,
        );
        Ok(())
    }

    // Internals

    fn authorize(&self, action: Action, task: Option<&Task>) -> BoardResult<CurrentUser> {
        let actor = self.session.actor().ok_or(BoardError::NotSignedIn)?;
        let subject = task.map_or(Subject::None, Subject::Task);
        if let Err(reason) = self.policy().can(action, subject, &actor) {
            tracing::warn!(
                user_id = %actor.id,
                role = %actor.role,
                action = ?action,
                reason = %reason,
                "Permission denied"
            );
            return Err(reason.into());
        }
        Ok(actor)
    }

    fn cached_task(&self, task_id: &str) -> BoardResult<Task> {
        self.tasks
            .iter()
            .find(|t| t.id == task_id)
            .cloned()
            .ok_or_else(|| not_found("task", task_id))
    }

    fn store_task(&mut self, task: Task) {
        match self.tasks.iter_mut().find(|t| t.id == task.id) {
            Some(slot) => *slot = task,
            None => self.tasks.push(task),
        }
        self.mirror_tasks();
    }

    fn mirror_tasks(&self) {
        if let Err(e) = self
            .store
            .set_json(TASKS_KEY, &self.tasks)
            .context("Failed to mirror tasks")
        {
            tracing::warn!(error = %e, "Local task mirror is stale");
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn record(
        &mut self,
        actor: &CurrentUser,
        action_type: ActionType,
        entity_type: EntityType,
        entity_id: &str,
        entity_name: &str,
        details: String,
        previous_value: Option<String>,
        new_value: Option<String>,
    ) {
        self.audit.add_log(NewAuditEntry {
            action_type,
            entity_type,
            entity_id: entity_id.to_string(),
            entity_name: entity_name.to_string(),
            user_role: actor.role,
            details,
            previous_value,
            new_value,
        });
    }
}

fn not_found(kind: &'static str, id: &str) -> BoardError {
    BoardError::NotFound {
        kind,
        id: id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    /// In-memory backend that records every call
    #[derive(Default)]
    struct FakeBackend {
        calls: Mutex<Vec<String>>,
        tasks: Mutex<Vec<Task>>,
        employees: Mutex<Vec<Employee>>,
    }

    impl FakeBackend {
        fn with(employees: Vec<Employee>, tasks: Vec<Task>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                tasks: Mutex::new(tasks),
                employees: Mutex::new(employees),
            }
        }

        fn log(&self, call: &str) {
            self.calls.lock().unwrap().push(call.to_string());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn mutations(&self) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter(|c| !c.starts_with("list_"))
                .collect()
        }
    }

    #[async_trait]
    impl TaskBackend for FakeBackend {
        async fn list_employees(&self) -> Result<Vec<Employee>, GatewayError> {
            self.log("list_employees");
            Ok(self.employees.lock().unwrap().clone())
        }

        async fn create_employee(&self, draft: &EmployeeDraft) -> Result<Employee, GatewayError> {
            self.log("create_employee");
            let mut employees = self.employees.lock().unwrap();
            let employee = draft.clone().into_employee(format!("e{}", employees.len() + 1));
            employees.push(employee.clone());
            Ok(employee)
        }

        async fn update_employee(&self, employee: &Employee) -> Result<Employee, GatewayError> {
            self.log(&format!("update_employee {}", employee.id));
            Ok(employee.clone())
        }

        async fn delete_employee(&self, id: &str) -> Result<(), GatewayError> {
            self.log(&format!("delete_employee {}", id));
            self.employees.lock().unwrap().retain(|e| e.id != id);
            Ok(())
        }

        async fn list_tasks(&self) -> Result<Vec<Task>, GatewayError> {
            self.log("list_tasks");
            Ok(self.tasks.lock().unwrap().clone())
        }

        async fn create_task(&self, draft: &TaskDraft) -> Result<Task, GatewayError> {
            self.log("create_task");
            let mut tasks = self.tasks.lock().unwrap();
            let task = Task {
                id: format!("t{}", tasks.len() + 100),
                title: draft.title.clone(),
                description: draft.description.clone(),
                status: draft.status,
                assignee_ids: draft.assignee_ids.clone(),
                priority: draft.priority,
                due_date: draft.due_date.clone(),
                labels: draft.labels.clone(),
                custom_color: draft.custom_color.clone(),
                created_at: None,
                updated_at: None,
            };
            tasks.push(task.clone());
            Ok(task)
        }

        async fn update_task(&self, task: &Task) -> Result<Task, GatewayError> {
            self.log(&format!("update_task {} {}", task.id, task.status));
            let mut tasks = self.tasks.lock().unwrap();
            if let Some(slot) = tasks.iter_mut().find(|t| t.id == task.id) {
                *slot = task.clone();
            }
            Ok(task.clone())
        }

        async fn delete_task(&self, id: &str) -> Result<(), GatewayError> {
            self.log(&format!("delete_task {}", id));
            self.tasks.lock().unwrap().retain(|t| t.id != id);
            Ok(())
        }
    }

    fn employee(id: &str, role: Role) -> Employee {
        Employee {
            id: id.into(),
            name: format!("Person {}", id),
            email: format!("{}@example.com", id),
            role,
        }
    }

    fn task(id: &str, status: TaskStatus, assignees: &[&str]) -> Task {
        Task {
            id: id.into(),
            title: format!("Task {}", id),
            description: String::new(),
            status,
            assignee_ids: assignees.iter().map(|s| s.to_string()).collect(),
            priority: None,
            due_date: None,
            labels: vec![],
            custom_color: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    async fn board_as(user_id: &str) -> (Board<FakeBackend>, Arc<LocalStore>) {
        let employees = vec![
            employee("admin", Role::Admin),
            employee("boss", Role::Manager),
            employee("u1", Role::Employee),
            employee("u2", Role::Employee),
        ];
        let tasks = vec![
            task("t1", TaskStatus::Pending, &["u1"]),
            task("t2", TaskStatus::Pending, &["u2"]),
            task("t3", TaskStatus::InProgress, &["boss", "u1"]),
        ];
        let store = Arc::new(LocalStore::open_in_memory().unwrap());
        let mut board = Board::open(
            FakeBackend::with(employees, tasks),
            store.clone(),
            audit::DEFAULT_MAX_ENTRIES,
            fast_retry(),
        );
        board.refresh().await.unwrap();
        board.login(user_id).unwrap();
        (board, store)
    }

    #[tokio::test]
    async fn employee_cannot_move_someone_elses_task() {
        let (mut board, _) = board_as("u1").await;

        let err = board
            .handle_task_status_change("t2", TaskStatus::Done)
            .await
            .unwrap_err();
        assert!(matches!(err, BoardError::Denied(DeniedReason::NotAssignee)));
        assert!(board.backend().mutations().is_empty());
        assert!(board.audit.get_logs().is_empty());
        assert_eq!(board.tasks()[1].status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn capability_denial_precedes_ownership() {
        let (mut board, _) = board_as("boss").await;

        let err = board.handle_delete_task("t3").await.unwrap_err();
        assert!(matches!(
            err,
            BoardError::Denied(DeniedReason::MissingCapability(Action::DeleteTask))
        ));
        assert!(board.backend().mutations().is_empty());
        assert_eq!(board.tasks().len(), 3);
    }

    #[tokio::test]
    async fn status_change_persists_mirrors_and_audits() {
        let (mut board, store) = board_as("u1").await;

        let saved = board
            .handle_task_status_change("t1", TaskStatus::Done)
            .await
            .unwrap();
        assert_eq!(saved.status, TaskStatus::Done);
        assert_eq!(board.backend().mutations(), vec!["update_task t1 done"]);

        let mirror: Vec<Task> = store.get_json(TASKS_KEY).unwrap().unwrap();
        assert_eq!(mirror[0].status, TaskStatus::Done);

        let entry = &board.audit.get_logs()[0];
        assert_eq!(entry.action_type, ActionType::TaskStatusChanged);
        assert_eq!(entry.previous_value.as_deref(), Some("pending"));
        assert_eq!(entry.new_value.as_deref(), Some("done"));
        assert_eq!(entry.user_role, Role::Employee);
    }

    #[tokio::test]
    async fn same_status_is_a_no_op() {
        let (mut board, _) = board_as("admin").await;
        board
            .handle_task_status_change("t1", TaskStatus::Pending)
            .await
            .unwrap();
        assert!(board.backend().mutations().is_empty());
    }

    #[tokio::test]
    async fn restore_reverts_a_status_change() {
        let (mut board, _) = board_as("admin").await;
        board
            .handle_task_status_change("t1", TaskStatus::Done)
            .await
            .unwrap();
        let change = board.audit.get_logs()[0].clone();
        assert!(audit::can_restore_status_change(&change));

        let restored = board.restore_status_change(&change.id).await.unwrap();
        assert_eq!(restored.status, TaskStatus::Pending);
        assert_eq!(board.tasks()[0].status, TaskStatus::Pending);

        let entry = &board.audit.get_logs()[0];
        assert_eq!(entry.action_type, ActionType::StatusRestored);
        assert_eq!(entry.previous_value.as_deref(), Some("done"));
        assert_eq!(entry.new_value.as_deref(), Some("pending"));
        assert_eq!(board.audit.get_logs().len(), 2);
    }

    #[tokio::test]
    async fn restore_requires_permission_and_restorable_entry() {
        let (mut board, _) = board_as("admin").await;
        board
            .handle_color_change("t1", Some("#ff0000".into()))
            .await
            .unwrap();
        let color_entry = board.audit.get_logs()[0].id.clone();
        assert!(matches!(
            board.restore_status_change(&color_entry).await,
            Err(BoardError::NotRestorable(_))
        ));

        board.switch_role(Role::Manager).unwrap();
        assert!(matches!(
            board.restore_status_change(&color_entry).await,
            Err(BoardError::Denied(_))
        ));
        assert!(matches!(
            board.audit_log().unwrap().get_logs()[0].action_type,
            ActionType::RoleChanged
        ));
    }

    #[tokio::test]
    async fn drag_commits_once_and_rollback_is_silent() {
        let (mut board, _) = board_as("u1").await;

        let mut drag = board.begin_drag("t1").unwrap();
        drag.drag_over(TaskStatus::InProgress);
        drag.drag_over(TaskStatus::InReview);
        drag.drag_over(TaskStatus::Done);
        let outcome = board
            .handle_drag_end(drag, Some(TaskStatus::Done))
            .await
            .unwrap();
        assert!(matches!(outcome, DragOutcome::Commit { .. }));
        assert_eq!(board.backend().mutations().len(), 1);
        assert_eq!(board.audit.get_logs().len(), 1);

        let mut drag = board.begin_drag("t3").unwrap();
        drag.drag_over(TaskStatus::Failed);
        let outcome = board.handle_drag_end(drag, None).await.unwrap();
        assert!(matches!(outcome, DragOutcome::Rollback { .. }));
        assert_eq!(board.backend().mutations().len(), 1);
        assert_eq!(board.audit.get_logs().len(), 1);
        assert_eq!(board.tasks()[2].status, TaskStatus::InProgress);

        assert!(matches!(
            board.begin_drag("t2"),
            Err(BoardError::Denied(DeniedReason::NotAssignee))
        ));
    }

    #[tokio::test]
    async fn invalid_form_never_reaches_backend() {
        let (mut board, _) = board_as("boss").await;
        let err = board
            .handle_create_task(TaskDraft {
                title: "  ".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BoardError::Invalid(ValidationError::Required("title"))));
        assert!(board.backend().mutations().is_empty());

        let created = board
            .handle_create_task(TaskDraft {
                title: "Quarterly review".into(),
                assignee_ids: vec!["u2".into()],
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(board.tasks().last().unwrap().id, created.id);
        assert_eq!(board.audit.get_logs()[0].action_type, ActionType::TaskCreated);
    }

    #[tokio::test]
    async fn employee_sees_only_own_tasks() {
        let (board, _) = board_as("u1").await;
        let ids: Vec<_> = board
            .visible_tasks(&TaskFilter::default())
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec!["t1", "t3"]);

        let filter = TaskFilter {
            status: Some(TaskStatus::InProgress),
            ..Default::default()
        };
        assert_eq!(board.visible_tasks(&filter).len(), 1);
    }

    #[tokio::test]
    async fn assignment_checks_known_employees() {
        let (mut board, _) = board_as("boss").await;
        let err = board
            .handle_assign_task("t1", vec!["ghost".into()])
            .await
            .unwrap_err();
        assert!(matches!(err, BoardError::NotFound { kind: "employee", .. }));

        let saved = board
            .handle_assign_task("t1", vec!["u1".into(), "u2".into()])
            .await
            .unwrap();
        assert_eq!(saved.assignee_ids, vec!["u1", "u2"]);
        let entry = &board.audit.get_logs()[0];
        assert_eq!(entry.new_value.as_deref(), Some("u1,u2"));
        assert!(entry.details.contains("Person u2"));
    }

    #[tokio::test]
    async fn employee_management_is_gated() {
        let (mut board, _) = board_as("boss").await;
        let created = board
            .handle_create_employee(EmployeeDraft {
                name: "New Hire".into(),
                email: "new@example.com".into(),
                role: Role::Employee,
            })
            .await
            .unwrap();
        assert!(board.employees().iter().any(|e| e.id == created.id));

        assert!(matches!(
            board.handle_delete_employee(&created.id).await,
            Err(BoardError::Denied(_))
        ));

        board.switch_role(Role::Admin).unwrap();
        board.handle_delete_employee(&created.id).await.unwrap();
        assert!(!board.employees().iter().any(|e| e.id == created.id));
    }

    #[tokio::test]
    async fn editing_yourself_refreshes_the_session() {
        let (mut board, store) = board_as("admin").await;
        board
            .handle_update_employee(
                "admin",
                EmployeeDraft {
                    name: "Renamed Admin".into(),
                    email: "admin@example.com".into(),
                    role: Role::Manager,
                },
            )
            .await
            .unwrap();

        let user = board.session().current_user.clone().unwrap();
        assert_eq!(user.name, "Renamed Admin");
        assert_eq!(user.role, Role::Manager);
        assert_eq!(board.session().role, Role::Manager);
        assert_eq!(Session::load(&store), *board.session());

        board
            .handle_update_employee(
                "u1",
                EmployeeDraft {
                    name: "Someone Else".into(),
                    email: "u1@example.com".into(),
                    role: Role::Employee,
                },
            )
            .await
            .unwrap();
        assert_eq!(board.session().current_user.as_ref().unwrap().name, "Renamed Admin");
    }

    #[test]
    fn name_only_change_keeps_switched_role() {
        let store = LocalStore::open_in_memory().unwrap();
        let mut session = Session::default();
        session
            .login(&store, CurrentUser::from(&employee("admin", Role::Admin)))
            .unwrap();
        session.set_role(&store, Role::Employee).unwrap();

        let mut renamed = employee("admin", Role::Admin);
        renamed.name = "New Name".into();
        session
            .refresh_user(&store, CurrentUser::from(&renamed))
            .unwrap();
        assert_eq!(session.role, Role::Employee);
        assert_eq!(Session::load(&store).current_user.unwrap().name, "New Name");
    }

    #[tokio::test]
    async fn signed_out_board_refuses_mutations() {
        let (mut board, _) = board_as("admin").await;
        board.logout().unwrap();
        assert!(matches!(
            board.handle_delete_task("t1").await,
            Err(BoardError::NotSignedIn)
        ));
        assert!(board.visible_tasks(&TaskFilter::default()).is_empty());
    }

    #[tokio::test]
    async fn reopened_board_keeps_session_mirror_and_log() {
        let (mut board, store) = board_as("admin").await;
        board
            .handle_task_status_change("t2", TaskStatus::InReview)
            .await
            .unwrap();

        let reopened = Board::open(
            FakeBackend::default(),
            store,
            audit::DEFAULT_MAX_ENTRIES,
            fast_retry(),
        );
        assert_eq!(reopened.session().role, Role::Admin);
        assert_eq!(reopened.tasks().len(), 3);
        assert_eq!(reopened.audit_log().unwrap().get_logs().len(), 1);
    }

    #[tokio::test]
    async fn legacy_task_mirror_is_migrated_on_open() {
        let store = Arc::new(LocalStore::open_in_memory().unwrap());
        store
            .set(
                TASKS_KEY,
                r#"[{"id":"t1","title":"Old","assigneeId":"u1","label":"ops"}]"#,
            )
            .unwrap();
        store
            .set_json(
                crate::storage::CURRENT_USER_KEY,
                &CurrentUser::from(&employee("u1", Role::Employee)),
            )
            .unwrap();

        let mut board = Board::open(
            FakeBackend::default(),
            store,
            audit::DEFAULT_MAX_ENTRIES,
            fast_retry(),
        );
        assert_eq!(board.tasks()[0].assignee_ids, vec!["u1".to_string()]);
        assert_eq!(board.tasks()[0].labels.len(), 1);
        assert_eq!(board.tasks()[0].labels[0].name, "ops");

        board
            .handle_task_status_change("t1", TaskStatus::Done)
            .await
            .unwrap();
        assert_eq!(board.backend().mutations(), vec!["update_task t1 done"]);
    }
}
