//! Board data models (shared between the client and the mock backend)
//!
//! JSON field names follow the REST surface: camelCase, string ids and
//! RFC 3339 timestamps.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Role of the signed-in employee
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    #[default]
    Employee,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Manager, Role::Employee];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Employee => "employee",
        }
    }

    /// Parse a stored role, falling back to the most restrictive role
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or(Role::Employee)
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "employee" => Ok(Role::Employee),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Unknown roles deserialize to `Employee` instead of failing the record.
impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Role::parse_lenient(&raw))
    }
}

/// An employee on the roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
}

/// Board column a task sits in
///
/// Accepts the spellings of both board generations (`planning`,
/// `in progress`) and normalizes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    #[serde(rename = "pending", alias = "planning")]
    Pending,
    #[serde(rename = "in-progress", alias = "in progress", alias = "in_progress")]
    InProgress,
    #[serde(rename = "in-review", alias = "in review", alias = "in_review")]
    InReview,
    #[serde(rename = "done")]
    Done,
    #[serde(rename = "failed")]
    Failed,
}

impl TaskStatus {
    /// Columns in display order
    pub const BOARD_COLUMNS: [TaskStatus; 5] = [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::InReview,
        TaskStatus::Done,
        TaskStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::InReview => "in-review",
            TaskStatus::Done => "done",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::InReview => "In Review",
            TaskStatus::Done => "Done",
            TaskStatus::Failed => "Failed",
        }
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" | "planning" => Ok(TaskStatus::Pending),
            "in-progress" | "in progress" | "in_progress" => Ok(TaskStatus::InProgress),
            "in-review" | "in review" | "in_review" => Ok(TaskStatus::InReview),
            "done" => Ok(TaskStatus::Done),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(format!("unknown task status '{}'", other)),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority level for tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            other => Err(format!("unknown priority '{}'", other)),
        }
    }
}

/// Grouping used by the label picker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelCategory {
    Type,
    Priority,
    Area,
    #[default]
    Custom,
}

/// A colored tag that can be attached to tasks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    pub id: String,
    pub name: String,
    pub color: String,
    #[serde(default)]
    pub category: LabelCategory,
    pub bg_color: String,
    pub text_color: String,
}

/// A task card on the board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub assignee_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Task {
    pub fn is_assigned_to(&self, user_id: &str) -> bool {
        self.assignee_ids.iter().any(|id| id == user_id)
    }
}

/// Signed-in user, persisted under `currentUser`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub role: Role,
}

impl From<&Employee> for CurrentUser {
    fn from(employee: &Employee) -> Self {
        Self {
            id: employee.id.clone(),
            name: employee.name.clone(),
            role: employee.role,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("unknown theme '{}'", other)),
        }
    }
}

/// Kind of state change recorded in the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    TaskCreated,
    TaskUpdated,
    TaskDeleted,
    TaskStatusChanged,
    TaskAssigned,
    TaskColorChanged,
    EmployeeCreated,
    EmployeeUpdated,
    EmployeeDeleted,
    RoleChanged,
    StatusRestored,
}

impl FromStr for ActionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        serde_json::from_value(serde_json::Value::String(normalized))
            .map_err(|_| format!("unknown action type '{}'", s))
    }
}

/// Kind of entity an audit entry refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Task,
    Employee,
    System,
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "task" => Ok(EntityType::Task),
            "employee" => Ok(EntityType::Employee),
            "system" => Ok(EntityType::System),
            other => Err(format!("unknown entity type '{}'", other)),
        }
    }
}

/// A recorded state-changing action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: String,
    pub timestamp: String,
    pub action_type: ActionType,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub entity_name: String,
    pub user_role: Role,
    pub details: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<String>,
}

/// Audit entry before the log assigns its id and timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuditEntry {
    pub action_type: ActionType,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub entity_name: String,
    pub user_role: Role,
    pub details: String,
    pub previous_value: Option<String>,
    pub new_value: Option<String>,
}

/// Form input rejected before reaching the gateway
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    Required(&'static str),
    #[error("{field} must be at least {min} characters")]
    TooShort { field: &'static str, min: usize },
    #[error("email address is not valid")]
    InvalidEmail,
}

const MIN_TASK_TITLE: usize = 3;
const MIN_EMPLOYEE_NAME: usize = 2;

/// Task form input
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub assignee_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_color: Option<String>,
}

impl TaskDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(ValidationError::Required("title"));
        }
        if title.chars().count() < MIN_TASK_TITLE {
            return Err(ValidationError::TooShort {
                field: "title",
                min: MIN_TASK_TITLE,
            });
        }
        Ok(())
    }

    /// Apply the edited fields onto an existing task
    pub fn apply_to(&self, task: &mut Task) {
        task.title = self.title.trim().to_string();
        task.description = self.description.clone();
        task.priority = self.priority;
        task.due_date = self.due_date.clone();
        task.labels = self.labels.clone();
        if self.custom_color.is_some() {
            task.custom_color = self.custom_color.clone();
        }
    }
}

/// Employee form input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeDraft {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
}

impl EmployeeDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ValidationError::Required("name"));
        }
        if name.chars().count() < MIN_EMPLOYEE_NAME {
            return Err(ValidationError::TooShort {
                field: "name",
                min: MIN_EMPLOYEE_NAME,
            });
        }

        let email = self.email.trim();
        if email.is_empty() {
            return Err(ValidationError::Required("email"));
        }
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
            _ => Err(ValidationError::InvalidEmail),
        }
    }

    pub fn into_employee(self, id: String) -> Employee {
        Employee {
            id,
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            role: self.role,
        }
    }
}
