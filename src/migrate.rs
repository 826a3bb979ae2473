//! One-way normalization of stored task records
//!
//! Older records carry a single `assigneeId` and a single `label` (either a
//! label object or a bare name). `StoredTask` accepts every generation and
//! `migrate` maps it onto the current `Task` shape; nothing downstream sees
//! the legacy fields.

use serde::{Deserialize, Serialize};

use crate::labels;
use crate::models::{Label, Priority, Task, TaskStatus};

/// A label as found in stored records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredLabel {
    Full(Label),
    Name(String),
}

impl StoredLabel {
    fn into_label(self) -> Label {
        match self {
            StoredLabel::Full(label) => label,
            StoredLabel::Name(name) => labels::custom_label(&name),
        }
    }
}

/// Task record of any generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTask {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub assignee_ids: Option<Vec<String>>,
    #[serde(default)]
    pub assignee_id: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub labels: Option<Vec<StoredLabel>>,
    #[serde(default)]
    pub label: Option<StoredLabel>,
    #[serde(default)]
    pub custom_color: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl StoredTask {
    pub fn is_legacy(&self) -> bool {
        (self.assignee_ids.is_none() && self.assignee_id.is_some())
            || (self.labels.is_none() && self.label.is_some())
    }
}

impl From<Task> for StoredTask {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            title: task.title,
            description: Some(task.description),
            status: task.status,
            assignee_ids: Some(task.assignee_ids),
            assignee_id: None,
            priority: task.priority,
            due_date: task.due_date,
            labels: Some(task.labels.into_iter().map(StoredLabel::Full).collect()),
            label: None,
            custom_color: task.custom_color,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

/// Map a stored record onto the current shape.
///
/// An explicit `assigneeIds` array wins over `assigneeId`; likewise `labels`
/// wins over `label`. Empty legacy assignee ids become no assignee.
pub fn migrate(stored: StoredTask) -> Task {
    let assignee_ids = match (stored.assignee_ids, stored.assignee_id) {
        (Some(ids), _) => ids,
        (None, Some(id)) if !id.trim().is_empty() => vec![id],
        (None, _) => Vec::new(),
    };

    let labels = match (stored.labels, stored.label) {
        (Some(labels), _) => labels.into_iter().map(StoredLabel::into_label).collect(),
        (None, Some(label)) => vec![label.into_label()],
        (None, None) => Vec::new(),
    };

    Task {
        id: stored.id,
        title: stored.title,
        description: stored.description.unwrap_or_default(),
        status: stored.status,
        assignee_ids,
        priority: stored.priority,
        due_date: stored.due_date,
        labels,
        custom_color: stored.custom_color,
        created_at: stored.created_at,
        updated_at: stored.updated_at,
    }
}

pub fn migrate_all(stored: Vec<StoredTask>) -> Vec<Task> {
    let legacy = stored.iter().filter(|t| t.is_legacy()).count();
    if legacy > 0 {
        tracing::debug!(legacy, total = stored.len(), "Migrating legacy task records");
    }
    stored.into_iter().map(migrate).collect()
}
