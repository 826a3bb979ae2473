//! Two-phase drag between board columns
//!
//! Dragging over a column only moves the card in the local preview. The
//! move is persisted once, on drop, or discarded when the card is dropped
//! outside any column.

use crate::models::{Task, TaskStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragSession {
    task_id: String,
    original: TaskStatus,
    tentative: TaskStatus,
    crossings: usize,
}

/// What the board should do once the card is released
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragOutcome {
    Commit {
        task_id: String,
        from: TaskStatus,
        to: TaskStatus,
    },
    Rollback {
        task_id: String,
        status: TaskStatus,
    },
    Unchanged {
        task_id: String,
    },
}

impl DragSession {
    pub fn begin(task_id: impl Into<String>, original: TaskStatus) -> Self {
        Self {
            task_id: task_id.into(),
            original,
            tentative: original,
            crossings: 0,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn original(&self) -> TaskStatus {
        self.original
    }

    pub fn tentative(&self) -> TaskStatus {
        self.tentative
    }

    /// Number of column boundaries crossed so far
    pub fn crossings(&self) -> usize {
        self.crossings
    }

    /// Hovering over `column`; returns true when a column boundary was crossed
    pub fn drag_over(&mut self, column: TaskStatus) -> bool {
        if column == self.tentative {
            return false;
        }
        self.tentative = column;
        self.crossings += 1;
        true
    }

    /// Show the tentative column on a display copy of the board
    pub fn preview(&self, tasks: &mut [Task]) {
        if let Some(task) = tasks.iter_mut().find(|t| t.id == self.task_id) {
            task.status = self.tentative;
        }
    }

    /// Release the card over `drop_target`, `None` meaning outside any column
    pub fn finish(self, drop_target: Option<TaskStatus>) -> DragOutcome {
        match drop_target {
            None => DragOutcome::Rollback {
                task_id: self.task_id,
                status: self.original,
            },
            Some(to) if to == self.original => DragOutcome::Unchanged {
                task_id: self.task_id,
            },
            Some(to) => DragOutcome::Commit {
                task_id: self.task_id,
                from: self.original,
                to,
            },
        }
    }
}
