//! Append-only audit log persisted in the local store
//!
//! Entries are kept newest-first and capped at `max_entries`; the oldest
//! entries are dropped for good once the cap is reached. Storage failures
//! are logged and never surface to callers, so a broken store degrades to an
//! in-memory log.
//!
//! Two processes sharing one store race on the read-modify-write cycle;
//! the last writer wins.

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{ActionType, AuditLogEntry, EntityType, NewAuditEntry, TaskStatus};
use crate::storage::{AUDIT_LOGS_KEY, LEGACY_AUDIT_LOG_KEY, LocalStore};

pub const DEFAULT_MAX_ENTRIES: usize = 1000;

pub struct AuditLog {
    store: Arc<LocalStore>,
    entries: Vec<AuditLogEntry>,
    max_entries: usize,
}

impl AuditLog {
    /// Load the persisted log; unreadable data starts an empty log
    pub fn load(store: Arc<LocalStore>, max_entries: usize) -> Self {
        let mut entries = Self::read_persisted(&store);
        entries.truncate(max_entries);
        tracing::debug!(entries = entries.len(), "Audit log loaded");

        Self {
            store,
            entries,
            max_entries,
        }
    }

    fn read_persisted(store: &LocalStore) -> Vec<AuditLogEntry> {
        for key in [AUDIT_LOGS_KEY, LEGACY_AUDIT_LOG_KEY] {
            match store.get_json::<Vec<AuditLogEntry>>(key) {
                Ok(Some(entries)) => return entries,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(key, error = %e, "Discarding unreadable audit log");
                    return Vec::new();
                }
            }
        }
        Vec::new()
    }

    fn persist(&self) {
        if let Err(e) = self.store.set_json(AUDIT_LOGS_KEY, &self.entries) {
            tracing::error!(error = %e, entries = self.entries.len(), "Failed to persist audit log");
        }
    }

    /// Record an entry with a fresh id and the current timestamp
    pub fn add_log(&mut self, entry: NewAuditEntry) -> AuditLogEntry {
        let entry = AuditLogEntry {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            action_type: entry.action_type,
            entity_type: entry.entity_type,
            entity_id: entry.entity_id,
            entity_name: entry.entity_name,
            user_role: entry.user_role,
            details: entry.details,
            previous_value: entry.previous_value,
            new_value: entry.new_value,
        };

        tracing::debug!(
            id = %entry.id,
            action = ?entry.action_type,
            entity_id = %entry.entity_id,
            "Audit entry recorded"
        );

        self.entries.insert(0, entry.clone());
        self.entries.truncate(self.max_entries);
        self.persist();
        entry
    }

    /// All entries, newest first
    pub fn get_logs(&self) -> &[AuditLogEntry] {
        &self.entries
    }

    pub fn get_log(&self, id: &str) -> Option<&AuditLogEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn get_logs_by_entity_type(&self, entity_type: EntityType) -> Vec<&AuditLogEntry> {
        self.entries
            .iter()
            .filter(|e| e.entity_type == entity_type)
            .collect()
    }

    pub fn get_logs_by_action_type(&self, action_type: ActionType) -> Vec<&AuditLogEntry> {
        self.entries
            .iter()
            .filter(|e| e.action_type == action_type)
            .collect()
    }

    pub fn get_logs_for_entity(&self, entity_id: &str) -> Vec<&AuditLogEntry> {
        self.entries
            .iter()
            .filter(|e| e.entity_id == entity_id)
            .collect()
    }

    pub fn clear_logs(&mut self) {
        self.entries.clear();
        self.persist();
    }

    pub fn export_logs(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.entries).context("Failed to serialize audit log")
    }

    /// Replace the log with exported JSON. Returns the number of entries kept.
    pub fn import_logs(&mut self, json: &str) -> Result<usize> {
        let mut entries: Vec<AuditLogEntry> =
            serde_json::from_str(json).context("Invalid audit log export")?;
        entries.truncate(self.max_entries);

        tracing::info!(entries = entries.len(), "Audit log imported");
        self.entries = entries;
        self.persist();
        Ok(self.entries.len())
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }
}

/// Only task status changes with both sides recorded can be reversed
pub fn can_restore_status_change(entry: &AuditLogEntry) -> bool {
    entry.action_type == ActionType::TaskStatusChanged
        && entry.entity_type == EntityType::Task
        && recorded_status(entry.previous_value.as_deref()).is_some()
        && recorded_status(entry.new_value.as_deref()).is_some()
}

/// The `(previous, new)` statuses of a restorable entry
pub fn status_change_of(entry: &AuditLogEntry) -> Option<(TaskStatus, TaskStatus)> {
    if !can_restore_status_change(entry) {
        return None;
    }
    Some((
        recorded_status(entry.previous_value.as_deref())?,
        recorded_status(entry.new_value.as_deref())?,
    ))
}

fn recorded_status(value: Option<&str>) -> Option<TaskStatus> {
    value?.parse().ok()
}
