//! Storage for the mock REST backend
//!
//! Records are kept as JSON documents keyed by id, in insertion order.
//! Task rows may be in any stored generation and are normalized on read.

use anyhow::{Context, Result, anyhow};
use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::migrate::{self, StoredTask};
use crate::models::{Employee, EmployeeDraft, Task, TaskDraft};

/// Thread-safe database wrapper
pub struct Database {
    conn: Mutex<Connection>,
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl Database {
    /// Open or create the database
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }

        let conn = Connection::open(path).context("Failed to open database")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open database")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| anyhow!("database lock poisoned"))
    }

    /// Initialize the database schema
    fn init(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS employees (
                id TEXT PRIMARY KEY,
                data TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                data TEXT NOT NULL
            );
            "#,
        )?;

        Ok(())
    }

    pub fn list_employees(&self) -> Result<Vec<Employee>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT data FROM employees ORDER BY rowid")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut employees = Vec::new();
        for raw in rows {
            employees.push(serde_json::from_str(&raw?).context("Corrupt employee row")?);
        }
        Ok(employees)
    }

    pub fn get_employee(&self, id: &str) -> Result<Option<Employee>> {
        let conn = self.conn()?;
        Self::read_doc(&conn, "employees", id)?
            .map(|raw| serde_json::from_str(&raw).context("Corrupt employee row"))
            .transpose()
    }

    pub fn create_employee(&self, draft: EmployeeDraft) -> Result<Employee> {
        let employee = draft.into_employee(Uuid::new_v4().to_string());
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO employees (id, data) VALUES (?1, ?2)",
            params![&employee.id, serde_json::to_string(&employee)?],
        )?;
        Ok(employee)
    }

    /// Replace an employee; `None` when the id is unknown
    pub fn update_employee(&self, id: &str, mut employee: Employee) -> Result<Option<Employee>> {
        employee.id = id.to_string();
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE employees SET data = ?2 WHERE id = ?1",
            params![id, serde_json::to_string(&employee)?],
        )?;
        Ok((changed > 0).then_some(employee))
    }

    pub fn delete_employee(&self, id: &str) -> Result<Option<Employee>> {
        let existing = self.get_employee(id)?;
        if existing.is_some() {
            let conn = self.conn()?;
            conn.execute("DELETE FROM employees WHERE id = ?1", params![id])?;
        }
        Ok(existing)
    }

    pub fn list_tasks(&self) -> Result<Vec<Task>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT data FROM tasks ORDER BY rowid")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut stored = Vec::new();
        for raw in rows {
            stored.push(serde_json::from_str::<StoredTask>(&raw?).context("Corrupt task row")?);
        }
        Ok(migrate::migrate_all(stored))
    }

    pub fn get_task(&self, id: &str) -> Result<Option<Task>> {
        let conn = self.conn()?;
        Self::read_doc(&conn, "tasks", id)?
            .map(|raw| {
                serde_json::from_str::<StoredTask>(&raw)
                    .map(migrate::migrate)
                    .context("Corrupt task row")
            })
            .transpose()
    }

    pub fn create_task(&self, draft: TaskDraft) -> Result<Task> {
        let stamp = now();
        let task = Task {
            id: Uuid::new_v4().to_string(),
            title: draft.title,
            description: draft.description,
            status: draft.status,
            assignee_ids: draft.assignee_ids,
            priority: draft.priority,
            due_date: draft.due_date,
            labels: draft.labels,
            custom_color: draft.custom_color,
            created_at: Some(stamp.clone()),
            updated_at: Some(stamp),
        };
        self.insert_stored(&StoredTask::from(task.clone()))?;
        Ok(task)
    }

    /// Insert a record as-is, legacy shapes included
    pub fn insert_stored(&self, task: &StoredTask) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO tasks (id, data) VALUES (?1, ?2)",
            params![&task.id, serde_json::to_string(task)?],
        )?;
        Ok(())
    }

    /// Replace a task; `None` when the id is unknown
    pub fn update_task(&self, id: &str, mut task: Task) -> Result<Option<Task>> {
        let Some(existing) = self.get_task(id)? else {
            return Ok(None);
        };

        task.id = id.to_string();
        task.created_at = task.created_at.or(existing.created_at);
        task.updated_at = Some(now());

        let conn = self.conn()?;
        conn.execute(
            "UPDATE tasks SET data = ?2 WHERE id = ?1",
            params![id, serde_json::to_string(&task)?],
        )?;
        Ok(Some(task))
    }

    pub fn delete_task(&self, id: &str) -> Result<Option<Task>> {
        let existing = self.get_task(id)?;
        if existing.is_some() {
            let conn = self.conn()?;
            conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        }
        Ok(existing)
    }

    fn read_doc(conn: &Connection, table: &str, id: &str) -> Result<Option<String>> {
        let sql = format!("SELECT data FROM {} WHERE id = ?1", table);
        conn.query_row(&sql, params![id], |row| row.get(0))
            .optional()
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, TaskStatus};

    #[test]
    fn employee_crud() {
        let db = Database::open_in_memory().unwrap();
        let created = db
            .create_employee(EmployeeDraft {
                name: " Lin ".into(),
                email: "lin@example.com".into(),
                role: Role::Admin,
            })
            .unwrap();
        assert_eq!(created.name, "Lin");
        assert_eq!(db.get_employee(&created.id).unwrap(), Some(created.clone()));

        let renamed = Employee {
            name: "Lin Wei".into(),
            ..created.clone()
        };
        assert_eq!(
            db.update_employee(&created.id, renamed.clone()).unwrap(),
            Some(renamed)
        );
        assert_eq!(db.update_employee("nope", created.clone()).unwrap(), None);

        assert!(db.delete_employee(&created.id).unwrap().is_some());
        assert!(db.list_employees().unwrap().is_empty());
        assert!(db.delete_employee(&created.id).unwrap().is_none());
    }

    #[test]
    fn task_crud_stamps_timestamps() {
        let db = Database::open_in_memory().unwrap();
        let task = db
            .create_task(TaskDraft {
                title: "Plan sprint".into(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(task.created_at, task.updated_at);

        let mut edited = task.clone();
        edited.status = TaskStatus::InProgress;
        edited.created_at = None;
        let updated = db.update_task(&task.id, edited).unwrap().unwrap();
        assert_eq!(updated.created_at, task.created_at);
        assert_eq!(updated.status, TaskStatus::InProgress);

        assert_eq!(db.list_tasks().unwrap(), vec![updated]);
        assert!(db.update_task("missing", task.clone()).unwrap().is_none());
    }

    #[test]
    fn legacy_rows_are_normalized_on_read() {
        let db = Database::open_in_memory().unwrap();
        let legacy: StoredTask =
            serde_json::from_str(r#"{"id":"old","title":"Old","assigneeId":"u1","label":"ops"}"#)
                .unwrap();
        db.insert_stored(&legacy).unwrap();

        let task = db.get_task("old").unwrap().unwrap();
        assert_eq!(task.assignee_ids, vec!["u1".to_string()]);
        assert_eq!(task.labels[0].name, "ops");
    }

    #[test]
    fn list_preserves_insertion_order() {
        let db = Database::open_in_memory().unwrap();
        for title in ["first", "second", "third"] {
            db.create_task(TaskDraft {
                title: title.into(),
                ..Default::default()
            })
            .unwrap();
        }
        let titles: Vec<_> = db.list_tasks().unwrap().into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["first", "second", "third"]);
    }
}
