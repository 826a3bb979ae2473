//! Local key/value store and the session persisted in it
//!
//! Plays the part of browser `localStorage`: string keys, JSON string
//! values, synchronous reads and writes. Backed by a single SQLite table.

use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Serialize, de::DeserializeOwned};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::models::{CurrentUser, Role, Theme};

pub const CURRENT_USER_KEY: &str = "currentUser";
pub const CURRENT_ROLE_KEY: &str = "currentRole";
pub const THEME_KEY: &str = "theme";
pub const AUDIT_LOGS_KEY: &str = "auditLogs";
/// Key used by older builds; read when `auditLogs` is missing
pub const LEGACY_AUDIT_LOG_KEY: &str = "auditLog";
pub const TASKS_KEY: &str = "tasks";

/// Thread-safe local store
pub struct LocalStore {
    conn: Mutex<Connection>,
}

impl LocalStore {
    /// Open or create the store
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).context("Failed to create storage directory")?;
        }

        let conn = Connection::open(path).context("Failed to open local store")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory store")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS local_storage (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("local store lock poisoned"))
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT value FROM local_storage WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .with_context(|| format!("Failed to read '{}'", key))
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO local_storage (key, value) VALUES (?1, ?2)",
            params![key, value],
        )
        .with_context(|| format!("Failed to write '{}'", key))?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM local_storage WHERE key = ?1", params![key])?;
        Ok(())
    }

    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key)? {
            Some(raw) => {
                let value = serde_json::from_str(&raw)
                    .with_context(|| format!("Corrupt JSON stored under '{}'", key))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    pub fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw)
    }

    /// Drop the backing table so every later read and write fails
    #[cfg(test)]
    pub(crate) fn drop_table(&self) -> Result<()> {
        self.conn()?.execute_batch("DROP TABLE local_storage")?;
        Ok(())
    }
}

/// Signed-in user, role and theme, loaded once and written through on change
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub current_user: Option<CurrentUser>,
    pub role: Role,
    pub theme: Theme,
}

impl Session {
    /// Read the persisted session. Unreadable values fall back to defaults.
    pub fn load(store: &LocalStore) -> Self {
        let current_user = store
            .get_json::<CurrentUser>(CURRENT_USER_KEY)
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Ignoring stored current user");
                None
            });

        // currentRole is stored as a JSON string; older builds wrote it raw.
        let role = match store.get(CURRENT_ROLE_KEY) {
            Ok(Some(raw)) => {
                let raw = serde_json::from_str::<String>(&raw).unwrap_or(raw);
                Role::parse_lenient(&raw)
            }
            Ok(None) => current_user.as_ref().map(|u| u.role).unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring stored role");
                Role::default()
            }
        };

        let theme = match store.get_json::<Theme>(THEME_KEY) {
            Ok(theme) => theme.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring stored theme");
                Theme::default()
            }
        };

        Self {
            current_user,
            role,
            theme,
        }
    }

    pub fn login(&mut self, store: &LocalStore, user: CurrentUser) -> Result<()> {
        store.set_json(CURRENT_USER_KEY, &user)?;
        store.set_json(CURRENT_ROLE_KEY, &user.role)?;
        tracing::info!(user_id = %user.id, role = %user.role, "Signed in");
        self.role = user.role;
        self.current_user = Some(user);
        Ok(())
    }

    pub fn logout(&mut self, store: &LocalStore) -> Result<()> {
        store.remove(CURRENT_USER_KEY)?;
        store.remove(CURRENT_ROLE_KEY)?;
        self.current_user = None;
        self.role = Role::default();
        Ok(())
    }

    /// Replace the stored user after their employee record changed. The
    /// acting role follows only when the record's role itself changed.
    pub fn refresh_user(&mut self, store: &LocalStore, user: CurrentUser) -> Result<()> {
        let role_changed = self
            .current_user
            .as_ref()
            .is_some_and(|current| current.role != user.role);
        store.set_json(CURRENT_USER_KEY, &user)?;
        if role_changed {
            store.set_json(CURRENT_ROLE_KEY, &user.role)?;
            self.role = user.role;
        }
        self.current_user = Some(user);
        Ok(())
    }

    /// Switch the acting role without changing the signed-in user
    pub fn set_role(&mut self, store: &LocalStore, role: Role) -> Result<()> {
        store.set_json(CURRENT_ROLE_KEY, &role)?;
        self.role = role;
        Ok(())
    }

    pub fn set_theme(&mut self, store: &LocalStore, theme: Theme) -> Result<()> {
        store.set_json(THEME_KEY, &theme)?;
        self.theme = theme;
        Ok(())
    }

    /// The signed-in user with the session role applied
    pub fn actor(&self) -> Option<CurrentUser> {
        self.current_user.as_ref().map(|user| CurrentUser {
            role: self.role,
            ..user.clone()
        })
    }
}
