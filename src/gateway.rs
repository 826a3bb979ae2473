//! HTTP gateway to the employees/tasks REST backend
//!
//! JSON in, JSON out. Non-2xx responses and elapsed deadlines become
//! `GatewayError`s; nothing is retried at this layer.

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use std::time::Duration;
use thiserror::Error;

use crate::migrate::{self, StoredTask};
use crate::models::{Employee, EmployeeDraft, Task, TaskDraft};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("HTTP error! status: {status} {status_text}")]
    Http {
        status: u16,
        status_text: String,
        body: String,
    },
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Failures worth retrying: the request never got an HTTP answer
    pub fn is_network(&self) -> bool {
        matches!(self, GatewayError::Timeout | GatewayError::Network(_))
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout
        } else {
            GatewayError::Network(err.to_string())
        }
    }
}

/// Typed calls the board issues against the backend
#[async_trait]
pub trait TaskBackend: Send + Sync {
    async fn list_employees(&self) -> Result<Vec<Employee>, GatewayError>;
    async fn create_employee(&self, draft: &EmployeeDraft) -> Result<Employee, GatewayError>;
    async fn update_employee(&self, employee: &Employee) -> Result<Employee, GatewayError>;
    async fn delete_employee(&self, id: &str) -> Result<(), GatewayError>;

    async fn list_tasks(&self) -> Result<Vec<Task>, GatewayError>;
    async fn create_task(&self, draft: &TaskDraft) -> Result<Task, GatewayError>;
    async fn update_task(&self, task: &Task) -> Result<Task, GatewayError>;
    async fn delete_task(&self, id: &str) -> Result<(), GatewayError>;
}

#[derive(Debug, Clone)]
pub struct Gateway {
    client: reqwest::Client,
    base_url: String,
}

impl Gateway {
    /// `timeout: None` leaves requests without a deadline
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, GatewayError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        let url = self.url(path);
        self.send_json(self.client.get(&url), "GET", &url).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, GatewayError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        self.send_json(self.client.post(&url).json(body), "POST", &url)
            .await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, GatewayError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        self.send_json(self.client.put(&url).json(body), "PUT", &url)
            .await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        let url = self.url(path);
        self.send_json(self.client.delete(&url), "DELETE", &url)
            .await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        rb: reqwest::RequestBuilder,
        method: &'static str,
        url: &str,
    ) -> Result<T, GatewayError> {
        let resp = rb.send().await.inspect_err(|e| {
            tracing::warn!(method, url, error = %e, "Backend unreachable");
        })?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            tracing::warn!(method, url, status = status.as_u16(), "Backend returned error");
            return Err(GatewayError::Http {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
                body,
            });
        }

        tracing::debug!(method, url, status = status.as_u16(), "Backend request complete");
        serde_json::from_str(&body).map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

#[async_trait]
impl TaskBackend for Gateway {
    async fn list_employees(&self) -> Result<Vec<Employee>, GatewayError> {
        self.get("employees").await
    }

    async fn create_employee(&self, draft: &EmployeeDraft) -> Result<Employee, GatewayError> {
        self.post("employees", draft).await
    }

    async fn update_employee(&self, employee: &Employee) -> Result<Employee, GatewayError> {
        self.put(&format!("employees/{}", employee.id), employee).await
    }

    async fn delete_employee(&self, id: &str) -> Result<(), GatewayError> {
        self.delete::<serde_json::Value>(&format!("employees/{}", id))
            .await
            .map(|_| ())
    }

    async fn list_tasks(&self) -> Result<Vec<Task>, GatewayError> {
        let stored: Vec<StoredTask> = self.get("tasks").await?;
        Ok(migrate::migrate_all(stored))
    }

    async fn create_task(&self, draft: &TaskDraft) -> Result<Task, GatewayError> {
        let stored: StoredTask = self.post("tasks", draft).await?;
        Ok(migrate::migrate(stored))
    }

    async fn update_task(&self, task: &Task) -> Result<Task, GatewayError> {
        let stored: StoredTask = self.put(&format!("tasks/{}", task.id), task).await?;
        Ok(migrate::migrate(stored))
    }

    async fn delete_task(&self, id: &str) -> Result<(), GatewayError> {
        self.delete::<serde_json::Value>(&format!("tasks/{}", id))
            .await
            .map(|_| ())
    }
}
