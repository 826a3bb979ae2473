//! Mock REST backend serving `/employees` and `/tasks`

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::db::Database;
use crate::models::{Employee, EmployeeDraft, Task, TaskDraft};

/// Application state shared across handlers
pub struct AppState {
    pub db: Database,
}

impl AppState {
    pub fn new(db: Database) -> Arc<Self> {
        Arc::new(Self { db })
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/employees", get(list_employees).post(create_employee))
        .route(
            "/employees/{id}",
            get(get_employee).put(update_employee).delete(delete_employee),
        )
        .route("/tasks", get(list_tasks).post(create_task))
        .route(
            "/tasks/{id}",
            get(get_task).put(update_task).delete(delete_task),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "taskboard",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn list_employees(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Employee>>, ApiError> {
    Ok(Json(state.db.list_employees()?))
}

async fn get_employee(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Employee>, ApiError> {
    found(state.db.get_employee(&id)?, "employee", &id)
}

async fn create_employee(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<EmployeeDraft>,
) -> Result<(StatusCode, Json<Employee>), ApiError> {
    let employee = state.db.create_employee(draft)?;
    tracing::info!(employee_id = %employee.id, "Employee created");
    Ok((StatusCode::CREATED, Json(employee)))
}

async fn update_employee(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(employee): Json<Employee>,
) -> Result<Json<Employee>, ApiError> {
    found(state.db.update_employee(&id, employee)?, "employee", &id)
}

async fn delete_employee(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Employee>, ApiError> {
    found(state.db.delete_employee(&id)?, "employee", &id)
}

async fn list_tasks(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Task>>, ApiError> {
    Ok(Json(state.db.list_tasks()?))
}

async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    found(state.db.get_task(&id)?, "task", &id)
}

async fn create_task(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<TaskDraft>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let task = state.db.create_task(draft)?;
    tracing::info!(task_id = %task.id, "Task created");
    Ok((StatusCode::CREATED, Json(task)))
}

async fn update_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(task): Json<Task>,
) -> Result<Json<Task>, ApiError> {
    found(state.db.update_task(&id, task)?, "task", &id)
}

async fn delete_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    found(state.db.delete_task(&id)?, "task", &id)
}

fn found<T>(record: Option<T>, kind: &str, id: &str) -> Result<Json<T>, ApiError> {
    record
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("{} '{}' not found", kind, id)))
}

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Internal(err) => {
                tracing::error!(error = %err, "API error");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Internal(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, header},
    };
    use tower::ServiceExt;

    fn app() -> Router {
        create_router(AppState::new(Database::open_in_memory().unwrap()))
    }

    async fn call(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (status, json) = call(&app(), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn task_lifecycle() {
        let app = app();
        let (status, created) = call(
            &app,
            "POST",
            "/tasks",
            Some(serde_json::json!({ "title": "Deploy", "assigneeIds": ["e1"] })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_str().unwrap().to_string();
        assert_eq!(created["status"], "pending");

        let mut body = created.clone();
        body["status"] = "in progress".into();
        let (status, updated) = call(&app, "PUT", &format!("/tasks/{}", id), Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["status"], "in-progress");

        let (_, list) = call(&app, "GET", "/tasks", None).await;
        assert_eq!(list.as_array().unwrap().len(), 1);

        let (status, deleted) = call(&app, "DELETE", &format!("/tasks/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deleted["id"], id.as_str());

        let (status, err) = call(&app, "GET", &format!("/tasks/{}", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(err["error"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn employee_lifecycle() {
        let app = app();
        let (status, created) = call(
            &app,
            "POST",
            "/employees",
            Some(serde_json::json!({
                "name": "Kim",
                "email": "kim@example.com",
                "role": "manager"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_str().unwrap().to_string();

        let (status, fetched) = call(&app, "GET", &format!("/employees/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["role"], "manager");

        let (status, _) = call(&app, "DELETE", "/employees/unknown", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
