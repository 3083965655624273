use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, error};

use super::boards::{location, validate_description, validate_title};
use super::error::ApiError;
use super::extract::Caller;
use super::{AppState, parse_id};
use crate::hub::TaskChangeEvent;
use crate::persistence::{Task, TaskStatus, UserId};

#[derive(Debug, Deserialize)]
pub struct TaskFilter {
    pub board_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewTask {
    #[serde(default)]
    pub board_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: String,
}

/// Partial update; absent fields keep their value.
#[derive(Debug, Deserialize)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
}

fn parse_status(raw: &str) -> Result<TaskStatus, ApiError> {
    TaskStatus::normalize(raw)
        .ok_or_else(|| ApiError::bad_request("status must be one of todo, in-progress, done"))
}

/// Loads a task and checks that `caller` owns its board.
fn owned_task(state: &AppState, raw_id: &str, caller: UserId) -> Result<Task, ApiError> {
    let task_id = parse_id(raw_id, "Invalid task ID")?;
    let task = state
        .tasks
        .get_task(task_id)
        .map_err(|err| ApiError::from_store(err, "Task not found", "Failed to fetch task"))?;
    state.owned_board(task.board_id, caller)?;
    Ok(task)
}

fn publish(state: &AppState, event: TaskChangeEvent, task: &Task) {
    let delivered = state.hub.broadcast(task.board_id, &event);
    debug!(
        board_id = %task.board_id,
        task_id = %task.id,
        status = task.status.as_str(),
        delivered,
        "task change broadcast"
    );
}

/// `GET /tasks?board_id=<uuid>`: tasks of one board, oldest first.
pub async fn list(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Query(filter): Query<TaskFilter>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let raw = filter.board_id.unwrap_or_default();
    let board_id = parse_id(&raw, "board_id is required (uuid)")?;
    state.owned_board(board_id, caller)?;

    let tasks = state.tasks.list_tasks_by_board(board_id).map_err(|err| {
        error!(error = %err, "cannot list tasks");
        ApiError::Internal("Failed to list tasks")
    })?;
    Ok(Json(tasks))
}

/// `POST /tasks`
pub async fn create(
    State(state): State<AppState>,
    Caller(caller): Caller,
    payload: Result<Json<NewTask>, JsonRejection>,
) -> Result<(StatusCode, HeaderMap, Json<Task>), ApiError> {
    let Json(input) = payload?;
    if input.title.trim().is_empty() || input.board_id.trim().is_empty() {
        return Err(ApiError::bad_request("title and board_id are required"));
    }
    let board_id = parse_id(input.board_id.trim(), "board_id must be a valid uuid")?;
    let title = validate_title(&input.title)?;
    validate_description(&input.description)?;
    let status = parse_status(&input.status)?;

    state.owned_board(board_id, caller)?;

    let task = Task::new(board_id, title, input.description, status);
    state.tasks.create_task(&task).map_err(|err| {
        error!(error = %err, "cannot create task");
        ApiError::Internal("Failed to create task")
    })?;

    publish(&state, TaskChangeEvent::updated(&task), &task);
    Ok((StatusCode::CREATED, location(&format!("/tasks/{}", task.id)), Json(task)))
}

/// `GET /tasks/{id}`
pub async fn get_one(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    Ok(Json(owned_task(&state, &id, caller)?))
}

/// `PUT /tasks/{id}`
pub async fn update(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    payload: Result<Json<TaskPatch>, JsonRejection>,
) -> Result<Json<Task>, ApiError> {
    let mut task = owned_task(&state, &id, caller)?;
    let Json(patch) = payload?;

    if let Some(title) = patch.title {
        task.title = validate_title(&title)?;
    }
    if let Some(description) = patch.description {
        validate_description(&description)?;
        task.description = description;
    }
    if let Some(status) = patch.status {
        task.status = parse_status(&status)?;
    }
    task.updated_at = Utc::now();

    state
        .tasks
        .update_task(&task)
        .map_err(|err| ApiError::from_store(err, "Task not found", "Failed to update task"))?;

    publish(&state, TaskChangeEvent::updated(&task), &task);
    Ok(Json(task))
}

/// `DELETE /tasks/{id}`
pub async fn remove(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let task = owned_task(&state, &id, caller)?;
    state
        .tasks
        .delete_task(task.id)
        .map_err(|err| ApiError::from_store(err, "Task not found", "Failed to delete task"))?;

    publish(&state, TaskChangeEvent::deleted(&task), &task);
    Ok(StatusCode::NO_CONTENT)
}
