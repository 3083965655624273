use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::header::LOCATION;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use chrono::Utc;
use serde::Deserialize;
use tracing::{error, info};

use super::error::ApiError;
use super::extract::Caller;
use super::{AppState, parse_id};
use crate::persistence::Board;

pub const MAX_TITLE_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 500;

#[derive(Debug, Deserialize)]
pub struct BoardInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Returns the trimmed title, or an error when it is empty or too long.
pub(crate) fn validate_title(title: &str) -> Result<String, ApiError> {
    let title = title.trim();
    if title.is_empty() || title.chars().count() > MAX_TITLE_LEN {
        return Err(ApiError::bad_request(format!(
            "Title is required and must be <= {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(title.to_string())
}

pub(crate) fn validate_description(description: &str) -> Result<(), ApiError> {
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(ApiError::bad_request(format!(
            "Description must be <= {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(())
}

/// `GET /boards`: the caller's boards, newest first.
pub async fn list(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> Result<Json<Vec<Board>>, ApiError> {
    let boards = state.boards.list_boards_by_owner(caller).map_err(|err| {
        error!(error = %err, "cannot list boards");
        ApiError::Internal("Failed to fetch boards")
    })?;
    Ok(Json(boards))
}

/// `POST /boards`
pub async fn create(
    State(state): State<AppState>,
    Caller(caller): Caller,
    payload: Result<Json<BoardInput>, JsonRejection>,
) -> Result<(StatusCode, HeaderMap, Json<Board>), ApiError> {
    let Json(input) = payload?;
    let title = validate_title(&input.title)?;
    validate_description(&input.description)?;

    let board = Board::new(caller, title, input.description);
    state.boards.create_board(&board).map_err(|err| {
        error!(error = %err, "cannot create board");
        ApiError::Internal("Failed to create board")
    })?;
    info!(board_id = %board.id, owner_id = %caller, "board created");

    Ok((StatusCode::CREATED, location(&format!("/boards/{}", board.id)), Json(board)))
}

/// `GET /boards/{id}`
pub async fn get_one(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> Result<Json<Board>, ApiError> {
    let board_id = parse_id(&id, "Invalid board ID")?;
    Ok(Json(state.owned_board(board_id, caller)?))
}

/// `PUT /boards/{id}`: replaces title and description.
pub async fn update(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    payload: Result<Json<BoardInput>, JsonRejection>,
) -> Result<Json<Board>, ApiError> {
    let board_id = parse_id(&id, "Invalid board ID")?;
    let mut board = state.owned_board(board_id, caller)?;

    let Json(input) = payload?;
    board.title = validate_title(&input.title)?;
    validate_description(&input.description)?;
    board.description = input.description;
    board.updated_at = Utc::now();

    state
        .boards
        .update_board(&board)
        .map_err(|err| ApiError::from_store(err, "Board not found", "Failed to update board"))?;
    Ok(Json(board))
}

/// `DELETE /boards/{id}`: removes the board and its tasks and closes its live
/// subscriptions.
pub async fn remove(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let board_id = parse_id(&id, "Invalid board ID")?;
    state.owned_board(board_id, caller)?;

    state
        .boards
        .delete_board(board_id)
        .map_err(|err| ApiError::from_store(err, "Board not found", "Failed to delete board"))?;
    let closed = state.hub.close_board(board_id);
    info!(%board_id, closed, "board deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) fn location(path: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(path) {
        headers.insert(LOCATION, value);
    }
    headers
}
