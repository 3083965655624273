//! The `api` module is the REST surface of taskhub.
//!
//! Routes:
//! - `POST /register`, `POST /login`: accounts and tokens, rate limited per IP
//! - `/boards`, `/boards/{id}`: boards of the calling user
//! - `/tasks`, `/tasks/{id}`: tasks of those boards; every mutation is pushed
//!   to the board's realtime subscribers through the hub
//!
//! Errors are answered as `{"error": "<message>"}`.

pub mod auth;
pub mod boards;
pub mod error;
pub mod extract;
pub mod tasks;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use crate::auth::JwtAuthenticator;
use crate::hub::Hub;
use crate::limiter::RateLimiter;
use crate::persistence::{Board, BoardId, BoardStore, TaskStore, UserId, UserStore};

pub use error::ApiError;
pub use extract::{Caller, ClientIp};

/// Shared handles every handler may use.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub boards: Arc<dyn BoardStore>,
    pub tasks: Arc<dyn TaskStore>,
    pub jwt: Arc<JwtAuthenticator>,
    pub hub: Arc<Hub>,
    pub login_limiter: Arc<RateLimiter>,
    pub bcrypt_cost: u32,
}

impl AppState {
    /// Loads a board and checks that `caller` owns it.
    pub(crate) fn owned_board(&self, board_id: BoardId, caller: UserId) -> Result<Board, ApiError> {
        let board = self
            .boards
            .get_board(board_id)
            .map_err(|err| ApiError::from_store(err, "Board not found", "Failed to fetch board"))?;
        if !board.is_owned_by(caller) {
            return Err(ApiError::Forbidden);
        }
        Ok(board)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/boards", get(boards::list).post(boards::create))
        .route(
            "/boards/{id}",
            get(boards::get_one).put(boards::update).delete(boards::remove),
        )
        .route("/tasks", get(tasks::list).post(tasks::create))
        .route(
            "/tasks/{id}",
            get(tasks::get_one).put(tasks::update).delete(tasks::remove),
        )
        .with_state(state)
}

pub(crate) fn parse_id(raw: &str, message: &'static str) -> Result<uuid::Uuid, ApiError> {
    uuid::Uuid::parse_str(raw).map_err(|_| ApiError::bad_request(message))
}
