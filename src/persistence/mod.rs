//! The `persistence` module stores users, boards and tasks.
//!
//! The rest of the crate talks to storage through the `UserStore`,
//! `BoardStore` and `TaskStore` traits. `SledStore` implements all three on top
//! of `sled`, an embedded key-value store, with one tree per record kind.
//!
//! All store operations are synchronous and safe to call concurrently; callers
//! never hold the hub or rate limiter locks while calling them.

pub mod models;
pub mod sled_store;

#[cfg(test)]
mod tests;

pub use models::{Board, BoardId, Task, TaskId, TaskStatus, User, UserId};
pub use sled_store::SledStore;

use crate::utils::error::StoreError;

pub trait UserStore: Send + Sync {
    /// Insert a new user. Fails with `StoreError::Conflict` when the email is taken.
    fn create_user(&self, user: &User) -> Result<(), StoreError>;

    fn get_user_by_email(&self, email: &str) -> Result<User, StoreError>;
}

pub trait BoardStore: Send + Sync {
    fn create_board(&self, board: &Board) -> Result<(), StoreError>;

    fn get_board(&self, id: BoardId) -> Result<Board, StoreError>;

    fn update_board(&self, board: &Board) -> Result<(), StoreError>;

    /// Delete a board together with its tasks.
    fn delete_board(&self, id: BoardId) -> Result<(), StoreError>;

    /// Boards owned by `owner`, newest first.
    fn list_boards_by_owner(&self, owner: UserId) -> Result<Vec<Board>, StoreError>;
}

pub trait TaskStore: Send + Sync {
    fn create_task(&self, task: &Task) -> Result<(), StoreError>;

    fn get_task(&self, id: TaskId) -> Result<Task, StoreError>;

    fn update_task(&self, task: &Task) -> Result<(), StoreError>;

    fn delete_task(&self, id: TaskId) -> Result<(), StoreError>;

    /// Tasks of one board, oldest first.
    fn list_tasks_by_board(&self, board_id: BoardId) -> Result<Vec<Task>, StoreError>;
}
