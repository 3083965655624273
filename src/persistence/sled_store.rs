//! Persistence backed by `sled`.
//!
//! Records are stored as JSON under their UUID bytes, one tree per record
//! kind. A secondary `users_by_email` tree maps an email to its user id. It is
//! written in the same transaction as the user record, so two concurrent
//! registrations of the same email cannot both succeed and the index never
//! points at a missing user.

use serde::Serialize;
use serde::de::DeserializeOwned;
use sled::transaction::{ConflictableTransactionResult, TransactionError, abort};
use sled::{Db, Transactional, Tree};

use super::models::{Board, BoardId, Task, TaskId, User, UserId};
use super::{BoardStore, TaskStore, UserStore};
use crate::utils::error::StoreError;

#[derive(Clone)]
pub struct SledStore {
    db: Db,
    users: Tree,
    users_by_email: Tree,
    boards: Tree,
    tasks: Tree,
}

impl SledStore {
    /// Open or create a sled database at `path`.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> Result<Self, StoreError> {
        Ok(Self {
            users: db.open_tree("users")?,
            users_by_email: db.open_tree("users_by_email")?,
            boards: db.open_tree("boards")?,
            tasks: db.open_tree("tasks")?,
            db,
        })
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    fn scan<T: DeserializeOwned>(tree: &Tree) -> Result<Vec<T>, StoreError> {
        tree.iter()
            .map(|entry| {
                let (_, value) = entry?;
                decode(&value)
            })
            .collect()
    }
}

fn encode<T: Serialize>(record: &T) -> Result<Vec<u8>, StoreError> {
    Ok(serde_json::to_vec(record)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    Ok(serde_json::from_slice(bytes)?)
}

fn get<T: DeserializeOwned>(tree: &Tree, id: &uuid::Uuid) -> Result<T, StoreError> {
    match tree.get(id.as_bytes())? {
        Some(value) => decode(&value),
        None => Err(StoreError::NotFound),
    }
}

fn replace<T: Serialize>(tree: &Tree, id: &uuid::Uuid, record: &T) -> Result<(), StoreError> {
    if !tree.contains_key(id.as_bytes())? {
        return Err(StoreError::NotFound);
    }
    tree.insert(id.as_bytes(), encode(record)?)?;
    Ok(())
}

impl UserStore for SledStore {
    fn create_user(&self, user: &User) -> Result<(), StoreError> {
        let record = encode(user)?;
        let result = (&self.users, &self.users_by_email).transaction(
            |(users, by_email)| -> ConflictableTransactionResult<(), ()> {
                if by_email.get(user.email.as_bytes())?.is_some() {
                    return abort(());
                }
                by_email.insert(user.email.as_bytes(), &user.id.as_bytes()[..])?;
                users.insert(&user.id.as_bytes()[..], record.as_slice())?;
                Ok(())
            },
        );

        match result {
            Ok(()) => Ok(()),
            Err(TransactionError::Abort(())) => Err(StoreError::Conflict(format!(
                "email {} already registered",
                user.email
            ))),
            Err(TransactionError::Storage(err)) => Err(err.into()),
        }
    }

    fn get_user_by_email(&self, email: &str) -> Result<User, StoreError> {
        let id = self
            .users_by_email
            .get(email.as_bytes())?
            .ok_or(StoreError::NotFound)?;
        let id = UserId::from_slice(&id).map_err(|_| StoreError::NotFound)?;
        get(&self.users, &id)
    }
}

impl BoardStore for SledStore {
    fn create_board(&self, board: &Board) -> Result<(), StoreError> {
        self.boards.insert(board.id.as_bytes(), encode(board)?)?;
        Ok(())
    }

    fn get_board(&self, id: BoardId) -> Result<Board, StoreError> {
        get(&self.boards, &id)
    }

    fn update_board(&self, board: &Board) -> Result<(), StoreError> {
        replace(&self.boards, &board.id, board)
    }

    fn delete_board(&self, id: BoardId) -> Result<(), StoreError> {
        if self.boards.remove(id.as_bytes())?.is_none() {
            return Err(StoreError::NotFound);
        }

        for task in self.list_tasks_by_board(id)? {
            self.tasks.remove(task.id.as_bytes())?;
        }
        Ok(())
    }

    fn list_boards_by_owner(&self, owner: UserId) -> Result<Vec<Board>, StoreError> {
        let mut boards: Vec<Board> = Self::scan::<Board>(&self.boards)?
            .into_iter()
            .filter(|b| b.owner_id == owner)
            .collect();
        boards.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(boards)
    }
}

impl TaskStore for SledStore {
    fn create_task(&self, task: &Task) -> Result<(), StoreError> {
        self.tasks.insert(task.id.as_bytes(), encode(task)?)?;
        Ok(())
    }

    fn get_task(&self, id: TaskId) -> Result<Task, StoreError> {
        get(&self.tasks, &id)
    }

    fn update_task(&self, task: &Task) -> Result<(), StoreError> {
        replace(&self.tasks, &task.id, task)
    }

    fn delete_task(&self, id: TaskId) -> Result<(), StoreError> {
        match self.tasks.remove(id.as_bytes())? {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound),
        }
    }

    fn list_tasks_by_board(&self, board_id: BoardId) -> Result<Vec<Task>, StoreError> {
        let mut tasks: Vec<Task> = Self::scan::<Task>(&self.tasks)?
            .into_iter()
            .filter(|t| t.board_id == board_id)
            .collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(tasks)
    }
}

impl std::fmt::Debug for SledStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledStore")
            .field("db", &"sled::Db")
            .finish()
    }
}
