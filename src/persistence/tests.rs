use super::*;
use crate::utils::error::StoreError;
use chrono::{Duration, Utc};
use tempfile::{TempDir, tempdir};
use uuid::Uuid;

fn open_store() -> (SledStore, TempDir) {
    let tmp = tempdir().unwrap();
    let store = SledStore::open(tmp.path().to_str().unwrap()).unwrap();
    (store, tmp)
}

fn user(email: &str) -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        password_hash: "hash".to_string(),
        created_at: now,
        updated_at: now,
    }
}

#[test]
fn test_user_create_and_lookup() {
    let (store, _tmp) = open_store();
    let alice = user("alice@example.com");
    store.create_user(&alice).unwrap();

    let found = store.get_user_by_email("alice@example.com").unwrap();
    assert_eq!(found, alice);
    assert!(matches!(
        store.get_user_by_email("bob@example.com"),
        Err(StoreError::NotFound)
    ));
}

#[test]
fn test_duplicate_email_conflicts() {
    let (store, _tmp) = open_store();
    store.create_user(&user("dup@example.com")).unwrap();

    let err = store.create_user(&user("dup@example.com")).unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
}

#[test]
fn test_concurrent_registrations_claim_email_once() {
    let (store, _tmp) = open_store();
    let store = std::sync::Arc::new(store);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            std::thread::spawn(move || {
                let candidate = user("race@example.com");
                store.create_user(&candidate).map(|()| candidate.id)
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    assert!(
        results
            .iter()
            .filter(|r| r.is_err())
            .all(|r| matches!(r, Err(StoreError::Conflict(_))))
    );
    assert_eq!(
        store.get_user_by_email("race@example.com").unwrap().id,
        *winners[0]
    );
}

#[test]
fn test_board_crud() {
    let (store, _tmp) = open_store();
    let owner = Uuid::new_v4();
    let mut board = Board::new(owner, "Sprint".to_string(), String::new());
    store.create_board(&board).unwrap();

    assert_eq!(store.get_board(board.id).unwrap(), board);

    board.title = "Sprint 2".to_string();
    store.update_board(&board).unwrap();
    assert_eq!(store.get_board(board.id).unwrap().title, "Sprint 2");

    store.delete_board(board.id).unwrap();
    assert!(matches!(store.get_board(board.id), Err(StoreError::NotFound)));
    assert!(matches!(store.delete_board(board.id), Err(StoreError::NotFound)));
}

#[test]
fn test_update_missing_board_is_not_found() {
    let (store, _tmp) = open_store();
    let board = Board::new(Uuid::new_v4(), "Ghost".to_string(), String::new());
    assert!(matches!(store.update_board(&board), Err(StoreError::NotFound)));
}

#[test]
fn test_boards_listed_newest_first_per_owner() {
    let (store, _tmp) = open_store();
    let owner = Uuid::new_v4();

    let mut older = Board::new(owner, "older".to_string(), String::new());
    older.created_at = Utc::now() - Duration::minutes(5);
    let newer = Board::new(owner, "newer".to_string(), String::new());
    let foreign = Board::new(Uuid::new_v4(), "foreign".to_string(), String::new());

    store.create_board(&older).unwrap();
    store.create_board(&newer).unwrap();
    store.create_board(&foreign).unwrap();

    let titles: Vec<String> = store
        .list_boards_by_owner(owner)
        .unwrap()
        .into_iter()
        .map(|b| b.title)
        .collect();
    assert_eq!(titles, vec!["newer", "older"]);
}

#[test]
fn test_tasks_by_board_and_cascade_delete() {
    let (store, _tmp) = open_store();
    let board = Board::new(Uuid::new_v4(), "b".to_string(), String::new());
    let other = Board::new(Uuid::new_v4(), "other".to_string(), String::new());
    store.create_board(&board).unwrap();
    store.create_board(&other).unwrap();

    let mut first = Task::new(board.id, "first".to_string(), String::new(), TaskStatus::Todo);
    first.created_at = Utc::now() - Duration::minutes(1);
    let second = Task::new(board.id, "second".to_string(), String::new(), TaskStatus::Done);
    let elsewhere = Task::new(other.id, "elsewhere".to_string(), String::new(), TaskStatus::Todo);
    for task in [&second, &first, &elsewhere] {
        store.create_task(task).unwrap();
    }

    let titles: Vec<String> = store
        .list_tasks_by_board(board.id)
        .unwrap()
        .into_iter()
        .map(|t| t.title)
        .collect();
    assert_eq!(titles, vec!["first", "second"]);

    store.delete_board(board.id).unwrap();
    assert!(store.list_tasks_by_board(board.id).unwrap().is_empty());
    assert!(matches!(store.get_task(first.id), Err(StoreError::NotFound)));
    assert_eq!(store.get_task(elsewhere.id).unwrap(), elsewhere);
}

#[test]
fn test_task_update_and_delete() {
    let (store, _tmp) = open_store();
    let mut task = Task::new(Uuid::new_v4(), "t".to_string(), String::new(), TaskStatus::Todo);
    store.create_task(&task).unwrap();

    task.status = TaskStatus::InProgress;
    store.update_task(&task).unwrap();
    assert_eq!(store.get_task(task.id).unwrap().status, TaskStatus::InProgress);

    store.delete_task(task.id).unwrap();
    assert!(matches!(store.delete_task(task.id), Err(StoreError::NotFound)));
}

#[test]
fn test_status_normalization() {
    assert_eq!(TaskStatus::normalize(""), Some(TaskStatus::Todo));
    assert_eq!(TaskStatus::normalize(" TODO "), Some(TaskStatus::Todo));
    assert_eq!(TaskStatus::normalize("in_progress"), Some(TaskStatus::InProgress));
    assert_eq!(TaskStatus::normalize("InProgress"), Some(TaskStatus::InProgress));
    assert_eq!(TaskStatus::normalize("done"), Some(TaskStatus::Done));
    assert_eq!(TaskStatus::normalize("blocked"), None);

    assert_eq!(
        serde_json::to_string(&TaskStatus::InProgress).unwrap(),
        "\"in-progress\""
    );
}
