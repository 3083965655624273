use super::{AppState, router};
use crate::auth::{Authenticator, JwtAuthenticator};
use crate::client::Client;
use crate::hub::{Hub, TaskChangeEvent};
use crate::limiter::RateLimiter;
use crate::persistence::{Board, BoardStore, SledStore, Task, TaskStatus, TaskStore, UserId};
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tempfile::{TempDir, tempdir};
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &[u8] = b"test-secret-32-bytes-long-1234567890";

struct TestApp {
    router: Router,
    state: AppState,
    store: Arc<SledStore>,
    _tmp: TempDir,
}

fn app(login_attempts: u32) -> TestApp {
    let tmp = tempdir().unwrap();
    let store = Arc::new(SledStore::open(tmp.path().to_str().unwrap()).unwrap());
    let state = AppState {
        users: store.clone(),
        boards: store.clone(),
        tasks: store.clone(),
        jwt: Arc::new(JwtAuthenticator::new(SECRET, Duration::from_secs(3600))),
        hub: Arc::new(Hub::new()),
        login_limiter: Arc::new(RateLimiter::new(login_attempts)),
        bcrypt_cost: 4,
    };
    TestApp {
        router: router(state.clone()),
        state,
        store,
        _tmp: tmp,
    }
}

impl TestApp {
    async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn token_for(&self, user_id: UserId) -> String {
        self.state.jwt.issue(user_id).unwrap()
    }

    fn board_of(&self, owner: UserId) -> Board {
        let board = Board::new(owner, "Board".to_string(), String::new());
        self.store.create_board(&board).unwrap();
        board
    }
}

#[tokio::test]
async fn test_register_then_login() {
    let app = app(10);
    let credentials = json!({ "email": "alice@example.com", "password": "secret" });

    let (status, body) = app.call("POST", "/register", None, Some(credentials.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["email"], "alice@example.com");

    let (status, _) = app.call("POST", "/register", None, Some(credentials.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app.call("POST", "/login", None, Some(credentials)).await;
    assert_eq!(status, StatusCode::OK);
    let user_id: UserId = body["user_id"].as_str().unwrap().parse().unwrap();
    let token = body["token"].as_str().unwrap();
    assert_eq!(app.state.jwt.verify(token).unwrap(), user_id);
}

#[tokio::test]
async fn test_register_validation() {
    let app = app(10);

    let (status, body) = app
        .call("POST", "/register", None, Some(json!({ "email": "nope", "password": "secret" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid email");

    let (status, _) = app
        .call("POST", "/register", None, Some(json!({ "email": "a@b.io", "password": "abc" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.call("POST", "/register", None, Some(json!("not an object"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid JSON body");
}

#[tokio::test]
async fn test_login_failures() {
    let app = app(10);
    app.call(
        "POST",
        "/register",
        None,
        Some(json!({ "email": "bob@example.com", "password": "right" })),
    )
    .await;

    for credentials in [
        json!({ "email": "bob@example.com", "password": "wrong" }),
        json!({ "email": "ghost@example.com", "password": "right" }),
    ] {
        let (status, body) = app.call("POST", "/login", None, Some(credentials)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid email or password");
    }

    let (status, body) = app
        .call("POST", "/login", None, Some(json!({ "email": "bob", "password": "right" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid email");

    let (status, _) = app
        .call("POST", "/login", None, Some(json!({ "email": "bob@example.com", "password": "abc" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_is_rate_limited() {
    let app = app(2);
    let credentials = json!({ "email": "carol@example.com", "password": "password" });

    for _ in 0..2 {
        let (status, _) = app.call("POST", "/login", None, Some(credentials.clone())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
    let (status, body) = app.call("POST", "/login", None, Some(credentials)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(body["error"].as_str().unwrap().starts_with("Too many login attempts"));
}

#[tokio::test]
async fn test_board_routes_require_token() {
    let app = app(10);
    let (status, _) = app.call("GET", "/boards", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.call("GET", "/boards", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_board_lifecycle() {
    let app = app(10);
    let owner = Uuid::new_v4();
    let token = app.token_for(owner);

    let (status, board) = app
        .call("POST", "/boards", Some(&token), Some(json!({ "title": "  Sprint  ", "description": "d" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(board["title"], "Sprint");
    let id = board["id"].as_str().unwrap().to_string();

    let (status, list) = app.call("GET", "/boards", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, updated) = app
        .call("PUT", &format!("/boards/{id}"), Some(&token), Some(json!({ "title": "Renamed" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "Renamed");

    let (client, outbound) = Client::new(8);
    let board_id: Uuid = id.parse().unwrap();
    app.state.hub.register(board_id, Arc::new(client));

    let (status, _) = app.call("DELETE", &format!("/boards/{id}"), Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(app.state.hub.subscriber_count(board_id), 0);
    assert!(*outbound.closed.borrow());

    let (status, _) = app.call("GET", &format!("/boards/{id}"), Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_board_validation_and_ownership() {
    let app = app(10);
    let owner = Uuid::new_v4();
    let board = app.board_of(owner);
    let stranger = app.token_for(Uuid::new_v4());
    let token = app.token_for(owner);

    let (status, _) = app
        .call("POST", "/boards", Some(&token), Some(json!({ "title": "   " })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let long = "x".repeat(501);
    let (status, _) = app
        .call("POST", "/boards", Some(&token), Some(json!({ "title": "ok", "description": long })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.call("GET", "/boards/not-a-uuid", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .call("GET", &format!("/boards/{}", board.id), Some(&stranger), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Forbidden");

    let (status, _) = app
        .call("DELETE", &format!("/boards/{}", board.id), Some(&stranger), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_task_mutations_are_broadcast() {
    let app = app(10);
    let owner = Uuid::new_v4();
    let board = app.board_of(owner);
    let token = app.token_for(owner);

    let (client, mut outbound) = Client::new(8);
    app.state.hub.register(board.id, Arc::new(client));

    let (status, task) = app
        .call(
            "POST",
            "/tasks",
            Some(&token),
            Some(json!({ "board_id": board.id, "title": "Write tests", "status": "in_progress" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(task["status"], "in-progress");
    let task_id = task["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .call("PUT", &format!("/tasks/{task_id}"), Some(&token), Some(json!({ "status": "done" })))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.call("DELETE", &format!("/tasks/{task_id}"), Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let mut events = Vec::new();
    while let Ok(message) = outbound.messages.try_recv() {
        let event: TaskChangeEvent = serde_json::from_str(message.to_text().unwrap()).unwrap();
        events.push((serde_json::to_value(event.event).unwrap(), event.status));
    }
    assert_eq!(
        events,
        vec![
            (json!("task_updated"), TaskStatus::InProgress),
            (json!("task_updated"), TaskStatus::Done),
            (json!("task_deleted"), TaskStatus::Done),
        ]
    );
}

#[tokio::test]
async fn test_task_listing_and_errors() {
    let app = app(10);
    let owner = Uuid::new_v4();
    let board = app.board_of(owner);
    let token = app.token_for(owner);
    let stranger = app.token_for(Uuid::new_v4());

    let task = Task::new(board.id, "existing".to_string(), String::new(), TaskStatus::Todo);
    app.store.create_task(&task).unwrap();

    let (status, list) = app
        .call("GET", &format!("/tasks?board_id={}", board.id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list[0]["title"], "existing");

    let (status, _) = app.call("GET", "/tasks", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(
            "POST",
            "/tasks",
            Some(&token),
            Some(json!({ "board_id": board.id, "title": "t", "status": "blocked" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(
            "POST",
            "/tasks",
            Some(&token),
            Some(json!({ "board_id": Uuid::new_v4(), "title": "t" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .call("GET", &format!("/tasks/{}", task.id), Some(&stranger), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .call("GET", &format!("/tasks/{}", Uuid::new_v4()), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
