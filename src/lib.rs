//! # taskhub
//!
//! `taskhub` is a task-tracking backend with live board updates. Users register
//! and log in over a small REST API, manage boards and tasks, and subscribe to
//! a board over a WebSocket to receive every task change as it happens.
//!
//! ## Core Modules
//!
//! - `hub`: The in-memory registry of board subscribers and the broadcast path.
//! - `transport`: The realtime gateway: upgrade authorization, per-connection
//!   keep-alive sessions and the accept loop.
//! - `client`: The hub-facing handle of one live connection.
//! - `limiter`: Fixed-window per-IP rate limiting for logins and upgrades.
//! - `api`: The axum REST routes for accounts, boards and tasks.
//! - `auth`: JWT issuing and verification, password hashing.
//! - `persistence`: Users, boards and tasks stored in `sled`.
//! - `config`: Layered configuration from files and environment variables.
//! - `utils`: Error types, logging setup and client address helpers.
//! - `app`: Wires everything together and runs both listeners.

pub mod api;
pub mod app;
pub mod auth;
pub mod client;
pub mod config;
pub mod hub;
pub mod limiter;
pub mod persistence;
pub mod transport;
pub mod utils;
