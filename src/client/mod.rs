//! The `client` module defines the hub-facing side of a gateway connection.
//!
//! A `Client` is what the hub stores and writes to. It never touches the
//! socket itself: messages go into a bounded queue drained by the connection's
//! writer task, which receives the other half, `Outbound`.

pub mod ws_client;
pub use ws_client::{Client, Outbound, wait_closed};
