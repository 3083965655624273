//! The `transport` module is responsible for the realtime WebSocket gateway.
//!
//! It admits upgrade requests (`upgrade`), keeps admitted connections alive
//! and tears them down on failure (`session`), and runs the accept loop that
//! ties both to the hub (`websocket`).

pub mod session;
pub mod upgrade;
pub mod websocket;

pub use session::{ConnectionSession, SessionConfig};
pub use upgrade::{Admission, UpgradeAuthorizer, WS_PATH};
pub use websocket::{Gateway, serve};
