//! The `hub` module holds the in-memory fan-out registry for task updates.
//!
//! A `Hub` maps each board to the set of live connections subscribed to it.
//! Task mutations call `Hub::broadcast`, which encodes the event once and
//! delivers it to every subscriber of the board, pruning any connection whose
//! write fails.

pub mod connection;
pub mod event;
pub mod registry;
pub mod subscribers;


pub use connection::{Connection, ConnectionId};
pub use event::{EventKind, TaskChangeEvent};
pub use registry::Hub;
pub use subscribers::SubscriberSet;
