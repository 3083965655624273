//! The `utils` module provides shared building blocks used across `taskhub`:
//! the error taxonomy, tracing initialisation and client address helpers.

pub mod error;
pub mod logging;
pub mod net;
