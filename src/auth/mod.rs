//! Credentials: HS256 JWT issuance and verification, and bcrypt password
//! hashing.
//!
//! The realtime gateway and the HTTP API only depend on the `Authenticator`
//! trait; `JwtAuthenticator` is the implementation wired in by the service.

pub mod jwt;
pub mod password;


pub use jwt::{Authenticator, Claims, JwtAuthenticator, bearer_token};
pub use password::{hash_password, verify_password};
