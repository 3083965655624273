//! The `error` module defines the error types used across `taskhub`.
//!
//! Errors are grouped by the layer that raises them. Failures on a single
//! live connection never leave this crate as errors: the broadcast path and the
//! connection session recover from them locally by pruning that connection.

use tungstenite::http::StatusCode;

/// Failures raised by the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Sled(#[from] sled::Error),

    #[error("record encoding error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Failures raised while issuing or verifying credentials.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("token expired")]
    Expired,

    #[error("invalid token: {0}")]
    InvalidToken(jsonwebtoken::errors::Error),

    #[error("invalid token claims")]
    InvalidClaims,

    #[error("cannot sign token: {0}")]
    Signing(jsonwebtoken::errors::Error),

    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
            jsonwebtoken::errors::ErrorKind::MissingRequiredClaim(_) => AuthError::InvalidClaims,
            _ => AuthError::InvalidToken(err),
        }
    }
}

/// A write to one subscriber failed. The hub prunes the subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("connection closed")]
    Closed,

    #[error("outbound queue full")]
    Full,
}

/// Reasons an upgrade request is refused before a connection is admitted.
#[derive(Debug, thiserror::Error)]
pub enum UpgradeError {
    #[error("unknown path")]
    NotFound,

    #[error("origin not allowed")]
    OriginRejected,

    #[error("too many websocket connection attempts")]
    RateLimited,

    #[error("unauthorized: {0}")]
    Unauthorized(#[from] AuthError),

    #[error("invalid board id")]
    InvalidBoardId,

    #[error("board not found")]
    BoardNotFound,

    #[error("forbidden")]
    Forbidden,

    #[error("store unavailable: {0}")]
    Store(StoreError),
}

impl UpgradeError {
    /// HTTP status sent back on the refused handshake.
    pub fn status(&self) -> StatusCode {
        match self {
            UpgradeError::NotFound | UpgradeError::BoardNotFound => StatusCode::NOT_FOUND,
            UpgradeError::OriginRejected | UpgradeError::Forbidden => StatusCode::FORBIDDEN,
            UpgradeError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            UpgradeError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            UpgradeError::InvalidBoardId => StatusCode::BAD_REQUEST,
            UpgradeError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for UpgradeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => UpgradeError::BoardNotFound,
            other => UpgradeError::Store(other),
        }
    }
}

/// Startup failures. These are the only errors that end the process.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
