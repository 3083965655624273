//! Admission checks for realtime upgrade requests.
//!
//! Everything here runs against the HTTP request of the WebSocket handshake,
//! before the protocol switch, so a refused request never becomes a live
//! socket and never touches the hub.

use std::sync::Arc;

use tracing::debug;
use tungstenite::handshake::server::Request;
use tungstenite::http::header::{AUTHORIZATION, ORIGIN};

use crate::auth::{Authenticator, bearer_token};
use crate::persistence::{BoardId, BoardStore, UserId};
use crate::utils::error::{AuthError, UpgradeError};

/// Path the gateway accepts upgrades on.
pub const WS_PATH: &str = "/ws";

/// A request that passed every check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub board_id: BoardId,
    pub caller: UserId,
}

pub struct UpgradeAuthorizer {
    allowed_origins: Vec<String>,
    authenticator: Arc<dyn Authenticator>,
    boards: Arc<dyn BoardStore>,
}

impl UpgradeAuthorizer {
    pub fn new(
        allowed_origins: Vec<String>,
        authenticator: Arc<dyn Authenticator>,
        boards: Arc<dyn BoardStore>,
    ) -> Self {
        Self {
            allowed_origins,
            authenticator,
            boards,
        }
    }

    /// An empty allow-list accepts any origin, including a missing one.
    pub fn check_origin(&self, origin: Option<&str>) -> bool {
        if self.allowed_origins.is_empty() {
            return true;
        }
        let origin = origin.unwrap_or_default();
        self.allowed_origins.iter().any(|allowed| allowed == origin)
    }

    /// Checks, in order: path, origin, caller identity, board id, board
    /// existence and ownership.
    pub fn authorize(&self, request: &Request) -> Result<Admission, UpgradeError> {
        if request.uri().path() != WS_PATH {
            return Err(UpgradeError::NotFound);
        }

        let origin = request
            .headers()
            .get(ORIGIN)
            .and_then(|value| value.to_str().ok());
        if !self.check_origin(origin) {
            debug!(origin = origin.unwrap_or("-"), "upgrade origin rejected");
            return Err(UpgradeError::OriginRejected);
        }

        let query = request.uri().query().unwrap_or_default();
        let token = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .or_else(|| query_param(query, "token"))
            .ok_or(AuthError::MissingToken)?;
        let caller = self.authenticator.verify(token)?;

        let board_id = query_param(query, "board_id")
            .and_then(|raw| BoardId::parse_str(raw).ok())
            .ok_or(UpgradeError::InvalidBoardId)?;

        let board = self.boards.get_board(board_id)?;
        if !board.is_owned_by(caller) {
            return Err(UpgradeError::Forbidden);
        }

        Ok(Admission { board_id, caller })
    }
}

impl std::fmt::Debug for UpgradeAuthorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpgradeAuthorizer")
            .field("allowed_origins", &self.allowed_origins)
            .finish_non_exhaustive()
    }
}

// Ids and tokens are URL-safe, so values are taken verbatim.
fn query_param<'a>(query: &'a str, name: &str) -> Option<&'a str> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}
