//! Realtime gateway.
//!
//! Accepts TCP connections and performs the WebSocket handshake. The rate
//! limit and the `UpgradeAuthorizer` run inside the handshake callback, so a
//! refused request is answered with a plain HTTP status. An admitted
//! connection gets a `Client`, is registered with the hub and is handed to a
//! `ConnectionSession`.
//!
//! Inbound frames and messages larger than `max_message_bytes` fail the read
//! and end the session.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio_tungstenite::accept_hdr_async_with_config;
use tracing::{debug, info, warn};
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::protocol::WebSocketConfig;

use crate::client::Client;
use crate::hub::{Connection, Hub};
use crate::limiter::RateLimiter;
use crate::transport::session::{ConnectionSession, SessionConfig};
use crate::transport::upgrade::{Admission, UpgradeAuthorizer};
use crate::utils::error::UpgradeError;
use crate::utils::net::client_ip;

/// Everything a gateway connection needs, shared by all of them.
#[derive(Debug, Clone)]
pub struct Gateway {
    pub hub: Arc<Hub>,
    pub limiter: Arc<RateLimiter>,
    pub authorizer: Arc<UpgradeAuthorizer>,
    pub session: SessionConfig,
    pub outbound_buffer: usize,
    pub max_message_bytes: usize,
}

impl Gateway {
    /// Rate limit by client IP, then authorize.
    pub fn admit(&self, request: &Request, peer: SocketAddr) -> Result<Admission, UpgradeError> {
        let ip = client_ip(request.headers(), Some(peer));
        if !self.limiter.allow(&ip) {
            return Err(UpgradeError::RateLimited);
        }
        self.authorizer.authorize(request)
    }

    fn websocket_config(&self) -> WebSocketConfig {
        WebSocketConfig::default()
            .max_message_size(Some(self.max_message_bytes))
            .max_frame_size(Some(self.max_message_bytes))
    }
}

/// Accepts connections from `listener` until `shutdown` resolves or accepting
/// fails. Sessions already running are left to end on their own.
pub async fn serve<F>(listener: TcpListener, gateway: Gateway, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    loop {
        let (stream, peer) = tokio::select! {
            _ = &mut shutdown => {
                info!("realtime gateway stopped accepting connections");
                return Ok(());
            }
            accepted = listener.accept() => accepted?,
        };
        let gateway = gateway.clone();
        tokio::spawn(async move {
            handle_connection(stream, peer, gateway).await;
        });
    }
}

pub async fn handle_connection<S>(stream: S, peer: SocketAddr, gateway: Gateway)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let config = gateway.websocket_config();
    let mut admission = None;
    let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        match gateway.admit(request, peer) {
            Ok(admitted) => {
                admission = Some(admitted);
                Ok(response)
            }
            Err(err) => {
                debug!(%peer, error = %err, "upgrade refused");
                Err(refusal(&err))
            }
        }
    };

    let mut ws = match accept_hdr_async_with_config(stream, callback, Some(config)).await {
        Ok(ws) => ws,
        Err(err) => {
            debug!(%peer, error = %err, "websocket handshake failed");
            return;
        }
    };

    let Some(Admission { board_id, caller }) = admission else {
        warn!(%peer, "handshake completed without admission; closing");
        let _ = ws.close(None).await;
        return;
    };

    let (client, outbound) = Client::new(gateway.outbound_buffer);
    let client = Arc::new(client);
    gateway.hub.register(board_id, client.clone());
    info!(%board_id, user_id = %caller, conn_id = %client.id(), %peer, "realtime session opened");

    ConnectionSession::new(board_id, client, gateway.hub.clone(), gateway.session)
        .run(ws, outbound)
        .await;
}

fn refusal(err: &UpgradeError) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(err.to_string()));
    *response.status_mut() = err.status();
    response
}
