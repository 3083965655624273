//! Client address helpers shared by the HTTP API and the realtime gateway.

use std::net::SocketAddr;

use tungstenite::http::HeaderMap;

/// Resolve the client IP used as the rate-limit key.
///
/// The first hop of `X-Forwarded-For` wins when present, otherwise the peer
/// address of the TCP connection. Falls back to `"unknown"` so that all
/// unidentifiable callers share one bucket.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(first) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return first.to_string();
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
