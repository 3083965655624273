//! Liveness management for one admitted connection.
//!
//! A session runs two loops over one socket. The read loop drains inbound
//! frames under a read deadline that only a Pong extends. The keep-alive loop
//! owns the write half: it forwards queued broadcasts and sends a Ping every
//! `ping_interval`, bounding each write by `write_timeout`. Whichever loop
//! stops first tears the session down; teardown runs once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::{Instant, interval_at, timeout, timeout_at};
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info};
use tungstenite::protocol::Message as WsMessage;

use crate::client::{Client, Outbound, wait_closed};
use crate::config::RealtimeSettings;
use crate::hub::{Connection, Hub};
use crate::persistence::BoardId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub ping_interval: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            read_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&RealtimeSettings> for SessionConfig {
    fn from(settings: &RealtimeSettings) -> Self {
        Self {
            ping_interval: settings.ping_interval(),
            read_timeout: settings.read_timeout(),
            write_timeout: settings.write_timeout(),
        }
    }
}

#[derive(Debug)]
pub struct ConnectionSession {
    board_id: BoardId,
    client: Arc<Client>,
    hub: Arc<Hub>,
    config: SessionConfig,
    read_deadline: Mutex<Instant>,
    torn_down: AtomicBool,
}

impl ConnectionSession {
    pub fn new(
        board_id: BoardId,
        client: Arc<Client>,
        hub: Arc<Hub>,
        config: SessionConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            board_id,
            client,
            hub,
            read_deadline: Mutex::new(Instant::now() + config.read_timeout),
            config,
            torn_down: AtomicBool::new(false),
        })
    }

    pub fn read_deadline(&self) -> Instant {
        *self
            .read_deadline
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Pushes the read deadline to `read_timeout` from now.
    pub fn extend_read_deadline(&self) {
        *self
            .read_deadline
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now() + self.config.read_timeout;
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    /// Unregisters from the hub and closes the client. Only the first call
    /// has an effect.
    pub fn teardown(&self, reason: &str) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.hub.unregister(self.board_id, self.client.id());
        self.client.close();
        info!(
            board_id = %self.board_id,
            conn_id = %self.client.id(),
            reason,
            "realtime session closed"
        );
    }

    /// Drives the connection until either loop stops.
    pub async fn run<S>(self: Arc<Self>, ws: WebSocketStream<S>, outbound: Outbound)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (sink, stream) = ws.split();
        let writer = tokio::spawn(self.clone().keep_alive(sink, outbound));

        let reason = self.read_loop(stream).await;
        self.teardown(reason);

        if let Err(err) = writer.await {
            debug!(error = %err, "keep-alive task ended abnormally");
        }
    }

    async fn read_loop<St>(&self, mut stream: St) -> &'static str
    where
        St: Stream<Item = Result<WsMessage, tungstenite::Error>> + Unpin,
    {
        let mut closed = self.client.closed_signal();
        loop {
            let deadline = self.read_deadline();
            tokio::select! {
                _ = wait_closed(&mut closed) => return "client closed",
                frame = timeout_at(deadline, stream.next()) => match frame {
                    Err(_) => return "read deadline exceeded",
                    Ok(None) => return "peer disconnected",
                    Ok(Some(Err(err))) => {
                        debug!(conn_id = %self.client.id(), error = %err, "read failed");
                        return "read error";
                    }
                    Ok(Some(Ok(WsMessage::Pong(_)))) => self.extend_read_deadline(),
                    Ok(Some(Ok(WsMessage::Close(_)))) => return "peer closed",
                    // Inbound payloads carry no protocol and are discarded.
                    Ok(Some(Ok(_))) => {}
                },
            }
        }
    }

    async fn keep_alive<Si>(self: Arc<Self>, mut sink: Si, mut outbound: Outbound)
    where
        Si: Sink<WsMessage, Error = tungstenite::Error> + Unpin,
    {
        let interval = self.config.ping_interval;
        let mut ticker = interval_at(Instant::now() + interval, interval);

        let reason = loop {
            tokio::select! {
                _ = wait_closed(&mut outbound.closed) => break "client closed",
                _ = ticker.tick() => {
                    if let Err(reason) = self.write(&mut sink, WsMessage::Ping(Default::default())).await {
                        break reason;
                    }
                }
                queued = outbound.messages.recv() => match queued {
                    Some(message) => {
                        if let Err(reason) = self.write(&mut sink, message).await {
                            break reason;
                        }
                    }
                    None => break "outbound queue closed",
                },
            }
        };

        self.teardown(reason);
        let _ = timeout(self.config.write_timeout, sink.close()).await;
    }

    async fn write<Si>(&self, sink: &mut Si, message: WsMessage) -> Result<(), &'static str>
    where
        Si: Sink<WsMessage, Error = tungstenite::Error> + Unpin,
    {
        match timeout(self.config.write_timeout, sink.send(message)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => {
                debug!(conn_id = %self.client.id(), error = %err, "write failed");
                Err("write error")
            }
            Err(_) => Err("write deadline exceeded"),
        }
    }
}
