use tokio::sync::{mpsc, watch};
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

use crate::hub::{Connection, ConnectionId};
use crate::utils::error::SendError;

/// Represents a connected WebSocket subscriber.
///
/// Sends never block. A full queue counts as a failed write so a stalled
/// subscriber is dropped instead of holding up the broadcaster.
#[derive(Debug)]
pub struct Client {
    id: ConnectionId,
    sender: mpsc::Sender<WsMessage>,
    closed: watch::Sender<bool>,
}

/// Receiving half of a `Client`, owned by the connection's writer task.
#[derive(Debug)]
pub struct Outbound {
    pub messages: mpsc::Receiver<WsMessage>,
    pub closed: watch::Receiver<bool>,
}

impl Client {
    /// Creates a client whose queue holds at most `buffer` pending messages.
    pub fn new(buffer: usize) -> (Self, Outbound) {
        let (sender, messages) = mpsc::channel(buffer.max(1));
        let (closed_tx, closed) = watch::channel(false);
        let client = Self {
            id: Uuid::new_v4(),
            sender,
            closed: closed_tx,
        };
        (client, Outbound { messages, closed })
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// A receiver that flips to `true` once the client is closed.
    pub fn closed_signal(&self) -> watch::Receiver<bool> {
        self.closed.subscribe()
    }
}

impl Connection for Client {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, message: WsMessage) -> Result<(), SendError> {
        if self.is_closed() {
            return Err(SendError::Closed);
        }
        self.sender.try_send(message).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => SendError::Full,
            mpsc::error::TrySendError::Closed(_) => SendError::Closed,
        })
    }

    fn close(&self) {
        self.closed.send_replace(true);
    }
}

/// Resolves once the watched client is closed, or once its `Client` is gone.
pub async fn wait_closed(signal: &mut watch::Receiver<bool>) {
    while !*signal.borrow_and_update() {
        if signal.changed().await.is_err() {
            return;
        }
    }
}
