use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, warn};
use tungstenite::protocol::Message as WsMessage;

use super::connection::{Connection, ConnectionId};
use super::event::TaskChangeEvent;
use super::subscribers::SubscriberSet;
use crate::persistence::BoardId;

#[derive(Debug, Default)]
struct Registry {
    boards: HashMap<BoardId, SubscriberSet>,
    // A connection belongs to at most one board.
    membership: HashMap<ConnectionId, BoardId>,
}

impl Registry {
    fn remove(&mut self, board_id: BoardId, conn_id: &ConnectionId) -> bool {
        let Some(set) = self.boards.get_mut(&board_id) else {
            return false;
        };
        let removed = set.remove(conn_id).is_some();
        if set.is_empty() {
            self.boards.remove(&board_id);
        }
        if removed && self.membership.get(conn_id) == Some(&board_id) {
            self.membership.remove(conn_id);
        }
        removed
    }
}

/// Maps boards to their live subscribers and fans task events out to them.
///
/// One lock guards every subscriber set. It is held only to read or change
/// membership, never while writing to a connection.
#[derive(Debug, Default)]
pub struct Hub {
    registry: Mutex<Registry>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribes `conn` to `board_id`. A connection registered under another
    /// board is moved.
    pub fn register(&self, board_id: BoardId, conn: Arc<dyn Connection>) {
        let conn_id = conn.id();
        let mut registry = self.lock();

        if let Some(previous) = registry
            .membership
            .insert(conn_id, board_id)
            .filter(|previous| *previous != board_id)
        {
            registry.remove(previous, &conn_id);
        }
        registry.boards.entry(board_id).or_default().insert(conn);

        debug!(%board_id, %conn_id, "connection registered");
    }

    /// Removes the connection from `board_id`. Absent connections are ignored.
    pub fn unregister(&self, board_id: BoardId, conn_id: ConnectionId) {
        if self.lock().remove(board_id, &conn_id) {
            debug!(%board_id, %conn_id, "connection unregistered");
        }
    }

    /// Sends `event` to every subscriber of `board_id` and returns how many
    /// subscribers it reached.
    ///
    /// Subscribers whose send fails are unregistered and closed. Delivery to
    /// the remaining subscribers continues.
    pub fn broadcast(&self, board_id: BoardId, event: &TaskChangeEvent) -> usize {
        let text = match event.encode() {
            Ok(text) => text,
            Err(err) => {
                error!(%board_id, task_id = %event.task_id, error = %err, "cannot encode task event");
                return 0;
            }
        };

        self.broadcast_message(board_id, WsMessage::text(text))
    }

    /// Fan-out of an already encoded message.
    pub fn broadcast_message(&self, board_id: BoardId, message: WsMessage) -> usize {
        let subscribers = match self.lock().boards.get(&board_id) {
            Some(set) => set.snapshot(),
            None => return 0,
        };

        let mut delivered = 0;
        for conn in subscribers {
            match conn.send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(err) => {
                    warn!(%board_id, conn_id = %conn.id(), error = %err, "dropping subscriber after failed send");
                    self.unregister(board_id, conn.id());
                    conn.close();
                }
            }
        }
        delivered
    }

    /// Unregisters and closes every subscriber of `board_id`. Returns how many
    /// were closed.
    pub fn close_board(&self, board_id: BoardId) -> usize {
        let subscribers = {
            let mut registry = self.lock();
            let Some(set) = registry.boards.remove(&board_id) else {
                return 0;
            };
            let subscribers = set.snapshot();
            for conn in &subscribers {
                let conn_id = conn.id();
                if registry.membership.get(&conn_id) == Some(&board_id) {
                    registry.membership.remove(&conn_id);
                }
            }
            subscribers
        };

        for conn in &subscribers {
            conn.close();
        }
        debug!(%board_id, closed = subscribers.len(), "board subscribers closed");
        subscribers.len()
    }

    pub fn subscriber_count(&self, board_id: BoardId) -> usize {
        self.lock().boards.get(&board_id).map_or(0, SubscriberSet::len)
    }

    /// Number of boards with at least one subscriber.
    pub fn board_count(&self) -> usize {
        self.lock().boards.len()
    }

    pub fn is_registered(&self, conn_id: ConnectionId) -> bool {
        self.lock().membership.contains_key(&conn_id)
    }
}
