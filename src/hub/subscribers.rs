use std::collections::HashMap;
use std::sync::Arc;

use super::connection::{Connection, ConnectionId};

/// The connections subscribed to one board, keyed by connection id.
#[derive(Debug, Default)]
pub struct SubscriberSet {
    members: HashMap<ConnectionId, Arc<dyn Connection>>,
}

impl SubscriberSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `conn`. Re-adding the same connection has no effect.
    pub fn insert(&mut self, conn: Arc<dyn Connection>) {
        self.members.entry(conn.id()).or_insert(conn);
    }

    pub fn remove(&mut self, id: &ConnectionId) -> Option<Arc<dyn Connection>> {
        self.members.remove(id)
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.members.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Copies the current members so they can be written to without holding
    /// the registry lock.
    pub fn snapshot(&self) -> Vec<Arc<dyn Connection>> {
        self.members.values().cloned().collect()
    }
}
