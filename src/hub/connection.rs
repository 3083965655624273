use std::fmt::Debug;

use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

use crate::utils::error::SendError;

pub type ConnectionId = Uuid;

/// A live subscriber as seen by the hub.
///
/// `send` must not block: the hub calls it outside its lock but inline in the
/// broadcasting task. `close` may be called more than once.
pub trait Connection: Send + Sync + Debug {
    fn id(&self) -> ConnectionId;

    fn send(&self, message: WsMessage) -> Result<(), SendError>;

    fn close(&self);
}
