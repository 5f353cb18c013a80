//! Outbound delivery abstraction.

use uuid::Uuid;

use crate::events::ServerEvent;

/// Identifies one live client connection.
///
/// Connections are transient: a fighter that reconnects shows up under a
/// new id and the fight record is rebound to it. The fighter's own id is
/// issued externally and outlives any connection.
pub type ConnectionId = Uuid;

/// Point-to-point delivery of server events to client connections.
///
/// Implementations are fire-and-forget: a send to a connection that is
/// gone or failing is logged at the transport boundary and must not
/// affect fight state. Group delivery to a whole fight is derived by the
/// engine from the connection handles stored on the record.
pub trait Transport: Send + Sync + 'static {
    fn send(&self, conn: ConnectionId, event: ServerEvent);
}
