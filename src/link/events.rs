//! Inbound link-layer events and connection state

use crate::gatt::AttrHandle;

/// Runtime handle of the (single) peer connection.
pub type ConnHandle = u16;

/// Events delivered by the link-layer event loop.
///
/// These are the only inputs that drive the connection state machine; the
/// stack owns advertising timeouts and connection supervision and reports
/// their outcomes here as completed events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// A connection attempt finished; `status` 0 means established.
    Connect { status: u8, conn: ConnHandle },
    /// The peer connection terminated.
    Disconnect { reason: u8 },
    /// Advertising ended without a connection (timeout or duration expiry).
    AdvComplete,
    /// The peer subscribed to or unsubscribed from notifications on an
    /// attribute.
    Subscribe { attr: AttrHandle, notify: bool },
    /// The per-connection MTU was negotiated.
    MtuUpdate { conn: ConnHandle, mtu: u16 },
}

/// Connection/advertising state of the peripheral.
///
/// There is no terminal state: after every disconnect or completed
/// advertisement the peripheral re-advertises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// Startup state, before advertising begins
    Idle,
    /// Advertising, waiting for a peer
    Advertising,
    /// A single peer is connected
    Connected,
}
