//! Characteristic access contract between the core and the application
//!
//! Each characteristic carries a reference to an [`AccessHandler`]; the
//! peripheral resolves the attribute handle of an incoming access event to
//! the logical index and invokes the handler with a typed call instead of
//! the stack's raw callback signature.

/// Errors surfaced on the read/write dispatch path.
///
/// These are per-event and non-fatal: the offending access is rejected and
/// subsequent events are served normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessError {
    /// The attribute handle does not resolve to a registered characteristic
    UnknownHandle,
    /// Payload or response does not fit the available buffer
    InsufficientResources,
    /// The application handler refused the access
    Rejected,
}

/// Marker error for an outbound buffer that ran out of capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferFull;

/// Per-characteristic application handler.
///
/// `index` is the logical index the characteristic was registered under,
/// so one handler may serve several characteristics. Handlers run on the
/// link-layer event loop and must not block.
pub trait AccessHandler {
    /// Fill `buf` with the characteristic value and return the number of
    /// bytes written.
    fn on_read(&self, index: usize, buf: &mut [u8]) -> Result<usize, AccessError>;

    /// Accept an incoming write of `data` to the characteristic.
    fn on_write(&self, index: usize, data: &[u8]) -> Result<(), AccessError>;
}

/// Append-only view of the stack's outgoing buffer.
///
/// Models the mbuf-style protocol of the underlying stack: bytes are
/// appended until the destination refuses, which the dispatcher reports as
/// [`AccessError::InsufficientResources`].
pub trait OutboundBuffer {
    fn append(&mut self, data: &[u8]) -> Result<(), BufferFull>;
}

impl<const N: usize> OutboundBuffer for heapless::Vec<u8, N> {
    fn append(&mut self, data: &[u8]) -> Result<(), BufferFull> {
        self.extend_from_slice(data).map_err(|_| BufferFull)
    }
}
