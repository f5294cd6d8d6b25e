//! GATT attribute table construction and handle bookkeeping
//!
//! The attribute table is built once at startup: services open
//! characteristic runs, characteristics append into the open run, and
//! [`table::TableBuilder::finalize`] freezes the layout and registers it
//! with the stack. Everything here is fixed-capacity; the limits live in
//! [`crate::config::gatt`].

pub mod access;
pub mod registry;
pub mod table;

pub use access::{AccessError, AccessHandler, OutboundBuffer};
pub use registry::HandleRegistry;
pub use table::{AttributeTable, CharFlags, CharacteristicDef, ServiceDef, TableBuilder, TableSchema};

use crate::link::traits::StackError;

/// Runtime attribute handle, assigned by the stack during registration.
///
/// Distinct from the logical characteristic index the application uses;
/// [`HandleRegistry`] maps between the two.
pub type AttrHandle = u16;

/// Errors from table construction and peripheral operations.
///
/// Builder-time errors are fatal to startup: no partial table is usable
/// after one is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GattError {
    /// Service or characteristic count would exceed the configured maximum
    CapacityExceeded,
    /// Characteristic registered before any service was opened
    NoOpenService,
    /// Logical index outside the characteristic table
    IndexOutOfRange,
    /// Logical index already bound to another characteristic
    IndexInUse,
    /// The stack rejected the finalised table
    RegistrationFailure,
    /// Advertising payload exceeds the legacy PDU limit
    AdvDataTooLong,
    /// Notification payload exceeds the configured maximum
    PayloadTooLong,
    /// Error reported by the underlying stack
    Stack(StackError),
}
