//! Handle-to-index mapping and per-characteristic subscription flags
//!
//! The stack assigns runtime attribute handles during registration; the
//! registry maps them back to the logical indices the application uses
//! and records which characteristics the connected peer has subscribed
//! to. Lookups are linear scans; with at most
//! [`MAX_CHARACTERISTICS`](crate::config::gatt::MAX_CHARACTERISTICS)
//! entries that is cheaper than anything fancier.

use crate::config::gatt::MAX_CHARACTERISTICS;

use super::{AttrHandle, GattError};

/// Bindings and subscription state for every registered characteristic,
/// indexed by logical characteristic index.
#[derive(Debug, Clone)]
pub struct HandleRegistry {
    handles: [Option<AttrHandle>; MAX_CHARACTERISTICS],
    subscribed: [bool; MAX_CHARACTERISTICS],
}

impl HandleRegistry {
    /// Create an empty registry: no bindings, nothing subscribed.
    pub fn new() -> Self {
        Self {
            handles: [None; MAX_CHARACTERISTICS],
            subscribed: [false; MAX_CHARACTERISTICS],
        }
    }

    /// Bind a logical index to its stack-assigned handle.
    ///
    /// Called once per characteristic during finalisation; rebinding an
    /// index is an error.
    pub fn bind(&mut self, index: usize, handle: AttrHandle) -> Result<(), GattError> {
        let slot = self
            .handles
            .get_mut(index)
            .ok_or(GattError::IndexOutOfRange)?;
        if slot.is_some() {
            return Err(GattError::IndexInUse);
        }
        *slot = Some(handle);
        Ok(())
    }

    /// Runtime handle bound to `index`, if any.
    pub fn handle_for(&self, index: usize) -> Option<AttrHandle> {
        self.handles.get(index).copied().flatten()
    }

    /// Resolve a runtime handle back to its logical index.
    ///
    /// Returns `None` for unbound handles; never yields an out-of-range
    /// index.
    pub fn lookup_index(&self, handle: AttrHandle) -> Option<usize> {
        self.handles
            .iter()
            .position(|slot| *slot == Some(handle))
    }

    /// Record whether the peer is subscribed to notifications on `index`.
    /// Out-of-range indices are ignored.
    pub fn set_subscribed(&mut self, index: usize, subscribed: bool) {
        if let Some(flag) = self.subscribed.get_mut(index) {
            *flag = subscribed;
        }
    }

    /// Whether the peer is subscribed to notifications on `index`.
    pub fn is_subscribed(&self, index: usize) -> bool {
        self.subscribed.get(index).copied().unwrap_or(false)
    }

    /// Drop all subscriptions. Called on disconnect: a reconnecting peer
    /// must resubscribe, per GATT semantics.
    pub fn clear_subscriptions(&mut self) {
        self.subscribed = [false; MAX_CHARACTERISTICS];
    }
}

impl Default for HandleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
