//! Link-layer stack trait for abstraction and testability
//!
//! This trait defines the outbound calls the core makes into the radio
//! stack, allowing the real binding to be swapped with a mock for
//! testing. Methods take `&self`: the underlying stack bindings are
//! callable from any context and none of these calls suspends.

use heapless::Vec;

use crate::config::gatt::MAX_CHARACTERISTICS;
use crate::gatt::{AttrHandle, TableSchema};

use super::events::ConnHandle;

/// Errors reported by the underlying stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackError {
    /// The stack rejected the request
    Failure,
    /// An outgoing buffer could not take the payload
    BufferFull,
    /// The stack has not finished synchronising
    NotReady,
}

/// Handles assigned by the stack during table registration, one per
/// characteristic in registration order.
pub type AssignedHandles = Vec<AttrHandle, MAX_CHARACTERISTICS>;

/// Abstract link-layer stack interface.
///
/// The real implementation wraps the radio stack's C bindings; tests use
/// [`mock::MockStack`].
pub trait LinkStack {
    /// Set the GAP device name used in scan responses.
    fn set_device_name(&self, name: &str) -> Result<(), StackError>;

    /// Register the finalised attribute table.
    ///
    /// The stack assigns runtime handles synchronously and returns them
    /// in registration order.
    fn register_table(&self, schema: &TableSchema) -> Result<AssignedHandles, StackError>;

    /// Ensure the controller has a usable address and infer the address
    /// type to advertise with. Must succeed before advertising starts.
    fn resolve_address(&self) -> Result<(), StackError>;

    /// Start connectable, general-discoverable advertising with the
    /// given payload, with no duration limit.
    fn start_advertising(&self, adv_data: &[u8]) -> Result<(), StackError>;

    /// Send a notification for `attr` to the peer on `conn`.
    fn send_notification(
        &self,
        conn: ConnHandle,
        attr: AttrHandle,
        payload: &[u8],
    ) -> Result<(), StackError>;
}

#[cfg(test)]
pub mod mock {
    //! Mock link-layer stack for testing
    //!
    //! State lives behind `std::sync::Mutex` so the mock is `Sync`, like
    //! the real stack bindings it stands in for.

    use super::*;
    use std::sync::Mutex;

    use crate::config::adv::MAX_ADV_DATA;
    use crate::config::gatt::ACCESS_BUF_SIZE;

    /// First handle the mock assigns
    pub const HANDLE_BASE: AttrHandle = 100;
    /// Spacing between assigned value handles
    pub const HANDLE_STEP: AttrHandle = 3;

    /// A notification captured by the mock
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct SentNotification {
        pub conn: ConnHandle,
        pub attr: AttrHandle,
        pub payload: Vec<u8, ACCESS_BUF_SIZE>,
    }

    /// Mock stack recording every outbound call
    pub struct MockStack {
        /// (service uuid, characteristic uuid) per characteristic, in
        /// registration order
        layout: Mutex<Vec<(u16, u16), MAX_CHARACTERISTICS>>,
        address_resolves: Mutex<usize>,
        adv_starts: Mutex<usize>,
        last_adv_data: Mutex<Vec<u8, MAX_ADV_DATA>>,
        notifications: Mutex<Vec<SentNotification, 8>>,
        device_name: Mutex<Vec<u8, 32>>,
        next_register_error: Mutex<Option<StackError>>,
        next_resolve_error: Mutex<Option<StackError>>,
        next_notify_error: Mutex<Option<StackError>>,
    }

    impl MockStack {
        pub fn new() -> Self {
            Self {
                layout: Mutex::new(Vec::new()),
                address_resolves: Mutex::new(0),
                adv_starts: Mutex::new(0),
                last_adv_data: Mutex::new(Vec::new()),
                notifications: Mutex::new(Vec::new()),
                device_name: Mutex::new(Vec::new()),
                next_register_error: Mutex::new(None),
                next_resolve_error: Mutex::new(None),
                next_notify_error: Mutex::new(None),
            }
        }

        /// Handle the mock assigns to the i-th characteristic in
        /// registration order.
        pub fn handle_for(i: usize) -> AttrHandle {
            HANDLE_BASE + i as AttrHandle * HANDLE_STEP
        }

        /// Set an error to be returned by the next register_table() call
        pub fn set_next_register_error(&self, error: StackError) {
            *self.next_register_error.lock().unwrap() = Some(error);
        }

        /// Set an error to be returned by the next resolve_address() call
        pub fn set_next_resolve_error(&self, error: StackError) {
            *self.next_resolve_error.lock().unwrap() = Some(error);
        }

        /// Set an error to be returned by the next send_notification() call
        pub fn set_next_notify_error(&self, error: StackError) {
            *self.next_notify_error.lock().unwrap() = Some(error);
        }

        /// Registered (service uuid, characteristic uuid) pairs
        pub fn registered_layout(&self) -> Vec<(u16, u16), MAX_CHARACTERISTICS> {
            self.layout.lock().unwrap().clone()
        }

        /// Number of times the advertising address was resolved
        pub fn address_resolves(&self) -> usize {
            *self.address_resolves.lock().unwrap()
        }

        /// Number of times advertising was started
        pub fn adv_starts(&self) -> usize {
            *self.adv_starts.lock().unwrap()
        }

        /// Payload of the most recent advertising start
        pub fn last_adv_data(&self) -> Vec<u8, MAX_ADV_DATA> {
            self.last_adv_data.lock().unwrap().clone()
        }

        /// All notifications sent so far
        pub fn notifications(&self) -> Vec<SentNotification, 8> {
            self.notifications.lock().unwrap().clone()
        }

        /// Device name most recently set, as raw bytes
        pub fn device_name(&self) -> Vec<u8, 32> {
            self.device_name.lock().unwrap().clone()
        }
    }

    impl Default for MockStack {
        fn default() -> Self {
            Self::new()
        }
    }

    impl LinkStack for MockStack {
        fn set_device_name(&self, name: &str) -> Result<(), StackError> {
            let mut stored = self.device_name.lock().unwrap();
            stored.clear();
            stored
                .extend_from_slice(name.as_bytes())
                .map_err(|_| StackError::BufferFull)
        }

        fn register_table(&self, schema: &TableSchema) -> Result<AssignedHandles, StackError> {
            if let Some(error) = self.next_register_error.lock().unwrap().take() {
                return Err(error);
            }

            let mut layout = self.layout.lock().unwrap();
            layout.clear();
            for service in schema.services() {
                for chr in schema.characteristics_of(service) {
                    layout
                        .push((service.uuid(), chr.uuid()))
                        .map_err(|_| StackError::BufferFull)?;
                }
            }

            let mut handles = AssignedHandles::new();
            for i in 0..schema.characteristics().len() {
                handles
                    .push(Self::handle_for(i))
                    .map_err(|_| StackError::BufferFull)?;
            }
            Ok(handles)
        }

        fn resolve_address(&self) -> Result<(), StackError> {
            if let Some(error) = self.next_resolve_error.lock().unwrap().take() {
                return Err(error);
            }
            *self.address_resolves.lock().unwrap() += 1;
            Ok(())
        }

        fn start_advertising(&self, adv_data: &[u8]) -> Result<(), StackError> {
            *self.adv_starts.lock().unwrap() += 1;
            let mut stored = self.last_adv_data.lock().unwrap();
            stored.clear();
            stored
                .extend_from_slice(adv_data)
                .map_err(|_| StackError::BufferFull)
        }

        fn send_notification(
            &self,
            conn: ConnHandle,
            attr: AttrHandle,
            payload: &[u8],
        ) -> Result<(), StackError> {
            if let Some(error) = self.next_notify_error.lock().unwrap().take() {
                return Err(error);
            }

            let mut captured = Vec::new();
            captured
                .extend_from_slice(payload)
                .map_err(|_| StackError::BufferFull)?;
            self.notifications
                .lock()
                .unwrap()
                .push(SentNotification {
                    conn,
                    attr,
                    payload: captured,
                })
                .map_err(|_| StackError::BufferFull)?;
            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_mock_records_notifications() {
            let stack = MockStack::new();
            stack.send_notification(7, 100, &[0xAA]).unwrap();

            let sent = stack.notifications();
            assert_eq!(sent.len(), 1);
            assert_eq!(sent[0].conn, 7);
            assert_eq!(sent[0].attr, 100);
            assert_eq!(sent[0].payload.as_slice(), &[0xAA]);
        }

        #[test]
        fn test_mock_notify_error_cleared_after_use() {
            let stack = MockStack::new();
            stack.set_next_notify_error(StackError::Failure);

            assert_eq!(
                stack.send_notification(7, 100, &[0x01]),
                Err(StackError::Failure)
            );
            stack.send_notification(7, 100, &[0x02]).unwrap();
            assert_eq!(stack.notifications().len(), 1);
        }

        #[test]
        fn test_mock_counts_address_resolves() {
            let stack = MockStack::new();
            stack.resolve_address().unwrap();
            stack.resolve_address().unwrap();
            assert_eq!(stack.address_resolves(), 2);
        }
    }
}
