//! Connection state machine, access dispatch and notification emission
//!
//! [`Peripheral`] owns the finalised attribute table and the single
//! connection's state. The link-layer event loop feeds it raw events and
//! access callbacks; the application calls [`Peripheral::notify`] from
//! its own context. State shared between the two sides lives behind a
//! critical-section mutex, so neither side observes a half-updated
//! registry.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use heapless::Vec;
use log::{debug, info, warn};

use crate::config::adv::MAX_ADV_DATA;
use crate::config::gatt::{ACCESS_BUF_SIZE, MAX_ATTR_PAYLOAD, MAX_CHARACTERISTICS};
use crate::gatt::table::{AttributeTable, CharacteristicDef};
use crate::gatt::{AccessError, AttrHandle, GattError, HandleRegistry, OutboundBuffer};
use crate::link::events::{ConnHandle, ConnState, LinkEvent};
use crate::link::traits::LinkStack;

/// State reachable from both the event loop and application callers.
/// Everything here is `Send` so the whole peripheral is `Sync` and can
/// live in a `static` shared by both contexts.
struct Shared<'a> {
    state: ConnState,
    conn: Option<ConnHandle>,
    mtu: Option<u16>,
    registry: HandleRegistry,
    readvertise: Option<&'a (dyn Fn() + Sync)>,
}

/// Single-connection GATT peripheral built from a finalised
/// [`AttributeTable`].
pub struct Peripheral<'a, S: LinkStack> {
    stack: &'a S,
    chars: Vec<CharacteristicDef<'a>, MAX_CHARACTERISTICS>,
    shared: Mutex<CriticalSectionRawMutex, RefCell<Shared<'a>>>,
}

impl<'a, S: LinkStack> Peripheral<'a, S> {
    /// Take ownership of a finalised table. Handles are already bound at
    /// this point, so every event the stack delivers from here on can be
    /// resolved.
    pub fn new(stack: &'a S, table: AttributeTable<'a>) -> Self {
        let registry = table.registry;
        let chars = table.chars;
        Self {
            stack,
            chars,
            shared: Mutex::new(RefCell::new(Shared {
                state: ConnState::Idle,
                conn: None,
                mtu: None,
                registry,
                readvertise: None,
            })),
        }
    }

    /// Set the GAP device name used while advertising.
    pub fn set_device_name(&self, name: &str) -> Result<(), GattError> {
        self.stack.set_device_name(name).map_err(GattError::Stack)
    }

    /// Start advertising and store the re-advertise callback.
    ///
    /// The advertising address is resolved first; a stack that cannot
    /// produce one fails the call. The callback is invoked whenever the
    /// peripheral should resume advertising: after a disconnect, a
    /// failed connection attempt or a completed advertisement. It is
    /// called outside any internal lock.
    pub fn advertise(
        &self,
        adv_data: &[u8],
        readvertise: &'a (dyn Fn() + Sync),
    ) -> Result<(), GattError> {
        if adv_data.len() > MAX_ADV_DATA {
            return Err(GattError::AdvDataTooLong);
        }
        self.stack.resolve_address().map_err(GattError::Stack)?;
        self.stack
            .start_advertising(adv_data)
            .map_err(GattError::Stack)?;
        self.shared.lock(|cell| {
            let mut shared = cell.borrow_mut();
            shared.state = ConnState::Advertising;
            shared.readvertise = Some(readvertise);
        });
        info!("advertising started ({} bytes payload)", adv_data.len());
        Ok(())
    }

    /// Feed one inbound link-layer event into the state machine.
    ///
    /// Runs on the event-loop context. Malformed events (unknown
    /// handles) are logged and dropped; they never abort the loop.
    pub fn handle_event(&self, event: LinkEvent) {
        match event {
            LinkEvent::Connect { status, conn } => {
                if status == 0 {
                    info!("connection established; conn_handle={}", conn);
                    self.shared.lock(|cell| {
                        let mut shared = cell.borrow_mut();
                        shared.state = ConnState::Connected;
                        shared.conn = Some(conn);
                    });
                } else {
                    warn!("connection attempt failed; status={}", status);
                    self.resume_advertising();
                }
            }
            LinkEvent::Disconnect { reason } => {
                info!("disconnect; reason={}", reason);
                self.shared.lock(|cell| {
                    let mut shared = cell.borrow_mut();
                    shared.conn = None;
                    // A reconnecting peer must resubscribe
                    shared.registry.clear_subscriptions();
                });
                self.resume_advertising();
            }
            LinkEvent::AdvComplete => {
                info!("advertising complete");
                self.resume_advertising();
            }
            LinkEvent::Subscribe { attr, notify } => {
                let resolved = self.shared.lock(|cell| {
                    let mut shared = cell.borrow_mut();
                    let index = shared.registry.lookup_index(attr)?;
                    shared.registry.set_subscribed(index, notify);
                    Some(index)
                });
                match resolved {
                    Some(index) => {
                        debug!("subscription change; index={} notify={}", index, notify)
                    }
                    None => warn!("subscribe event for unknown attr handle {}; dropped", attr),
                }
            }
            LinkEvent::MtuUpdate { conn, mtu } => {
                debug!("mtu update; conn_handle={} mtu={}", conn, mtu);
                self.shared.lock(|cell| cell.borrow_mut().mtu = Some(mtu));
            }
        }
    }

    /// Dispatch a write access from the stack to the owning handler.
    ///
    /// The payload is staged through a fixed buffer of
    /// [`ACCESS_BUF_SIZE`] bytes; anything larger is rejected as
    /// insufficient-resources, as are unknown handles.
    pub fn dispatch_write(&self, attr: AttrHandle, data: &[u8]) -> Result<(), AccessError> {
        let index = self.resolve(attr)?;
        if data.len() > ACCESS_BUF_SIZE {
            warn!(
                "write of {} bytes exceeds {} byte access buffer; rejected",
                data.len(),
                ACCESS_BUF_SIZE
            );
            return Err(AccessError::InsufficientResources);
        }
        let mut staging = [0u8; ACCESS_BUF_SIZE];
        staging[..data.len()].copy_from_slice(data);

        let chr = self.characteristic(index).ok_or(AccessError::UnknownHandle)?;
        debug!("write access; attr={} index={} len={}", attr, index, data.len());
        chr.handler().on_write(index, &staging[..data.len()])
    }

    /// Dispatch a read access from the stack: the handler fills a staged
    /// buffer and exactly that many bytes are appended to `out`. An
    /// append failure is reported as insufficient-resources.
    pub fn dispatch_read(
        &self,
        attr: AttrHandle,
        out: &mut dyn OutboundBuffer,
    ) -> Result<(), AccessError> {
        let index = self.resolve(attr)?;
        let chr = self.characteristic(index).ok_or(AccessError::UnknownHandle)?;

        let mut staging = [0u8; ACCESS_BUF_SIZE];
        let len = chr.handler().on_read(index, &mut staging)?;
        if len > staging.len() {
            return Err(AccessError::InsufficientResources);
        }
        debug!("read access; attr={} index={} len={}", attr, index, len);
        out.append(&staging[..len]).map_err(|_| {
            warn!("outgoing buffer rejected {} byte read response", len);
            AccessError::InsufficientResources
        })
    }

    /// Send a notification for the characteristic at `index`.
    ///
    /// Sends only while connected and subscribed; otherwise a logged
    /// no-op returning `Ok(false)`. Payloads over [`MAX_ATTR_PAYLOAD`]
    /// are rejected. A stale connection handle is never used: disconnect
    /// clears the target before this can observe it.
    pub fn notify(&self, index: usize, payload: &[u8]) -> Result<bool, GattError> {
        if payload.len() > MAX_ATTR_PAYLOAD {
            warn!(
                "notification of {} bytes exceeds {} byte payload limit; rejected",
                payload.len(),
                MAX_ATTR_PAYLOAD
            );
            return Err(GattError::PayloadTooLong);
        }
        let target = self.shared.lock(|cell| {
            let shared = cell.borrow();
            if shared.state != ConnState::Connected || !shared.registry.is_subscribed(index) {
                return None;
            }
            shared.conn.zip(shared.registry.handle_for(index))
        });
        match target {
            Some((conn, attr)) => {
                self.stack
                    .send_notification(conn, attr, payload)
                    .map_err(GattError::Stack)?;
                debug!("notified index {} ({} bytes)", index, payload.len());
                Ok(true)
            }
            None => {
                debug!(
                    "notify skipped for index {}: not connected or not subscribed",
                    index
                );
                Ok(false)
            }
        }
    }

    /// Current connection/advertising state.
    pub fn conn_state(&self) -> ConnState {
        self.shared.lock(|cell| cell.borrow().state)
    }

    /// Most recently negotiated MTU, for diagnostics.
    pub fn mtu(&self) -> Option<u16> {
        self.shared.lock(|cell| cell.borrow().mtu)
    }

    /// Invoke the stored re-advertise callback with no lock held.
    fn resume_advertising(&self) {
        let callback = self.shared.lock(|cell| {
            let mut shared = cell.borrow_mut();
            shared.state = if shared.readvertise.is_some() {
                ConnState::Advertising
            } else {
                ConnState::Idle
            };
            shared.readvertise
        });
        match callback {
            Some(callback) => callback(),
            None => warn!("no re-advertise callback registered; staying idle"),
        }
    }

    fn characteristic(&self, index: usize) -> Option<&CharacteristicDef<'a>> {
        self.chars.iter().find(|chr| chr.index() == index)
    }

    fn resolve(&self, attr: AttrHandle) -> Result<usize, AccessError> {
        self.shared
            .lock(|cell| cell.borrow().registry.lookup_index(attr))
            .ok_or_else(|| {
                warn!("access on unknown attr handle {}; rejected", attr);
                AccessError::UnknownHandle
            })
    }
}
