//! Attribute table builder
//!
//! Services and characteristics are registered in order at startup:
//! [`TableBuilder::begin_service`] opens a characteristic run and
//! [`TableBuilder::add_characteristic`] appends into it, so each
//! service's characteristics occupy a contiguous range of the table.
//! [`TableBuilder::finalize`] freezes the layout, registers it with the
//! stack and binds the handles the stack assigns. All storage is
//! fixed-capacity; exceeding a limit is a detected error, never a
//! silent overwrite.

use heapless::Vec;
use log::{error, info};

use crate::config::gatt::{MAX_CHARACTERISTICS, MAX_SERVICES};
use crate::link::traits::LinkStack;

use super::access::AccessHandler;
use super::registry::HandleRegistry;
use super::{AttrHandle, GattError};

/// Characteristic permission flags: readable, writable and notifiable
/// are independent bits and freely combinable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharFlags(u8);

impl CharFlags {
    pub const READ: Self = Self(0b001);
    pub const WRITE: Self = Self(0b010);
    pub const NOTIFY: Self = Self(0b100);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Raw bit pattern, as handed to the stack.
    pub const fn bits(self) -> u8 {
        self.0
    }
}

impl core::ops::BitOr for CharFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// A registered service: its UUID plus the contiguous slice of the
/// characteristic table it owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceDef {
    uuid: u16,
    first_char: usize,
    char_count: usize,
}

impl ServiceDef {
    pub fn uuid(&self) -> u16 {
        self.uuid
    }

    /// Range of registration-order positions this service owns.
    pub fn char_range(&self) -> core::ops::Range<usize> {
        self.first_char..self.first_char + self.char_count
    }
}

/// A registered characteristic: logical index, UUID, permission flags
/// and the application handler invoked on access.
///
/// Handlers are `Sync`: the table is shared with the event-loop context
/// once the peripheral is running.
#[derive(Clone, Copy)]
pub struct CharacteristicDef<'a> {
    index: usize,
    uuid: u16,
    flags: CharFlags,
    handler: &'a (dyn AccessHandler + Sync),
}

impl<'a> CharacteristicDef<'a> {
    /// Logical index the application registered this characteristic under.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn uuid(&self) -> u16 {
        self.uuid
    }

    pub fn flags(&self) -> CharFlags {
        self.flags
    }

    pub(crate) fn handler(&self) -> &'a (dyn AccessHandler + Sync) {
        self.handler
    }
}

/// Read-only view of the table layout handed to the stack at
/// registration time.
pub struct TableSchema<'s, 'a> {
    services: &'s [ServiceDef],
    chars: &'s [CharacteristicDef<'a>],
}

impl<'s, 'a> TableSchema<'s, 'a> {
    pub fn services(&self) -> &'s [ServiceDef] {
        self.services
    }

    /// All characteristics in registration order.
    pub fn characteristics(&self) -> &'s [CharacteristicDef<'a>] {
        self.chars
    }

    /// The contiguous characteristic run belonging to `service`.
    pub fn characteristics_of(&self, service: &ServiceDef) -> &'s [CharacteristicDef<'a>] {
        &self.chars[service.char_range()]
    }
}

/// Stateful, ordered accumulator for services and characteristics.
///
/// Runs once at startup on a single thread; the grouping invariant (a
/// characteristic always joins the most recently opened service) falls
/// out of append order.
pub struct TableBuilder<'a> {
    services: Vec<ServiceDef, MAX_SERVICES>,
    chars: Vec<CharacteristicDef<'a>, MAX_CHARACTERISTICS>,
    index_taken: [bool; MAX_CHARACTERISTICS],
}

impl<'a> TableBuilder<'a> {
    pub fn new() -> Self {
        Self {
            services: Vec::new(),
            chars: Vec::new(),
            index_taken: [false; MAX_CHARACTERISTICS],
        }
    }

    /// Open a new primary service; subsequent characteristics join it.
    ///
    /// Fails with [`GattError::CapacityExceeded`] past
    /// [`MAX_SERVICES`], leaving the table unchanged.
    pub fn begin_service(&mut self, uuid: u16) -> Result<(), GattError> {
        let service = ServiceDef {
            uuid,
            first_char: self.chars.len(),
            char_count: 0,
        };
        self.services
            .push(service)
            .map_err(|_| GattError::CapacityExceeded)?;
        Ok(())
    }

    /// Append a characteristic to the currently open service.
    ///
    /// `index` is the logical index the application will use to address
    /// this characteristic in notify calls and access handlers. Indices
    /// must be unique and below [`MAX_CHARACTERISTICS`]; a failed call
    /// leaves the table unchanged.
    pub fn add_characteristic(
        &mut self,
        index: usize,
        uuid: u16,
        flags: CharFlags,
        handler: &'a (dyn AccessHandler + Sync),
    ) -> Result<(), GattError> {
        if self.services.is_empty() {
            return Err(GattError::NoOpenService);
        }
        if self.chars.is_full() {
            return Err(GattError::CapacityExceeded);
        }
        let taken = self
            .index_taken
            .get_mut(index)
            .ok_or(GattError::IndexOutOfRange)?;
        if *taken {
            return Err(GattError::IndexInUse);
        }

        *taken = true;
        // Infallible after the is_full check
        let _ = self.chars.push(CharacteristicDef {
            index,
            uuid,
            flags,
            handler,
        });
        // Grow the open run; a service is always present here
        if let Some(service) = self.services.last_mut() {
            service.char_count += 1;
        }
        Ok(())
    }

    /// Number of services registered so far.
    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    /// Number of characteristics registered so far, across all services.
    pub fn characteristic_count(&self) -> usize {
        self.chars.len()
    }

    /// Freeze the table, register it with the stack and bind the
    /// assigned handles.
    ///
    /// The stack initialises its generic GAP/GATT metadata and assigns
    /// one runtime handle per characteristic, synchronously, in
    /// registration order. A stack rejection or a handle count mismatch
    /// is [`GattError::RegistrationFailure`]: fatal to startup, not
    /// retried.
    pub fn finalize<S: LinkStack>(self, stack: &S) -> Result<AttributeTable<'a>, GattError> {
        let schema = TableSchema {
            services: &self.services,
            chars: &self.chars,
        };
        let handles = stack.register_table(&schema).map_err(|e| {
            error!("attribute table registration rejected by stack: {:?}", e);
            GattError::RegistrationFailure
        })?;
        if handles.len() != self.chars.len() {
            error!(
                "stack assigned {} handles for {} characteristics",
                handles.len(),
                self.chars.len()
            );
            return Err(GattError::RegistrationFailure);
        }

        let mut registry = HandleRegistry::new();
        for (def, &handle) in self.chars.iter().zip(handles.iter()) {
            registry.bind(def.index(), handle)?;
        }

        info!(
            "attribute table registered: {} services, {} characteristics",
            self.services.len(),
            self.chars.len()
        );
        Ok(AttributeTable {
            services: self.services,
            chars: self.chars,
            registry,
        })
    }
}

impl<'a> Default for TableBuilder<'a> {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable, finalised attribute table with its handle bindings.
pub struct AttributeTable<'a> {
    services: Vec<ServiceDef, MAX_SERVICES>,
    pub(crate) chars: Vec<CharacteristicDef<'a>, MAX_CHARACTERISTICS>,
    pub(crate) registry: HandleRegistry,
}

impl<'a> AttributeTable<'a> {
    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    pub fn characteristic_count(&self) -> usize {
        self.chars.len()
    }

    /// Runtime handle bound to a logical index.
    pub fn handle_for(&self, index: usize) -> Option<AttrHandle> {
        self.registry.handle_for(index)
    }
}
