//! Capacity and protocol constants for the GATT peripheral core

/// Attribute table capacities
pub mod gatt {
    /// Maximum number of services in the attribute table
    pub const MAX_SERVICES: usize = 4;

    /// Maximum number of characteristics across all services
    pub const MAX_CHARACTERISTICS: usize = 10;

    /// Staging buffer size for characteristic read/write access, in bytes.
    /// Payloads larger than this are rejected as insufficient-resources.
    pub const ACCESS_BUF_SIZE: usize = 32;

    /// Largest notification payload accepted, in bytes: the value that
    /// fits a single ATT notification at a 247-byte negotiated MTU.
    pub const MAX_ATTR_PAYLOAD: usize = 244;
}

/// Advertising constants
pub mod adv {
    /// Payload limit of a legacy advertising PDU
    pub const MAX_ADV_DATA: usize = 31;
}

/// Device identity
pub mod device {
    /// Default GAP device name, used when the application does not set one
    pub const DEFAULT_NAME: &str = "gatt-peripheral";
}
