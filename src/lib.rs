#![cfg_attr(not(test), no_std)]

//! Peripheral-side GATT server core for a single-connection BLE device.
//!
//! The application declares services and characteristics through
//! [`gatt::TableBuilder`], registers the finalised table with the
//! link-layer stack, and hands the result to [`peripheral::Peripheral`],
//! which maps raw link events onto characteristic-level read, write and
//! notify semantics. The radio stack itself is reached through the
//! [`link::traits::LinkStack`] trait so the core stays host-testable.

// Links the host critical-section implementation into the test binary
#[cfg(test)]
use critical_section as _;

pub mod config;
pub mod gatt;
pub mod link;
pub mod peripheral;
