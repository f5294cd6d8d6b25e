//! Boundary with the underlying link-layer/radio stack
//!
//! Inbound events arrive as [`events::LinkEvent`]; outbound calls go
//! through the [`traits::LinkStack`] trait so the real radio binding can
//! be swapped for a mock in tests.

pub mod events;
pub mod traits;

pub use events::{ConnHandle, ConnState, LinkEvent};
pub use traits::{LinkStack, StackError};
