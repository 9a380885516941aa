//! Host-side messaging with an embedded coprocessor.
//!
//! The coprocessor sits on a dedicated link-local IPv6 network. eoslink
//! discovers that link, frames property-list messages over stream
//! connections, runs the device-query request/reply protocol, and turns
//! connectivity flags into lifecycle events.
//!
//! # Crate Structure
//!
//! - [`endpoint`]: service discovery, addresses, and connections
//! - [`frame`]: length-prefixed, checksummed framing (async codec behind `async`)
//! - [`message`]: binary property-list messages and the command catalogue
//! - [`device`]: request/reply exchange, device operations, and events

/// Re-export endpoint types.
pub mod endpoint {
    pub use eoslink_endpoint::*;
}

/// Re-export frame types.
pub mod frame {
    pub use eoslink_frame::*;
}

/// Re-export message types.
pub mod message {
    pub use eoslink_message::*;
}

/// Re-export device types.
pub mod device {
    pub use eoslink_device::*;
}

pub use eoslink_device::{Device, DeviceConfig, EosError, Event, Result};
