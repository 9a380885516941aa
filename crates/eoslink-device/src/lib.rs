//! Request/reply messaging and device operations for an embedded coprocessor.
//!
//! [`MessageStream`] exchanges framed property-list messages over any byte
//! stream. [`Device`] is the process-wide context on top: it checks that a
//! coprocessor is supported, opens device-query connections, wraps the driver
//! control surface, reads connectivity flags, and dispatches lifecycle
//! [`Event`]s to a single registered handler.
//!
//! ```no_run
//! use eoslink_device::{Device, WorkQueue};
//! use eoslink_endpoint::EndpointConfig;
//! use eoslink_message::gestalt;
//!
//! let device = Device::from_config(&EndpointConfig::default());
//! let answers = device.fetch_gestalt_keys(&[gestalt::BUILD_VERSION])?;
//! println!("{answers:?}");
//!
//! let queue = WorkQueue::new("device-events")?;
//! let _subscription = device.register_event_handler(&queue, |event| {
//!     println!("coprocessor {event}");
//! })?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod device;
pub mod driver;
pub mod error;
pub mod events;
pub mod exchange;
pub mod query;
pub mod state;

pub use device::{Device, DeviceConfig};
pub use driver::{DeviceType, DriverControl, DriverError};
pub use error::{kind_name, EosError, ExchangeError, Result};
pub use events::{event_for, Event, EventHandler, EventHub, Subscription, WorkQueue};
pub use exchange::{receive, respond, send, send_with_reply, MessageStream};
pub use state::{labels, MemoryStateStore, StateError, StateStore, WatchFn, WatchToken};
