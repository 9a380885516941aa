//! Service address discovery and connections for an embedded coprocessor.
//!
//! The coprocessor is reached over an IPv6 link-local network on a dedicated
//! host interface. This crate discovers that link once per process, maps each
//! [`Service`] to its port, and opens stream or datagram [`Connection`]s.
//!
//! This is the lowest layer of eoslink. Framing and messaging build on the
//! `Read + Write` connection provided here.

pub mod connection;
pub mod error;
pub mod properties;
pub mod resolver;
pub mod service;

pub use connection::{ConnType, Connection, Socket};
pub use error::{EndpointError, Result};
pub use properties::{
    interface_index, Discover, EndpointConfig, NetworkProperties, PropertiesFile,
    DEFAULT_PROPERTIES_PATH, PROPERTIES_ENV,
};
pub use resolver::Endpoint;
pub use service::Service;
