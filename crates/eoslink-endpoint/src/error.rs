use std::net::SocketAddrV6;
use std::path::PathBuf;

use crate::service::Service;

/// Errors that can occur while resolving or connecting to coprocessor services.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    /// The coprocessor link could not be discovered (no interface, no address,
    /// or no properties document).
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// The network properties document exists but could not be parsed.
    #[error("invalid network properties in {path}: {reason}")]
    InvalidProperties { path: PathBuf, reason: String },

    /// The discovered port table has no entry for the service.
    #[error("service {0} is not offered by the device")]
    ServiceUnavailable(Service),

    /// Socket creation failed.
    #[error("failed to create socket: {0}")]
    Socket(std::io::Error),

    /// Failed to connect to the resolved service address.
    #[error("failed to connect to {service} at {addr}: {source}")]
    Connect {
        service: Service,
        addr: SocketAddrV6,
        source: std::io::Error,
    },

    /// An I/O error occurred on an established connection.
    #[error("connection I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EndpointError {
    /// Raw OS error code of a failed connect, for diagnostics.
    pub fn connect_errno(&self) -> Option<i32> {
        match self {
            EndpointError::Connect { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }

    /// Whether the failure means no coprocessor link exists at all, as opposed
    /// to a communication failure with a present device.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EndpointError::DeviceNotFound(_) | EndpointError::InvalidProperties { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, EndpointError>;
