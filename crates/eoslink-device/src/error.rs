use eoslink_endpoint::EndpointError;
use eoslink_frame::FrameError;
use eoslink_message::{Command, MessageError, MessageErrorCode};

use crate::driver::DriverError;
use crate::state::StateError;

/// Errors from one message exchange on an established connection.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    /// Resolving or connecting to the service failed.
    #[error("endpoint error: {0}")]
    Endpoint(#[from] EndpointError),

    /// Framing failed (short read, bad length, checksum mismatch).
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// The payload is not a valid message, or a reply field is missing.
    #[error("message error: {0}")]
    Message(#[from] MessageError),

    /// The reply answers a different command than the one sent.
    #[error("reply to {request} carries command {reply}")]
    CommandMismatch { request: Command, reply: Command },

    /// The peer answered with `Success = false`.
    #[error("{command} rejected by peer: {code}")]
    Rejected {
        command: Command,
        code: MessageErrorCode,
    },
}

/// Public error taxonomy for device operations.
///
/// Every variant has a stable numeric [`code`](EosError::code). Message-level
/// reply errors travel separately as [`MessageErrorCode`].
#[derive(Debug, thiserror::Error)]
pub enum EosError {
    /// A caller-supplied parameter is invalid.
    #[error("bad argument: {0}")]
    BadArgument(String),

    /// Sending or receiving failed after a connection was established.
    #[error("communication failure: {0}")]
    CommunicationFailure(#[source] ExchangeError),

    /// No coprocessor could be discovered.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// A coprocessor may be present but this operation is unavailable.
    #[error("device not supported: {0}")]
    DeviceNotSupported(String),

    /// The driver control surface reported failure.
    #[error("driver failure: {0}")]
    DriverFailure(#[from] DriverError),

    /// A buffer or other resource could not be allocated.
    #[error("resource allocation failure: {0}")]
    ResourceAllocationFailure(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl EosError {
    /// Stable numeric code. Zero is reserved for success.
    pub fn code(&self) -> u32 {
        match self {
            EosError::BadArgument(_) => 1,
            EosError::CommunicationFailure(_) => 2,
            EosError::DeviceNotFound(_) => 3,
            EosError::DeviceNotSupported(_) => 4,
            EosError::DriverFailure(_) => 5,
            EosError::ResourceAllocationFailure(_) => 6,
            EosError::Unknown(_) => 7,
        }
    }

    /// Human-readable description of the error kind.
    pub fn kind_name(&self) -> &'static str {
        kind_name(self.code())
    }

    /// Raw OS error of a failed connect, if that is what went wrong.
    pub fn connect_errno(&self) -> Option<i32> {
        match self {
            EosError::CommunicationFailure(ExchangeError::Endpoint(err)) => err.connect_errno(),
            _ => None,
        }
    }
}

/// Human-readable description for a numeric error code.
pub fn kind_name(code: u32) -> &'static str {
    match code {
        0 => "no error",
        1 => "bad argument",
        2 => "communication failure",
        3 => "device not found",
        4 => "device not supported",
        5 => "driver failure",
        6 => "resource allocation failure",
        _ => "unknown error",
    }
}

impl From<EndpointError> for EosError {
    fn from(err: EndpointError) -> Self {
        match err {
            EndpointError::DeviceNotFound(reason) => EosError::DeviceNotFound(reason),
            err @ EndpointError::InvalidProperties { .. } => {
                EosError::DeviceNotFound(err.to_string())
            }
            EndpointError::ServiceUnavailable(service) => {
                EosError::DeviceNotSupported(format!("service {service} is not offered"))
            }
            other => EosError::CommunicationFailure(ExchangeError::Endpoint(other)),
        }
    }
}

impl From<ExchangeError> for EosError {
    fn from(err: ExchangeError) -> Self {
        match err {
            ExchangeError::Endpoint(err) => err.into(),
            ExchangeError::Frame(FrameError::Allocation(size)) => {
                EosError::ResourceAllocationFailure(format!("cannot allocate {size} bytes"))
            }
            // Only raised while encoding the caller's own message.
            ExchangeError::Frame(err @ FrameError::PayloadTooLarge { .. }) => {
                EosError::BadArgument(format!("message too large: {err}"))
            }
            ExchangeError::Rejected {
                command,
                code: MessageErrorCode::InvalidCommand,
            } => EosError::DeviceNotSupported(format!("{command} is not supported by the device")),
            other => EosError::CommunicationFailure(other),
        }
    }
}

impl From<StateError> for EosError {
    fn from(err: StateError) -> Self {
        EosError::Unknown(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EosError>;
