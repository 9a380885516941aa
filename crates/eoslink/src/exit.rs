use std::fmt;
use std::io;

use eoslink_device::{EosError, ExchangeError};
use eoslink_endpoint::EndpointError;
use eoslink_frame::FrameError;

// Exit codes follow sysexits where one fits.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const HEALTH_CHECK_FAILED: i32 = 30;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const DEVICE_UNAVAILABLE: i32 = 69;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: &io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::BrokenPipe => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn endpoint_error(context: &str, err: EndpointError) -> CliError {
    match &err {
        EndpointError::Socket(source)
        | EndpointError::Connect { source, .. }
        | EndpointError::Io(source) => io_error(context, source),
        EndpointError::DeviceNotFound(_)
        | EndpointError::InvalidProperties { .. }
        | EndpointError::ServiceUnavailable(_) => {
            CliError::new(DEVICE_UNAVAILABLE, format!("{context}: {err}"))
        }
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match &err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::ConnectionClosed => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
        FrameError::Allocation(_) => CliError::new(INTERNAL, format!("{context}: {err}")),
        FrameError::HeaderTooLarge { .. }
        | FrameError::InvalidPayloadLength { .. }
        | FrameError::PayloadTooLarge { .. }
        | FrameError::ChecksumMismatch { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
    }
}

pub fn exchange_error(context: &str, err: ExchangeError) -> CliError {
    match err {
        ExchangeError::Endpoint(err) => endpoint_error(context, err),
        ExchangeError::Frame(err) => frame_error(context, err),
        ExchangeError::Message(_) | ExchangeError::CommandMismatch { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        ExchangeError::Rejected { .. } => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

pub fn eos_error(context: &str, err: EosError) -> CliError {
    match err {
        EosError::CommunicationFailure(err) => exchange_error(context, err),
        EosError::BadArgument(_) => CliError::new(USAGE, format!("{context}: {err}")),
        EosError::DeviceNotFound(_) | EosError::DeviceNotSupported(_) => {
            CliError::new(DEVICE_UNAVAILABLE, format!("{context}: {err}"))
        }
        EosError::DriverFailure(_) => CliError::new(FAILURE, format!("{context}: {err}")),
        EosError::ResourceAllocationFailure(_) | EosError::Unknown(_) => {
            CliError::new(INTERNAL, format!("{context}: {err}"))
        }
    }
}
