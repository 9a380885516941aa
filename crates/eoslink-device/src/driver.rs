//! Coprocessor driver control surface and device type.
//!
//! Reset, DFU, and the healed flag are simple success/fail driver calls
//! outside the framed message protocol. The platform supplies an
//! implementation of [`DriverControl`]; this crate only wraps it.

use std::fmt;

/// Errors reported by a [`DriverControl`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The driver service could not be reached.
    #[error("driver is not available")]
    Unavailable,

    /// The driver rejected the call.
    #[error("{operation} failed: {reason}")]
    Failed {
        operation: &'static str,
        reason: String,
    },

    #[error("driver I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Operations the coprocessor driver exposes to the host.
pub trait DriverControl: Send + Sync {
    /// Reboot the coprocessor into recovery.
    fn force_reset(&self) -> Result<(), DriverError>;

    /// Reboot the coprocessor into DFU mode.
    fn force_dfu(&self) -> Result<(), DriverError>;

    fn set_healed(&self, healed: bool) -> Result<(), DriverError>;

    fn healed(&self) -> Result<bool, DriverError>;
}

/// Kind of coprocessor on this machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    /// First-generation bridge coprocessor.
    Bridge1,
    /// Second-generation bridge coprocessor.
    Bridge2,
    Other(u32),
}

impl DeviceType {
    pub fn from_code(code: u32) -> Self {
        match code {
            0x1000 => DeviceType::Bridge1,
            0x2000 => DeviceType::Bridge2,
            other => DeviceType::Other(other),
        }
    }

    pub fn code(self) -> u32 {
        match self {
            DeviceType::Bridge1 => 0x1000,
            DeviceType::Bridge2 => 0x2000,
            DeviceType::Other(code) => code,
        }
    }

    /// First-generation devices use the smaller frame payload limit.
    pub fn is_first_generation(self) -> bool {
        self == DeviceType::Bridge1
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceType::Bridge1 => f.write_str("bridge1"),
            DeviceType::Bridge2 => f.write_str("bridge2"),
            DeviceType::Other(code) => write!(f, "other({code:#x})"),
        }
    }
}
