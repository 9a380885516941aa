//! Command codes and message-level reply errors.

use std::fmt;

/// Command code carried in the `Command` field of every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Command(pub u32);

impl Command {
    /// Answer values for a list of gestalt keys.
    pub const FETCH_GESTALT_KEYS: Command = Command(3);
    /// List every gestalt key the coprocessor can answer.
    pub const FETCH_SUPPORTED_GESTALT_KEYS_LIST: Command = Command(4);
    /// Boot arguments the coprocessor booted with.
    pub const FETCH_BOOT_ARGS: Command = Command(5);
    /// Protocol version handshake.
    pub const GET_SERVICE_VERSION: Command = Command(6);

    /// Coprocessor liveness probe, answered by the host.
    pub const PING: Command = Command(100);
    /// Crash log upload from the coprocessor.
    pub const SUBMIT_CRASH: Command = Command(110);

    pub const ENABLE_CONNECTION_WATCHDOG: Command = Command(200);
    pub const WATCHDOG_HEARTBEAT: Command = Command(201);
    pub const WATCHDOG_DISABLE_ACK: Command = Command(202);
    pub const DISABLE_CONNECTION_WATCHDOG: Command = Command(203);

    /// Raw command code.
    pub fn code(self) -> u32 {
        self.0
    }

    /// Human-readable name for diagnostics.
    pub fn name(self) -> &'static str {
        command_name(self.0)
    }
}

impl From<u32> for Command {
    fn from(code: u32) -> Self {
        Command(code)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.0)
    }
}

/// Returns a human-readable name for a command code.
pub fn command_name(code: u32) -> &'static str {
    match Command(code) {
        Command::FETCH_GESTALT_KEYS => "FetchGestaltKeys",
        Command::FETCH_SUPPORTED_GESTALT_KEYS_LIST => "FetchSupportedGestaltKeysList",
        Command::FETCH_BOOT_ARGS => "FetchBootArgs",
        Command::GET_SERVICE_VERSION => "GetServiceVersion",
        Command::PING => "Ping",
        Command::SUBMIT_CRASH => "SubmitCrash",
        Command::ENABLE_CONNECTION_WATCHDOG => "EnableConnectionWatchdog",
        Command::WATCHDOG_HEARTBEAT => "WatchdogHeartbeat",
        Command::WATCHDOG_DISABLE_ACK => "WatchdogDisableAck",
        Command::DISABLE_CONNECTION_WATCHDOG => "DisableConnectionWatchdog",
        _ => "Unknown",
    }
}

/// Error code carried in the `Error` field of a reply.
///
/// This layer is independent of transport errors: a reply can arrive intact
/// and still report a failure here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageErrorCode {
    None,
    Unknown,
    InvalidCommand,
    Other(u32),
}

impl MessageErrorCode {
    pub fn code(self) -> u32 {
        match self {
            MessageErrorCode::None => 0,
            MessageErrorCode::Unknown => 100,
            MessageErrorCode::InvalidCommand => 200,
            MessageErrorCode::Other(code) => code,
        }
    }

    pub fn from_code(code: u32) -> Self {
        match code {
            0 => MessageErrorCode::None,
            100 => MessageErrorCode::Unknown,
            200 => MessageErrorCode::InvalidCommand,
            other => MessageErrorCode::Other(other),
        }
    }

    pub fn is_none(self) -> bool {
        self == MessageErrorCode::None
    }
}

impl fmt::Display for MessageErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageErrorCode::None => f.write_str("none"),
            MessageErrorCode::Unknown => f.write_str("unknown"),
            MessageErrorCode::InvalidCommand => f.write_str("invalid command"),
            MessageErrorCode::Other(code) => write!(f, "error {code}"),
        }
    }
}
