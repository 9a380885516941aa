/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The declared header length exceeds the fixed header size.
    #[error("frame header too large ({len} bytes, max {max})")]
    HeaderTooLarge { len: u32, max: usize },

    /// The declared payload length is zero or above the limit.
    #[error("invalid payload length {len} (must be 1..={max})")]
    InvalidPayloadLength { len: u32, max: u32 },

    /// The payload handed to the encoder is empty or above the limit.
    #[error("payload size {size} out of range (1..={max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The payload checksum does not match the header.
    #[error("checksum mismatch (header {expected:#010x}, payload {actual:#010x})")]
    ChecksumMismatch { expected: u32, actual: u32 },

    /// The payload buffer could not be allocated.
    #[error("failed to allocate {0} byte payload buffer")]
    Allocation(usize),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was transferred.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
