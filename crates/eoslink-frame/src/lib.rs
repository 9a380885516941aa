//! Length-prefixed, checksummed framing for the coprocessor link.
//!
//! Every message travels as one frame:
//! - A 4-byte little-endian header length (at most 9)
//! - A header of pad byte, additive checksum, and payload length
//! - The payload, `1..=MAX_PAYLOAD_LEN` bytes
//!
//! Lengths from the wire are validated before anything is allocated, and the
//! payload checksum is verified before it is handed out.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

#[cfg(feature = "async")]
pub use async_codec::EosFrameCodec;
pub use codec::{
    checksum, decode_frame, encode_frame, FrameConfig, FrameHeader, FIRST_GEN_MAX_PAYLOAD_LEN,
    HEADER_SIZE, LENGTH_PREFIX_SIZE, MAX_PAYLOAD_LEN,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
