use std::io::{ErrorKind, Read};

use bytes::Bytes;
use tracing::trace;

use crate::codec::{parse_header_len, FrameConfig, FrameHeader, HEADER_SIZE, LENGTH_PREFIX_SIZE};
use crate::error::{FrameError, Result};

/// Reads complete frames from any `Read` stream.
///
/// Reads exactly the bytes of one frame and nothing more, so the stream is
/// left positioned at the next frame. Partial reads are retried until the
/// requested length is satisfied; a zero-length read means the peer closed
/// the connection.
pub struct FrameReader<T> {
    inner: T,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self { inner, config }
    }

    /// Read the next complete frame and return its verified payload (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_frame(&mut self) -> Result<Bytes> {
        let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
        self.read_full(&mut prefix)?;
        let header_len = parse_header_len(prefix)?;

        let mut raw = [0u8; HEADER_SIZE];
        self.read_full(&mut raw[..header_len])?;
        if header_len < HEADER_SIZE {
            trace!(header_len, "legacy frame header");
        }
        let header = FrameHeader::parse(&raw[..header_len]);
        let payload_len = header.checked_payload_len(self.config.max_payload_len)?;

        let mut payload = Vec::new();
        payload
            .try_reserve_exact(payload_len)
            .map_err(|_| FrameError::Allocation(payload_len))?;
        payload.resize(payload_len, 0);
        self.read_full(&mut payload)?;

        header.verify(&payload)?;
        Ok(Bytes::from(payload))
    }

    fn read_full(&mut self, mut buf: &mut [u8]) -> Result<()> {
        while !buf.is_empty() {
            match self.inner.read(buf) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => buf = &mut buf[n..],
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        Ok(())
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}
