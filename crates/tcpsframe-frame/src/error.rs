/// Errors that can occur during frame encoding, decoding and stream reads.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The header does not begin with the start marker.
    ///
    /// The stream is desynchronized; the connection should be closed.
    #[error("malformed header: start marker 0x{found:08x} (expected 0x54435053 \"SPCT\")")]
    MalformedHeader { found: u32 },

    /// The version byte does not name a known header layout.
    #[error("unsupported header version {0}")]
    UnsupportedVersion(u8),

    /// A header buffer of the wrong size was handed to the decoder.
    #[error("header must be exactly 12 bytes, got {len}")]
    InvalidHeaderLength { len: usize },

    /// The payload exceeds what the header can declare or the configured maximum.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before the expected bytes arrived.
    #[error("connection closed after {received} of {expected} bytes")]
    ConnectionClosed { expected: usize, received: usize },

    /// A read or write did not complete before its deadline.
    #[error("timed out waiting for device")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, FrameError>;
