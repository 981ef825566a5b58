use std::io::Read;

use bytes::{Buf, Bytes, BytesMut};
use tcpsframe_transport::DeviceStream;
use tracing::{debug, warn};

use crate::codec::{decode_header, Frame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::header::{FrameHeader, HEADER_LEN, START_MARKER};
use crate::stream::StreamReader;

/// Reads complete frames from any `Read` stream.
///
/// Each frame is read as exactly `HEADER_LEN` bytes, then exactly the
/// payload length the header declares. Callers always get complete frames.
pub struct FrameReader<T> {
    stream: StreamReader<T>,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            stream: StreamReader::with_timeout(inner, config.read_timeout),
            config,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when the stream ends
    /// before the header or the declared payload is complete.
    pub fn read_frame(&mut self) -> Result<Frame> {
        let header = self.read_header()?;
        let payload = self.read_payload(&header)?;
        Ok(Frame { header, payload })
    }

    /// Read and decode exactly one header.
    ///
    /// Fails with `PayloadTooLarge` if the declared length exceeds the
    /// configured maximum; no payload bytes are consumed in that case.
    pub fn read_header(&mut self) -> Result<FrameHeader> {
        let raw = self.read_header_bytes()?;
        let header = decode_header(&raw)?;
        debug!(
            version = header.version(),
            id = header.id,
            data_len = header.data_len,
            "received header"
        );

        let payload_len = usize::from(header.data_len);
        if payload_len > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload_len,
                max: self.config.max_payload_size,
            });
        }
        Ok(header)
    }

    /// Read exactly the payload `header` declares.
    pub fn read_payload(&mut self, header: &FrameHeader) -> Result<Bytes> {
        self.stream.read_exact(usize::from(header.data_len))
    }

    fn read_header_bytes(&mut self) -> Result<Bytes> {
        let raw = self.stream.read_exact(HEADER_LEN)?;
        let Some(limit) = self.config.resync_limit else {
            return Ok(raw);
        };
        if starts_with_marker(&raw) {
            return Ok(raw);
        }

        // Slide a header-sized window one byte at a time until it begins
        // with the start marker.
        let mut window = BytesMut::from(raw.as_ref());
        let mut skipped = 0usize;
        while !starts_with_marker(&window) {
            if skipped >= limit {
                return Err(FrameError::MalformedHeader {
                    found: (&window[..4]).get_u32_le(),
                });
            }
            window.advance(1);
            let next = self.stream.read_exact(1)?;
            window.extend_from_slice(&next);
            skipped += 1;
        }

        warn!(skipped, "discarded bytes before start marker");
        Ok(window.freeze())
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        self.stream.get_ref()
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        self.stream.get_mut()
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.stream.into_inner()
    }

    /// Update maximum payload size for subsequent frame decoding.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<DeviceStream> {
    /// Create a frame reader for `DeviceStream` and apply read timeout from config.
    ///
    /// Each header or payload read is bounded by `read_timeout` as a whole,
    /// however the device spaces out its bytes.
    pub fn with_config_device(inner: DeviceStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self {
            stream: StreamReader::for_device(inner, config.read_timeout),
            config,
        })
    }
}

fn starts_with_marker(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && bytes[..4] == START_MARKER.to_le_bytes()
}

pub(crate) fn transport_to_frame_error(err: tcpsframe_transport::TransportError) -> FrameError {
    match err {
        tcpsframe_transport::TransportError::Io(io) => FrameError::Io(io),
        tcpsframe_transport::TransportError::Resolve { source, .. }
        | tcpsframe_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
    }
}
