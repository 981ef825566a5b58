use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use tcpsframe_transport::DeviceStream;
use tracing::debug;

use crate::codec::{Frame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::header::{FrameHeader, HEADER_LEN};
use crate::reader::transport_to_frame_error;
use crate::stream::is_timeout;

const INITIAL_BUFFER_CAPACITY: usize = 512;

/// Writes complete frames to any `Write` stream.
///
/// With `FrameConfig::fragment` set, the header and payload go out as two
/// separate writes. The bytes on the wire are the same either way.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Write a complete frame (blocking).
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        if frame.payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: frame.payload.len(),
                max: self.config.max_payload_size,
            });
        }

        self.buf.clear();
        frame.encode(&mut self.buf);

        if self.config.fragment && !frame.payload.is_empty() {
            let (header, payload) = self.buf.split_at(HEADER_LEN);
            write_all(&mut self.inner, header)?;
            write_all(&mut self.inner, payload)?;
        } else {
            write_all(&mut self.inner, &self.buf)?;
        }
        debug!(
            id = frame.header.id,
            size = frame.wire_size(),
            fragment = self.config.fragment,
            "sent frame"
        );

        self.flush()
    }

    /// Build a frame from `header` and `payload` and send it.
    ///
    /// `header.data_len` is taken from the payload.
    pub fn send(&mut self, header: FrameHeader, payload: &[u8]) -> Result<()> {
        let frame = Frame::new(header, payload.to_vec())?;
        self.write_frame(&frame)
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if is_timeout(&err) => return Err(FrameError::Timeout),
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Toggle split header/payload writes for subsequent frames.
    pub fn set_fragment(&mut self, fragment: bool) {
        self.config.fragment = fragment;
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameWriter<DeviceStream> {
    /// Create a frame writer for `DeviceStream` and apply write timeout from config.
    pub fn with_config_device(inner: DeviceStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

fn write_all<T: Write>(inner: &mut T, bytes: &[u8]) -> Result<()> {
    let mut offset = 0usize;
    while offset < bytes.len() {
        match inner.write(&bytes[offset..]) {
            Ok(0) => {
                return Err(FrameError::ConnectionClosed {
                    expected: bytes.len(),
                    received: offset,
                })
            }
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if is_timeout(&err) => return Err(FrameError::Timeout),
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
    Ok(())
}
