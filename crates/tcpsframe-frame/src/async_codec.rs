//! `tokio_util` codec for the same wire format, for callers on tokio.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_frame, decode_header, Frame};
use crate::error::{FrameError, Result};
use crate::header::{HEADER_LEN, MAX_DATA_LEN};

/// Frame codec for `tokio_util::codec::Framed`.
#[derive(Debug, Clone)]
pub struct TcpsCodec {
    max_payload_size: usize,
}

impl TcpsCodec {
    pub fn new() -> Self {
        Self::with_max_payload(MAX_DATA_LEN)
    }

    pub fn with_max_payload(max_payload_size: usize) -> Self {
        Self { max_payload_size }
    }
}

impl Default for TcpsCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for TcpsCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        decode_frame(src, self.max_payload_size)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(FrameError::ConnectionClosed {
                expected: expected_len(src),
                received: src.len(),
            }),
        }
    }
}

impl Encoder<Frame> for TcpsCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        if frame.payload.len() > self.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: frame.payload.len(),
                max: self.max_payload_size,
            });
        }
        frame.encode(dst);
        Ok(())
    }
}

/// Bytes needed for the frame at the head of `src`, as far as it is known.
fn expected_len(src: &BytesMut) -> usize {
    match decode_header(src.get(..HEADER_LEN).unwrap_or_default()) {
        Ok(header) => header.frame_len(),
        Err(_) => HEADER_LEN,
    }
}
