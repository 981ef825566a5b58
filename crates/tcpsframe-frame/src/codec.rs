use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::header::{FrameHeader, HeaderLayout, HEADER_LEN, MAX_DATA_LEN, START_MARKER};

/// A complete frame: header plus exactly `header.data_len` payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: FrameHeader,
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame, deriving `data_len` from the payload.
    ///
    /// Any `data_len` already set on `header` is overwritten.
    pub fn new(mut header: FrameHeader, payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();
        header.data_len =
            u8::try_from(payload.len()).map_err(|_| FrameError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_DATA_LEN,
            })?;
        Ok(Self { header, payload })
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }

    /// Append this frame's wire bytes to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        encode_frame(&self.header, &self.payload, dst);
    }

    /// This frame's wire bytes.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.wire_size());
        self.encode(&mut buf);
        buf.freeze()
    }
}

/// Append the 12 header bytes for `header` to `dst`, in its layout's order.
pub fn encode_header(header: &FrameHeader, dst: &mut BytesMut) {
    dst.reserve(HEADER_LEN);
    dst.put_u32_le(START_MARKER);
    dst.put_u8(header.layout.version());
    dst.put_u8(header.id);
    dst.put_u8(header.data_len);
    match header.layout {
        HeaderLayout::V1 => {
            dst.put_u16_le(header.source_addr);
            dst.put_u16_le(header.dest_addr);
            dst.put_u8(header.flags);
        }
        HeaderLayout::V2 => {
            dst.put_u8(header.flags);
            dst.put_u16_le(header.source_addr);
            dst.put_u16_le(header.dest_addr);
        }
    }
}

/// Encode a header and its payload into the wire format.
///
/// ```text
/// ┌────────────┬─────────┬────┬──────────┬──────────────────┬────────────────┐
/// │ Start (4B) │ Version │ ID │ Data len │ layout-specific  │ Payload        │
/// │ 0x54435053 │ (1B)    │(1B)│ (1B)     │ addr/flags (5B)  │ (Data len B)   │
/// └────────────┴─────────┴────┴──────────┴──────────────────┴────────────────┘
/// ```
///
/// # Panics
///
/// Panics if `payload.len()` differs from `header.data_len`. The payload is
/// never padded or truncated to fit.
pub fn encode_frame(header: &FrameHeader, payload: &[u8], dst: &mut BytesMut) {
    assert_eq!(
        payload.len(),
        usize::from(header.data_len),
        "payload length {} does not match declared data_len {}",
        payload.len(),
        header.data_len
    );
    dst.reserve(HEADER_LEN + payload.len());
    encode_header(header, dst);
    dst.put_slice(payload);
}

/// Decode exactly one header.
///
/// The start marker is checked before anything else, then the version
/// byte picks the layout the remaining bytes are parsed with.
pub fn decode_header(src: &[u8]) -> Result<FrameHeader> {
    if src.len() != HEADER_LEN {
        return Err(FrameError::InvalidHeaderLength { len: src.len() });
    }

    let mut buf = src;
    let start = buf.get_u32_le();
    if start != START_MARKER {
        return Err(FrameError::MalformedHeader { found: start });
    }

    let version = buf.get_u8();
    let layout =
        HeaderLayout::from_version(version).ok_or(FrameError::UnsupportedVersion(version))?;
    let id = buf.get_u8();
    let data_len = buf.get_u8();

    let (source_addr, dest_addr, flags) = match layout {
        HeaderLayout::V1 => {
            let source = buf.get_u16_le();
            let dest = buf.get_u16_le();
            (source, dest, buf.get_u8())
        }
        HeaderLayout::V2 => {
            let flags = buf.get_u8();
            let source = buf.get_u16_le();
            (source, buf.get_u16_le(), flags)
        }
    };

    Ok(FrameHeader {
        layout,
        id,
        data_len,
        source_addr,
        dest_addr,
        flags,
    })
}

/// Decode a frame from an accumulation buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    if src.len() < HEADER_LEN {
        return Ok(None); // Need more data
    }

    let header = decode_header(&src[..HEADER_LEN])?;
    let payload_len = usize::from(header.data_len);

    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    if src.len() < header.frame_len() {
        return Ok(None); // Need more data
    }

    src.advance(HEADER_LEN);
    let payload = src.split_to(payload_len).freeze();

    Ok(Some(Frame { header, payload }))
}

/// Configuration for frame readers and writers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum accepted payload size in bytes. Default: 255.
    pub max_payload_size: usize,
    /// Deadline for each blocking exact-length read.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
    /// Send header and payload as two separate writes.
    pub fragment: bool,
    /// Skip up to this many bytes looking for a start marker before giving
    /// up with `MalformedHeader`. `None` disables resync.
    pub resync_limit: Option<usize>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: MAX_DATA_LEN,
            read_timeout: None,
            write_timeout: None,
            fragment: false,
            resync_limit: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header(layout: HeaderLayout) -> FrameHeader {
        FrameHeader {
            layout,
            id: 7,
            data_len: 4,
            source_addr: 0x12,
            dest_addr: 128,
            flags: 0x56,
        }
    }

    const DEADBEEF: [u8; 4] = [0xDE, 0xAD, 0xBE, 0xEF];

    #[test]
    fn test_reference_frame_v1() {
        let header = sample_header(HeaderLayout::V1);
        let mut buf = BytesMut::new();
        encode_frame(&header, &DEADBEEF, &mut buf);

        assert_eq!(
            buf.as_ref(),
            &[
                0x53, 0x50, 0x43, 0x54, // start
                0x01, 0x07, 0x04, // version, id, data_len
                0x12, 0x00, // source
                0x80, 0x00, // dest
                0x56, // flags
                0xDE, 0xAD, 0xBE, 0xEF,
            ]
        );

        let decoded = decode_header(&buf[..HEADER_LEN]).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(decoded.start(), 0x5443_5053);
        assert_eq!(&buf[HEADER_LEN..], &DEADBEEF);
    }

    #[test]
    fn test_reference_frame_v2_field_order() {
        let header = sample_header(HeaderLayout::V2);
        let mut buf = BytesMut::new();
        encode_frame(&header, &DEADBEEF, &mut buf);

        assert_eq!(
            &buf[..HEADER_LEN],
            &[0x53, 0x50, 0x43, 0x54, 0x02, 0x07, 0x04, 0x56, 0x12, 0x00, 0x80, 0x00]
        );
        assert_eq!(decode_header(&buf[..HEADER_LEN]).unwrap(), header);
    }

    #[test]
    fn test_same_bytes_differ_by_layout() {
        // Bytes 7..12 under the V1 version byte, then reinterpreted as V2.
        let mut v1 = BytesMut::new();
        encode_header(&sample_header(HeaderLayout::V1), &mut v1);
        let mut v2 = v1.to_vec();
        v2[4] = 2;

        let as_v2 = decode_header(&v2).unwrap();
        assert_eq!(as_v2.layout, HeaderLayout::V2);
        assert_eq!(as_v2.flags, 0x12);
        assert_eq!(as_v2.source_addr, 0x8000);
        assert_eq!(as_v2.dest_addr, 0x5600);
    }

    #[test]
    fn test_decode_corrupted_start_marker() {
        let mut buf = BytesMut::new();
        encode_header(&sample_header(HeaderLayout::V1), &mut buf);

        for i in 0..4 {
            let mut corrupted = buf.to_vec();
            corrupted[i] ^= 0x01;
            let result = decode_header(&corrupted);
            assert!(matches!(result, Err(FrameError::MalformedHeader { .. })));
        }
    }

    #[test]
    fn test_bad_start_checked_before_version() {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[4] = 0xEE;
        let result = decode_header(&bytes);
        assert!(matches!(
            result,
            Err(FrameError::MalformedHeader { found: 0 })
        ));
    }

    #[test]
    fn test_decode_unsupported_version() {
        let mut buf = BytesMut::new();
        encode_header(&sample_header(HeaderLayout::V1), &mut buf);

        for version in [0u8, 3, 0x7F, 0xFF] {
            let mut bytes = buf.to_vec();
            bytes[4] = version;
            let result = decode_header(&bytes);
            assert!(matches!(result, Err(FrameError::UnsupportedVersion(v)) if v == version));
        }
    }

    #[test]
    fn test_decode_header_wrong_length() {
        let result = decode_header(&[0x53, 0x50, 0x43]);
        assert!(matches!(
            result,
            Err(FrameError::InvalidHeaderLength { len: 3 })
        ));
        let result = decode_header(&[0u8; HEADER_LEN + 1]);
        assert!(matches!(result, Err(FrameError::InvalidHeaderLength { .. })));
    }

    #[test]
    #[should_panic(expected = "does not match declared data_len")]
    fn test_encode_length_mismatch_panics() {
        let header = sample_header(HeaderLayout::V1);
        let mut buf = BytesMut::new();
        encode_frame(&header, b"toolong", &mut buf);
    }

    #[test]
    fn test_frame_new_sets_data_len() {
        let mut header = sample_header(HeaderLayout::V2);
        header.data_len = 99;
        let frame = Frame::new(header, &b"abc"[..]).unwrap();
        assert_eq!(frame.header.data_len, 3);
        assert_eq!(frame.wire_size(), HEADER_LEN + 3);
        assert_eq!(frame.to_bytes().len(), frame.wire_size());
    }

    #[test]
    fn test_frame_new_rejects_oversized_payload() {
        let result = Frame::new(sample_header(HeaderLayout::V1), vec![0u8; 256]);
        assert!(matches!(
            result,
            Err(FrameError::PayloadTooLarge { size: 256, max: 255 })
        ));
        assert!(Frame::new(sample_header(HeaderLayout::V1), vec![0u8; 255]).is_ok());
    }

    #[test]
    fn test_roundtrip_both_layouts() {
        for layout in [HeaderLayout::V1, HeaderLayout::V2] {
            for len in [0usize, 1, 4, 255] {
                let payload: Vec<u8> = (0..len).map(|i| i as u8).collect();
                let header = FrameHeader {
                    layout,
                    id: len as u8,
                    data_len: 0,
                    source_addr: 0xBEEF,
                    dest_addr: 0x0102,
                    flags: 0xA5,
                };
                let frame = Frame::new(header, payload).unwrap();

                let mut buf = BytesMut::from(frame.to_bytes().as_ref());
                let decoded = decode_frame(&mut buf, MAX_DATA_LEN).unwrap().unwrap();
                assert_eq!(decoded, frame);
                assert!(buf.is_empty());
            }
        }
    }

    #[test]
    fn test_decode_incomplete_header() {
        let mut buf = BytesMut::from(&[0x53, 0x50, 0x43][..]);
        let result = decode_frame(&mut buf, MAX_DATA_LEN).unwrap();
        assert!(result.is_none());
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_decode_incomplete_payload() {
        let frame = Frame::new(sample_header(HeaderLayout::V1), &b"hello"[..]).unwrap();
        let mut buf = BytesMut::from(frame.to_bytes().as_ref());
        buf.truncate(HEADER_LEN + 2); // Truncate payload

        let result = decode_frame(&mut buf, MAX_DATA_LEN).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_decode_payload_over_limit() {
        let frame = Frame::new(sample_header(HeaderLayout::V1), vec![1u8; 64]).unwrap();
        let mut buf = BytesMut::from(frame.to_bytes().as_ref());

        let result = decode_frame(&mut buf, 16);
        assert!(matches!(
            result,
            Err(FrameError::PayloadTooLarge { size: 64, max: 16 })
        ));
    }

    #[test]
    fn test_multiple_frames() {
        let mut buf = BytesMut::new();
        let mut header = sample_header(HeaderLayout::V1);
        Frame::new(header, &b"first"[..]).unwrap().encode(&mut buf);
        header.layout = HeaderLayout::V2;
        header.id = 8;
        Frame::new(header, &b"second"[..]).unwrap().encode(&mut buf);

        let f1 = decode_frame(&mut buf, MAX_DATA_LEN).unwrap().unwrap();
        assert_eq!(f1.header.id, 7);
        assert_eq!(f1.payload.as_ref(), b"first");

        let f2 = decode_frame(&mut buf, MAX_DATA_LEN).unwrap().unwrap();
        assert_eq!(f2.header.layout, HeaderLayout::V2);
        assert_eq!(f2.payload.as_ref(), b"second");

        assert!(buf.is_empty());
    }
}
