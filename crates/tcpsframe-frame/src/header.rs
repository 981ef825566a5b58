//! Frame header and the two on-wire header layouts.

use std::fmt;

/// Fixed header size in bytes, identical for every layout.
pub const HEADER_LEN: usize = 12;

/// Start marker, little-endian on the wire: `53 50 43 54` ("SPCT").
pub const START_MARKER: u32 = 0x5443_5053;

/// Largest payload a header can declare (`data_len` is one byte).
pub const MAX_DATA_LEN: usize = u8::MAX as usize;

/// Byte arrangement of the 8 header bytes that follow the start marker.
///
/// The layout is keyed by the version byte at offset 4 and fully decides
/// the order of the remaining fields:
///
/// ```text
/// offset  4        5   6         7         8   9     10  11
/// V1      version  id  data_len  source (LE)   dest (LE)     flags
/// V2      version  id  data_len  flags     source (LE)   dest (LE)
/// ```
///
/// V1 is what the bench test tool packs (`<IBBBHHB`). V2 is the packed
/// struct the firmware itself declares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum HeaderLayout {
    #[default]
    V1,
    V2,
}

impl HeaderLayout {
    /// Layout for a version byte, or `None` if the version is unknown.
    pub fn from_version(version: u8) -> Option<Self> {
        match version {
            1 => Some(Self::V1),
            2 => Some(Self::V2),
            _ => None,
        }
    }

    /// The version byte written for this layout.
    pub fn version(self) -> u8 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
        }
    }

    /// Short lowercase name used by the CLI.
    pub fn name(self) -> &'static str {
        match self {
            Self::V1 => "v1",
            Self::V2 => "v2",
        }
    }
}

impl fmt::Display for HeaderLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded or to-be-encoded frame header.
///
/// The start marker is not stored: every header built by this crate
/// carries [`START_MARKER`], and decoding rejects anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Wire layout, selected by the version byte.
    pub layout: HeaderLayout,
    /// Sender-assigned message id, wraps at 255.
    pub id: u8,
    /// Declared payload length.
    pub data_len: u8,
    pub source_addr: u16,
    pub dest_addr: u16,
    /// Opaque flag bits.
    pub flags: u8,
}

impl FrameHeader {
    /// The start marker this header is encoded with.
    pub fn start(&self) -> u32 {
        START_MARKER
    }

    /// The version byte this header is encoded with.
    pub fn version(&self) -> u8 {
        self.layout.version()
    }

    /// Total wire size of the frame this header describes.
    pub fn frame_len(&self) -> usize {
        HEADER_LEN + usize::from(self.data_len)
    }
}

impl fmt::Display for FrameHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "start:0x{:x} version:{} id:{} datalen:{} source:{} dest:{} flags:{}",
            self.start(),
            self.version(),
            self.id,
            self.data_len,
            self.source_addr,
            self.dest_addr,
            self.flags
        )
    }
}
