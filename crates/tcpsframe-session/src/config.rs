use std::time::Duration;

use bytes::Bytes;
use tcpsframe_frame::{FrameConfig, FrameHeader, HeaderLayout, MAX_DATA_LEN};
use tcpsframe_transport::TcpConfig;

/// Payload sent when none is configured.
pub const DEMO_PAYLOAD: [u8; 4] = [0xDE, 0xAD, 0xBE, 0xEF];

/// Default per-operation deadline for reads and writes.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(5);

/// What a session sends and how it talks to the device.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Header layout (and version byte) of outgoing frames.
    pub layout: HeaderLayout,
    /// Id of the first frame; later frames count up from it, wrapping at 255.
    pub first_id: u8,
    pub source_addr: u16,
    pub dest_addr: u16,
    pub flags: u8,
    /// Payload of every outgoing frame. At most 255 bytes.
    pub payload: Bytes,
    /// Send header and payload as two writes.
    pub fragment: bool,
    /// Deadline for receiving each header and each payload.
    pub read_timeout: Option<Duration>,
    /// Deadline for each socket write.
    pub write_timeout: Option<Duration>,
    /// Bytes to skip hunting for a start marker. `None`: a bad marker is fatal.
    pub resync_limit: Option<usize>,
    /// Drop replies whose `dest_addr` is not our `source_addr` and keep
    /// reading, as the firmware does for its own address.
    pub match_address: bool,
    /// Socket options for the connection.
    pub tcp: TcpConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            layout: HeaderLayout::V1,
            first_id: 0,
            source_addr: 0x12,
            dest_addr: 128,
            flags: 0x56,
            payload: Bytes::from_static(&DEMO_PAYLOAD),
            fragment: false,
            read_timeout: Some(DEFAULT_IO_TIMEOUT),
            write_timeout: Some(DEFAULT_IO_TIMEOUT),
            resync_limit: None,
            match_address: false,
            tcp: TcpConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Frame reader/writer settings derived from this configuration.
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_payload_size: MAX_DATA_LEN,
            read_timeout: self.read_timeout,
            write_timeout: self.write_timeout,
            fragment: self.fragment,
            resync_limit: self.resync_limit,
        }
    }

    /// Header template for outgoing frames; `data_len` is filled in per frame.
    pub(crate) fn header(&self, id: u8) -> FrameHeader {
        FrameHeader {
            layout: self.layout,
            id,
            data_len: 0,
            source_addr: self.source_addr,
            dest_addr: self.dest_addr,
            flags: self.flags,
        }
    }
}
