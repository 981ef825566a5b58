//! Length-prefixed framing for the TCPSocket device protocol.
//!
//! Every message is a fixed 12-byte little-endian header followed by the
//! payload it declares:
//! - A 4-byte start marker `0x54435053` ("SPCT" on the wire)
//! - A 1-byte version that selects one of two header layouts
//! - A 1-byte message id and a 1-byte payload length
//! - Source/destination addresses (2 bytes each) and a 1-byte flag field
//!
//! Reads are byte-counted: a frame is exactly `HEADER_LEN` bytes followed
//! by exactly `data_len` bytes, however the transport chunks them.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod codec;
pub mod error;
pub mod header;
pub mod reader;
pub mod stream;
pub mod writer;

#[cfg(feature = "async")]
pub use async_codec::TcpsCodec;
pub use codec::{decode_frame, decode_header, encode_frame, encode_header, Frame, FrameConfig};
pub use error::{FrameError, Result};
pub use header::{FrameHeader, HeaderLayout, HEADER_LEN, MAX_DATA_LEN, START_MARKER};
pub use reader::FrameReader;
pub use stream::{ArmTimeout, StreamReader};
pub use writer::FrameWriter;
