//! Framing and session driver for devices running TCPSocket firmware.
//!
//! tcpsframe talks to a device over one TCP connection using a fixed
//! 12-byte header followed by a payload of at most 255 bytes.
//!
//! # Crate Structure
//!
//! - [`transport`]: outbound TCP connection to the device
//! - [`frame`]: header codec, exact-length stream reader, frame reader/writer
//! - [`session`]: send/receive loop with ids, timeouts and cancellation
//!   (behind the `session` feature)

/// Re-export transport types.
pub mod transport {
    pub use tcpsframe_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use tcpsframe_frame::*;
}

/// Re-export session types (requires `session` feature).
#[cfg(feature = "session")]
pub mod session {
    pub use tcpsframe_session::*;
}
