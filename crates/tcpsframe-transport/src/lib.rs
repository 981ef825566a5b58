//! TCP transport to a device running TCPSocket firmware.
//!
//! This is the lowest layer of tcpsframe. It owns exactly one outbound
//! connection; there is no listening role. Everything else builds on top
//! of the [`DeviceStream`] type provided here.

pub mod error;
pub mod tcp;
pub mod traits;

pub use error::{Result, TransportError};
pub use tcp::{TcpConfig, TcpTransport};
pub use traits::DeviceStream;
