//! Session driver for TCPSocket devices.
//!
//! This is the "just works" layer. Connect to a device, then send a frame
//! and read the reply, one half-duplex round trip at a time, until a cycle
//! limit, a shutdown request or an error ends the loop.

pub mod config;
pub mod connector;
pub mod error;
pub mod session;

pub use config::{SessionConfig, DEMO_PAYLOAD};
pub use connector::{connect, connect_with_config};
pub use error::{Result, SessionError};
pub use session::{Exchange, RunSummary, Session, SessionState, ShutdownHandle, StopReason};
