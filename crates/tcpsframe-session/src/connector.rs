use tcpsframe_frame::{FrameReader, FrameWriter};
use tcpsframe_transport::TcpTransport;
use tracing::info;

use crate::config::SessionConfig;
use crate::error::Result;
use crate::session::{Session, ShutdownHandle};

/// Connect to a device at `addr` (e.g. `"192.168.1.37:80"`) with defaults.
pub fn connect(addr: &str) -> Result<Session> {
    connect_with_config(addr, SessionConfig::default())
}

/// Connect with explicit configuration.
pub fn connect_with_config(addr: &str, config: SessionConfig) -> Result<Session> {
    let stream = TcpTransport::connect_with_config(addr, &config.tcp)?;
    let reader_stream = stream.try_clone()?;
    let control_stream = stream.try_clone()?;

    let frame_config = config.frame_config();
    let reader = FrameReader::with_config_device(reader_stream, frame_config.clone())?;
    let writer = FrameWriter::with_config_device(stream, frame_config)?;

    info!(
        %addr,
        layout = %config.layout,
        fragment = config.fragment,
        "session ready"
    );

    Ok(Session::from_parts(
        reader,
        writer,
        config,
        ShutdownHandle::with_stream(control_stream),
    ))
}
