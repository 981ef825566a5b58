use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::DeviceStream;

/// Default time allowed for the TCP handshake with the device.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Socket options applied when connecting to a device.
#[derive(Debug, Clone)]
pub struct TcpConfig {
    /// Timeout for the TCP handshake. `None` uses the OS default.
    pub connect_timeout: Option<Duration>,
    /// Set `TCP_NODELAY`. Default: true, so split writes stay split on the wire.
    pub nodelay: bool,
    /// Set `SO_KEEPALIVE`. Default: false.
    pub keepalive: bool,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            nodelay: true,
            keepalive: false,
        }
    }
}

/// TCP transport to a device.
///
/// Outbound only: the device is the server, this side always connects.
pub struct TcpTransport;

impl TcpTransport {
    /// Connect to `addr` (e.g. `"192.168.1.37:80"`) with default options.
    pub fn connect(addr: &str) -> Result<DeviceStream> {
        Self::connect_with_config(addr, &TcpConfig::default())
    }

    /// Connect to `addr` with explicit socket options.
    ///
    /// Every resolved address is tried in order; the last connect error is
    /// returned when none succeeds.
    pub fn connect_with_config(addr: &str, config: &TcpConfig) -> Result<DeviceStream> {
        let candidates = resolve(addr)?;

        let mut last_err = None;
        for candidate in candidates {
            match connect_one(&candidate, config.connect_timeout) {
                Ok(stream) => {
                    let stream = DeviceStream::from_tcp(stream);
                    stream.set_nodelay(config.nodelay)?;
                    if config.keepalive {
                        stream.set_keepalive(true)?;
                    }
                    info!(%candidate, "connected to device");
                    return Ok(stream);
                }
                Err(err) => {
                    debug!(%candidate, error = %err, "connect attempt failed");
                    last_err = Some(err);
                }
            }
        }

        Err(TransportError::Connect {
            addr: addr.to_string(),
            source: last_err.unwrap_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::AddrNotAvailable,
                    "address resolved to no candidates",
                )
            }),
        })
    }
}

fn resolve(addr: &str) -> Result<Vec<SocketAddr>> {
    let candidates: Vec<SocketAddr> = addr
        .to_socket_addrs()
        .map_err(|e| TransportError::Resolve {
            addr: addr.to_string(),
            source: e,
        })?
        .collect();
    debug!(addr, count = candidates.len(), "resolved device address");
    Ok(candidates)
}

fn connect_one(addr: &SocketAddr, timeout: Option<Duration>) -> std::io::Result<TcpStream> {
    match timeout {
        Some(timeout) => TcpStream::connect_timeout(addr, timeout),
        None => TcpStream::connect(addr),
    }
}
