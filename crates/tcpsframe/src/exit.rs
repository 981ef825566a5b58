use std::fmt;
use std::io;

use tcpsframe_frame::FrameError;
use tcpsframe_session::SessionError;
use tcpsframe_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Connect { source, .. } | TransportError::Io(source) => {
            io_error(context, source)
        }
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::MalformedHeader { .. }
        | FrameError::UnsupportedVersion(_)
        | FrameError::InvalidHeaderLength { .. }
        | FrameError::PayloadTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed { .. } => CliError::new(FAILURE, format!("{context}: {err}")),
        FrameError::Timeout => CliError::new(TIMEOUT, format!("{context}: {err}")),
    }
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    match err {
        SessionError::Transport(err) => transport_error(context, err),
        SessionError::Frame(err) => frame_error(context, err),
        SessionError::Cancelled => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_failures_are_data_invalid() {
        let err = frame_error("decode", FrameError::MalformedHeader { found: 0 });
        assert_eq!(err.code, DATA_INVALID);
        assert!(err.message.starts_with("decode: "));
        assert_eq!(
            frame_error("decode", FrameError::UnsupportedVersion(9)).code,
            DATA_INVALID
        );
        assert_eq!(
            frame_error("encode", FrameError::PayloadTooLarge { size: 300, max: 255 }).code,
            DATA_INVALID
        );
    }

    #[test]
    fn timeouts_map_to_124() {
        assert_eq!(frame_error("recv", FrameError::Timeout).code, TIMEOUT);
        let io = io::Error::new(io::ErrorKind::TimedOut, "connect timed out");
        let err = session_error(
            "connect",
            SessionError::Transport(TransportError::Connect {
                addr: "10.0.0.1:80".to_string(),
                source: io,
            }),
        );
        assert_eq!(err.code, TIMEOUT);
    }

    #[test]
    fn closed_and_refused_are_failures() {
        let closed = FrameError::ConnectionClosed {
            expected: 12,
            received: 0,
        };
        assert_eq!(session_error("recv", closed.into()).code, FAILURE);
        let refused = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        assert_eq!(io_error("connect", refused).code, FAILURE);
    }

    #[test]
    fn resolve_failure_is_transport_error() {
        let err = transport_error(
            "connect",
            TransportError::Resolve {
                addr: "nowhere".to_string(),
                source: io::Error::other("no such host"),
            },
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
    }

    #[test]
    fn closed_session_is_internal() {
        assert_eq!(session_error("run", SessionError::Closed).code, INTERNAL);
    }
}
