use std::fmt;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tcpsframe_frame::{Frame, FrameReader, FrameWriter};
use tcpsframe_transport::DeviceStream;
use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};

/// Where a session is in its send/receive cycle.
///
/// `Idle → Sending → AwaitingHeader → AwaitingPayload → Idle`, with
/// `Closed` reachable from every state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Sending,
    AwaitingHeader,
    AwaitingPayload,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Sending => "sending",
            Self::AwaitingHeader => "awaiting-header",
            Self::AwaitingPayload => "awaiting-payload",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// One completed round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub sent: Frame,
    pub received: Frame,
}

/// Why [`Session::run`] returned without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The requested number of cycles completed.
    Limit,
    /// A shutdown was requested through a [`ShutdownHandle`].
    Cancelled,
}

/// Outcome of [`Session::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub completed: u64,
    pub stop: StopReason,
}

/// Stops a session from another thread.
///
/// Requesting shutdown sets a flag checked between cycles and shuts the
/// socket down, which wakes a read blocked on a silent device.
#[derive(Clone, Debug, Default)]
pub struct ShutdownHandle {
    requested: Arc<AtomicBool>,
    stream: Option<Arc<DeviceStream>>,
}

impl ShutdownHandle {
    /// A handle with no socket attached; only the flag is set on request.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_stream(stream: DeviceStream) -> Self {
        Self {
            requested: Arc::new(AtomicBool::new(false)),
            stream: Some(Arc::new(stream)),
        }
    }

    /// Ask the session to stop.
    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
        self.close_transport();
    }

    /// Whether a shutdown has been requested.
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    fn close_transport(&self) {
        if let Some(stream) = &self.stream {
            if let Err(err) = stream.shutdown() {
                debug!(error = %err, "socket shutdown failed");
            }
        }
    }
}

/// A connected session with one device.
///
/// Owns its connection and its id sequence exclusively. The socket is
/// shut down when the session is closed or dropped.
pub struct Session<R = DeviceStream, W = DeviceStream> {
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
    config: SessionConfig,
    next_id: u8,
    state: SessionState,
    shutdown: ShutdownHandle,
}

impl<R: Read, W: Write> Session<R, W> {
    /// Build a session from an already connected reader/writer pair.
    pub fn from_parts(
        reader: FrameReader<R>,
        writer: FrameWriter<W>,
        config: SessionConfig,
        shutdown: ShutdownHandle,
    ) -> Self {
        Self {
            reader,
            writer,
            next_id: config.first_id,
            config,
            state: SessionState::Idle,
            shutdown,
        }
    }

    /// Run one cycle: send the next frame, then read one full reply.
    ///
    /// Any failure closes the session; later calls return
    /// [`SessionError::Closed`].
    pub fn exchange(&mut self) -> Result<Exchange> {
        if self.state == SessionState::Closed {
            return Err(SessionError::Closed);
        }
        if self.shutdown.is_requested() {
            self.close();
            return Err(SessionError::Cancelled);
        }

        let id = self.next_id;
        let sent = Frame::new(self.config.header(id), self.config.payload.clone())
            .map_err(|err| self.fail(err.into()))?;

        match self.round_trip(&sent) {
            Ok(received) => {
                self.state = SessionState::Idle;
                if received.header.id != id {
                    debug!(sent = id, received = received.header.id, "reply id differs");
                }
                Ok(Exchange { sent, received })
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    fn round_trip(&mut self, sent: &Frame) -> Result<Frame> {
        self.state = SessionState::Sending;
        self.writer.write_frame(sent)?;
        self.next_id = self.next_id.wrapping_add(1);

        loop {
            self.state = SessionState::AwaitingHeader;
            let header = self.reader.read_header()?;

            self.state = SessionState::AwaitingPayload;
            let payload = self.reader.read_payload(&header)?;

            if header.dest_addr == self.config.source_addr {
                return Ok(Frame { header, payload });
            }
            if !self.config.match_address {
                debug!(
                    dest = header.dest_addr,
                    expected = self.config.source_addr,
                    "reply addressed elsewhere"
                );
                return Ok(Frame { header, payload });
            }
            warn!(
                id = header.id,
                dest = header.dest_addr,
                expected = self.config.source_addr,
                "dropping reply for another address"
            );
        }
    }

    /// Run cycles until `limit` is reached (forever if `None`), a shutdown
    /// is requested, or an error occurs.
    pub fn run<F>(&mut self, limit: Option<u64>, mut on_exchange: F) -> Result<RunSummary>
    where
        F: FnMut(&Exchange),
    {
        let mut completed = 0u64;
        loop {
            if limit.is_some_and(|limit| completed >= limit) {
                return Ok(RunSummary {
                    completed,
                    stop: StopReason::Limit,
                });
            }

            match self.exchange() {
                Ok(exchange) => {
                    on_exchange(&exchange);
                    completed += 1;
                }
                Err(SessionError::Cancelled) => {
                    return Ok(RunSummary {
                        completed,
                        stop: StopReason::Cancelled,
                    })
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Close the session and its socket. Idempotent.
    pub fn shutdown(&mut self) {
        self.close();
    }

    /// Current cycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Id the next outgoing frame will carry.
    pub fn next_id(&self) -> u8 {
        self.next_id
    }

    /// A handle that can stop this session from another thread.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Borrow the frame reader.
    pub fn reader(&self) -> &FrameReader<R> {
        &self.reader
    }

    /// Borrow the frame writer.
    pub fn writer(&self) -> &FrameWriter<W> {
        &self.writer
    }

    fn fail(&mut self, err: SessionError) -> SessionError {
        let state = self.state;
        self.close();
        if self.shutdown.is_requested() {
            warn!(%state, "session cancelled");
            return SessionError::Cancelled;
        }
        debug!(%state, error = %err, "session failed");
        err
    }
}

impl<R, W> fmt::Debug for Session<R, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("next_id", &self.next_id)
            .field("config", &self.config)
            .finish()
    }
}

impl<R, W> Session<R, W> {
    fn close(&mut self) {
        if self.state != SessionState::Closed {
            self.state = SessionState::Closed;
            self.shutdown.close_transport();
        }
    }
}

impl<R, W> Drop for Session<R, W> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BytesMut;
    use tcpsframe_frame::{FrameError, FrameHeader, HeaderLayout, HEADER_LEN};

    use super::*;

    fn reply(id: u8, payload: &'static [u8]) -> Frame {
        let header = FrameHeader {
            layout: HeaderLayout::V1,
            id,
            data_len: 0,
            source_addr: 128,
            dest_addr: 0x12,
            flags: 0,
        };
        Frame::new(header, payload).unwrap()
    }

    fn wire(frames: &[Frame]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for frame in frames {
            frame.encode(&mut buf);
        }
        buf.to_vec()
    }

    fn session(replies: Vec<u8>, config: SessionConfig) -> Session<Cursor<Vec<u8>>, Vec<u8>> {
        let frame_config = config.frame_config();
        Session::from_parts(
            FrameReader::with_config(Cursor::new(replies), frame_config.clone()),
            FrameWriter::with_config(Vec::new(), frame_config),
            config,
            ShutdownHandle::new(),
        )
    }

    fn sent_frames(session: &Session<Cursor<Vec<u8>>, Vec<u8>>) -> Vec<Frame> {
        let mut reader = FrameReader::new(Cursor::new(session.writer().get_ref().clone()));
        let mut frames = Vec::new();
        while let Ok(frame) = reader.read_frame() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn exchange_sends_demo_frame_and_returns_reply() {
        let mut session = session(wire(&[reply(0, b"pong")]), SessionConfig::default());
        assert_eq!(session.state(), SessionState::Idle);

        let exchange = session.exchange().unwrap();
        assert_eq!(exchange.sent.header.id, 0);
        assert_eq!(exchange.sent.header.data_len, 4);
        assert_eq!(exchange.sent.payload.as_ref(), &crate::DEMO_PAYLOAD);
        assert_eq!(exchange.received, reply(0, b"pong"));
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.next_id(), 1);

        let on_wire = session.writer().get_ref();
        assert_eq!(on_wire.len(), HEADER_LEN + 4);
        assert_eq!(&on_wire[..4], b"SPCT");
    }

    #[test]
    fn run_stops_at_limit_with_incrementing_ids() {
        let replies = wire(&[reply(0, b"a"), reply(1, b"b"), reply(2, b"c"), reply(3, b"d")]);
        let mut session = session(replies, SessionConfig::default());

        let mut seen = Vec::new();
        let summary = session
            .run(Some(3), |exchange| seen.push(exchange.received.payload.clone()))
            .unwrap();

        assert_eq!(
            summary,
            RunSummary {
                completed: 3,
                stop: StopReason::Limit
            }
        );
        assert_eq!(seen, vec![&b"a"[..], &b"b"[..], &b"c"[..]]);
        let ids: Vec<u8> = sent_frames(&session).iter().map(|f| f.header.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn ids_wrap_at_field_width() {
        let config = SessionConfig {
            first_id: 254,
            ..SessionConfig::default()
        };
        let replies = wire(&[reply(0, b""), reply(0, b""), reply(0, b"")]);
        let mut session = session(replies, config);

        session.run(Some(3), |_| {}).unwrap();
        let ids: Vec<u8> = sent_frames(&session).iter().map(|f| f.header.id).collect();
        assert_eq!(ids, vec![254, 255, 0]);
        assert_eq!(session.next_id(), 1);
    }

    #[test]
    fn unbounded_run_ends_when_device_closes() {
        let replies = wire(&[reply(0, b"only")]);
        let mut session = session(replies, SessionConfig::default());

        let mut count = 0;
        let err = session.run(None, |_| count += 1).unwrap_err();
        assert_eq!(count, 1);
        assert!(matches!(
            err,
            SessionError::Frame(FrameError::ConnectionClosed { received: 0, .. })
        ));
        assert_eq!(session.state(), SessionState::Closed);
        assert!(matches!(session.exchange(), Err(SessionError::Closed)));
    }

    #[test]
    fn malformed_reply_closes_session() {
        let mut replies = wire(&[reply(0, b"oops")]);
        replies[0] = 0x00;
        let mut session = session(replies, SessionConfig::default());

        let err = session.exchange().unwrap_err();
        assert!(matches!(
            err,
            SessionError::Frame(FrameError::MalformedHeader { .. })
        ));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn unsupported_reply_version_closes_session() {
        let mut replies = wire(&[reply(0, b"oops")]);
        replies[4] = 7;
        let mut session = session(replies, SessionConfig::default());

        let err = session.exchange().unwrap_err();
        assert!(matches!(
            err,
            SessionError::Frame(FrameError::UnsupportedVersion(7))
        ));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn truncated_payload_is_connection_closed() {
        let mut replies = wire(&[reply(0, b"0123456789")]);
        replies.truncate(HEADER_LEN + 3);
        let mut session = session(replies, SessionConfig::default());

        let err = session.exchange().unwrap_err();
        assert!(matches!(
            err,
            SessionError::Frame(FrameError::ConnectionClosed {
                expected: 10,
                received: 3
            })
        ));
    }

    #[test]
    fn oversized_configured_payload_fails_fast() {
        let config = SessionConfig {
            payload: vec![0u8; 300].into(),
            ..SessionConfig::default()
        };
        let mut session = session(Vec::new(), config);

        let err = session.exchange().unwrap_err();
        assert!(matches!(
            err,
            SessionError::Frame(FrameError::PayloadTooLarge { size: 300, .. })
        ));
        assert!(session.writer().get_ref().is_empty());
    }

    #[test]
    fn fragmented_session_sends_identical_bytes() {
        let replies = wire(&[reply(0, b"x"), reply(1, b"y")]);
        let mut plain = session(replies.clone(), SessionConfig::default());
        plain.run(Some(2), |_| {}).unwrap();

        let mut split = session(
            replies,
            SessionConfig {
                fragment: true,
                ..SessionConfig::default()
            },
        );
        split.run(Some(2), |_| {}).unwrap();

        assert_eq!(plain.writer().get_ref(), split.writer().get_ref());
        assert!(split.writer().config().fragment);
    }

    #[test]
    fn v2_layout_is_sent_when_configured() {
        let config = SessionConfig {
            layout: HeaderLayout::V2,
            ..SessionConfig::default()
        };
        let mut session = session(wire(&[reply(0, b"")]), config);
        let exchange = session.exchange().unwrap();

        assert_eq!(exchange.sent.header.layout, HeaderLayout::V2);
        assert_eq!(session.writer().get_ref()[4], 2);
        assert_eq!(session.writer().get_ref()[7], 0x56);
    }

    #[test]
    fn shutdown_requested_before_run_is_cancelled() {
        let mut session = session(wire(&[reply(0, b"a")]), SessionConfig::default());
        session.shutdown_handle().request();

        let summary = session.run(None, |_| {}).unwrap();
        assert_eq!(summary.completed, 0);
        assert_eq!(summary.stop, StopReason::Cancelled);
        assert_eq!(session.state(), SessionState::Closed);
        assert!(session.writer().get_ref().is_empty());
    }

    #[test]
    fn explicit_shutdown_closes() {
        let mut session = session(wire(&[reply(0, b"a")]), SessionConfig::default());
        session.shutdown();
        session.shutdown();
        assert_eq!(session.state(), SessionState::Closed);
        assert!(matches!(session.exchange(), Err(SessionError::Closed)));
    }

    fn reply_to(id: u8, dest_addr: u16, payload: &'static [u8]) -> Frame {
        let mut frame = reply(id, payload);
        frame.header.dest_addr = dest_addr;
        frame
    }

    #[test]
    fn foreign_replies_are_dropped_when_matching_addresses() {
        let config = SessionConfig {
            match_address: true,
            ..SessionConfig::default()
        };
        let replies = wire(&[reply_to(0, 0x99, b"other"), reply_to(0, 0x12, b"mine")]);
        let mut session = session(replies, config);

        let exchange = session.exchange().unwrap();
        assert_eq!(exchange.received.payload.as_ref(), b"mine");
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn foreign_replies_pass_through_by_default() {
        let replies = wire(&[reply_to(0, 0x99, b"other")]);
        let mut session = session(replies, SessionConfig::default());

        let exchange = session.exchange().unwrap();
        assert_eq!(exchange.received.header.dest_addr, 0x99);
    }

    #[test]
    fn only_foreign_replies_end_in_connection_closed() {
        let config = SessionConfig {
            match_address: true,
            ..SessionConfig::default()
        };
        let mut session = session(wire(&[reply_to(0, 0x99, b"other")]), config);

        assert!(matches!(
            session.exchange(),
            Err(SessionError::Frame(FrameError::ConnectionClosed { received: 0, .. }))
        ));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn debug_shows_state_and_next_id() {
        let mut session = session(wire(&[reply(0, b"a")]), SessionConfig::default());
        session.exchange().unwrap();

        let rendered = format!("{session:?}");
        assert!(rendered.starts_with("Session"));
        assert!(rendered.contains("state: Idle"));
        assert!(rendered.contains("next_id: 1"));
    }

    #[test]
    fn state_display_names() {
        assert_eq!(SessionState::AwaitingHeader.to_string(), "awaiting-header");
        assert_eq!(SessionState::Closed.to_string(), "closed");
    }
}
